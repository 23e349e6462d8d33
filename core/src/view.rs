//! View lifecycle scopes
//!
//! Requests are not aborted when a view goes away. Instead every view
//! owns a [`ViewScope`] and completion handlers check it before touching
//! view state.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{Mail3Error, Mail3Result};

/// Lifetime of one mounted view
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    /// A freshly mounted view
    pub fn mount() -> Self {
        Self::default()
    }

    /// Scope for a nested view, unmounted together with its parent
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Mark the view as gone
    pub fn unmount(&self) {
        self.token.cancel();
    }

    /// Whether the view is still mounted
    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves once the view unmounts
    pub async fn unmounted(&self) {
        self.token.cancelled().await
    }

    /// Run `fut` to completion, then hand its result back only if the view
    /// is still mounted.
    pub async fn guard<T, F>(&self, fut: F) -> Mail3Result<T>
    where
        F: Future<Output = Mail3Result<T>>,
    {
        let result = fut.await;
        if self.is_mounted() {
            result
        } else {
            tracing::debug!("Discarding result for unmounted view");
            Err(Mail3Error::ViewUnmounted)
        }
    }
}
