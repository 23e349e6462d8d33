//! Server mutations with cache patching and rollback

mod mutator;

pub use mutator::{AvatarUpload, Mutator};

use std::fmt;

use uuid::Uuid;

use crate::alias::AliasKind;
use crate::error::Mail3Error;
use crate::query::QueryCache;

/// What a mutation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Move a message to trash
    Trash {
        /// Message id
        id: String,
    },
    /// Delete a message for good
    PermanentDelete {
        /// Message id
        id: String,
    },
    /// Delete several messages for good
    BatchDelete {
        /// Message ids
        ids: Vec<String>,
    },
    /// Move a message out of trash back to the inbox
    Restore {
        /// Message id
        id: String,
    },
    /// Change the default sending alias
    SetDefaultAlias {
        /// Alias uuid
        uuid: String,
    },
    /// Change nickname and avatar
    UpdateProfile {
        /// New nickname
        nickname: String,
    },
    /// Re-scan the chain for ENS or .bit names
    RefreshAliases {
        /// Kind of names to scan for
        kind: AliasKind,
    },
}

impl MutationKind {
    /// Entity the mutation writes to; mutations on one entity run one at a time
    pub fn entity(&self) -> String {
        match self {
            MutationKind::Trash { id }
            | MutationKind::PermanentDelete { id }
            | MutationKind::Restore { id } => format!("message:{id}"),
            MutationKind::BatchDelete { .. } => "messages".to_string(),
            MutationKind::SetDefaultAlias { .. } | MutationKind::RefreshAliases { .. } => {
                "aliases".to_string()
            }
            MutationKind::UpdateProfile { .. } => "profile".to_string(),
        }
    }

    /// Whether the user must confirm first
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            MutationKind::PermanentDelete { .. } | MutationKind::BatchDelete { .. }
        )
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Trash { id } => write!(f, "trash {id}"),
            MutationKind::PermanentDelete { id } => write!(f, "delete {id}"),
            MutationKind::BatchDelete { ids } => write!(f, "batch delete of {} messages", ids.len()),
            MutationKind::Restore { id } => write!(f, "restore {id}"),
            MutationKind::SetDefaultAlias { uuid } => write!(f, "set default alias {uuid}"),
            MutationKind::UpdateProfile { nickname } => write!(f, "update profile ({nickname})"),
            MutationKind::RefreshAliases { kind } => write!(f, "refresh {kind} aliases"),
        }
    }
}

/// Where a mutation ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Waiting for the backend
    Pending,
    /// Backend confirmed; local state reflects it
    Committed,
    /// Failed; local state is as before
    RolledBack,
}

/// Result of one mutation
#[derive(Debug)]
pub struct MutationOutcome {
    /// Invocation id
    pub id: Uuid,
    /// What was attempted
    pub kind: MutationKind,
    /// Final state
    pub state: MutationState,
    /// Why it rolled back
    pub error: Option<Mail3Error>,
}

impl MutationOutcome {
    /// Whether the backend confirmed the change
    pub fn is_committed(&self) -> bool {
        self.state == MutationState::Committed
    }
}

/// Undoes one applied [`CachePatch`], touching only what that patch changed
pub struct Revert(Box<dyn FnOnce(&QueryCache) + Send>);

impl Revert {
    /// Revert running `undo`
    pub fn new(undo: impl FnOnce(&QueryCache) + Send + 'static) -> Self {
        Self(Box::new(undo))
    }

    /// Revert that changes nothing
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Undo the patch in `cache`
    pub fn apply(self, cache: &QueryCache) {
        (self.0)(cache)
    }
}

/// Local change that mirrors a mutation in the cache.
///
/// Applying it yields a [`Revert`] for that change alone, so rolling back
/// one mutation leaves patches of other mutations in place.
pub struct CachePatch {
    apply: Box<dyn FnOnce(&QueryCache) -> Revert + Send>,
}

impl CachePatch {
    /// Patch running `apply`
    pub fn new(apply: impl FnOnce(&QueryCache) -> Revert + Send + 'static) -> Self {
        Self { apply: Box::new(apply) }
    }

    /// Apply to `cache`
    pub fn apply(self, cache: &QueryCache) -> Revert {
        (self.apply)(cache)
    }
}
