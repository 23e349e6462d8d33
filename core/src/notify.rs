//! User-facing notifications and confirmation prompts
//!
//! The core never renders anything. It reports outcomes through a
//! [`Notifier`] and asks before destructive actions through a
//! [`Confirmer`]; the UI supplies both.

use tracing::{info, warn};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Action succeeded
    Success,
    /// Action failed or was refused
    Warning,
}

/// A transient notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Localization key, e.g. `status.trash.fail`
    pub key: String,
    /// Untranslated detail such as the underlying error
    pub detail: Option<String>,
}

impl Notification {
    /// Success notification
    pub fn success(key: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            key: key.into(),
            detail: None,
        }
    }

    /// Warning notification
    pub fn warning(key: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            key: key.into(),
            detail: None,
        }
    }

    /// Attach a detail string
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sink for user notifications
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, notification: Notification);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let detail = notification.detail.unwrap_or_default();
        match notification.level {
            NotificationLevel::Success => info!("[notify] {} {}", notification.key, detail),
            NotificationLevel::Warning => warn!("[notify] {} {}", notification.key, detail),
        }
    }
}

/// Confirmation prompt for a destructive action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// Localization key of the title
    pub title: String,
    /// Localization key of the description
    pub description: String,
}

impl ConfirmPrompt {
    /// Create a prompt
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Asks the user to confirm destructive actions
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer: Send + Sync {
    /// Whether the user confirmed
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Confirmer that always says yes, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        info!("Auto-confirming: {}", prompt.title);
        true
    }
}
