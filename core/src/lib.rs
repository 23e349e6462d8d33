//! Mail3 Client Core Library
//!
//! This crate contains the client-side data layer shared by the Mail3
//! webmail and community front ends, including:
//! - Domain models (MessageSummary, MessageDetail, Alias)
//! - A process-wide query cache with per-key request deduplication
//! - Paginated list and single-entity fetchers
//! - A mutator with confirm-first or optimistic cache updates
//! - Compose templates, alias classification and display helpers
//! - An HTTP client for the Mail3 REST API

pub mod alias;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub(crate) mod locks;
pub mod mailbox;
pub mod message;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod telemetry;
pub mod template;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use alias::{Alias, AliasBook, AliasKind, ClassifiedAliases};
pub use api::{HttpMailApi, MailApi};
pub use client::MailClient;
pub use config::{Config, ConsistencyMode};
pub use error::{ErrorCode, Mail3Error, Mail3Result};
pub use mailbox::Mailbox;
pub use message::{MessageDetail, MessageFlag, MessageSummary};
pub use mutation::{AvatarUpload, MutationKind, MutationOutcome, MutationState, Mutator};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use query::{DetailFetcher, PaginatedList, QueryCache, QueryKey, QueryOptions, RefetchTrigger};
pub use template::{ComposeAction, ComposeDraft};
pub use types::{Cursor, Page};
pub use view::ViewScope;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Mail3";

/// Default REST API base URL
pub const DEFAULT_SERVER_URL: &str = "https://api.mail3.me/api/v1";

/// Default mail domain for wallet addresses
pub const DEFAULT_MAIL_DOMAIN: &str = "mail3.me";

/// Default configuration directory name
pub const CONFIG_DIR_NAME: &str = "mail3";

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "config.toml";

/// Default number of items per list page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum avatar upload size (2MB)
pub const MAX_AVATAR_SIZE: usize = 2 * 1024 * 1024;

/// Get the default configuration directory
///
/// Honors `MAIL3_CONFIG_DIR`, then the platform config directory. The
/// directory is not created.
pub fn default_config_dir() -> std::path::PathBuf {
    std::env::var("MAIL3_CONFIG_DIR")
        .map(std::path::PathBuf::from)
        .or_else(|_| {
            directories::ProjectDirs::from("", "", CONFIG_DIR_NAME)
                .map(|dirs| dirs.config_dir().to_path_buf())
                .ok_or(std::env::VarError::NotPresent)
        })
        .unwrap_or_else(|_| std::path::PathBuf::from("~/.config/mail3"))
}
