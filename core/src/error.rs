//! Error types for the Mail3 client core

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Result type alias for Mail3 operations
pub type Mail3Result<T> = Result<T, Mail3Error>;

/// Domain error codes reported by the backend in the `reason` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// A community campaign with the same URL already exists
    DuplicatedCommunitySubscriptionCampaignUrl,
    /// The campaign URL was rejected
    InvalidCommunitySubscriptionCampaignUrl,
    /// The campaign credential was rejected
    InvalidCommunitySubscriptionCredential,
    /// No user for the given address
    UserNotFound,
    /// The address is not on the community whitelist
    CommunityAddressNotInWhitelist,
    /// The wallet owns no ENS names to refresh
    EmptyEnsList,
    /// Any reason this client does not know about
    Other(String),
}

impl ErrorCode {
    /// Parse a backend `reason` string
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "DUPLICATED_COMMUNITY_SUBSCRIPTION_CAMPAIGN_URL" => {
                Self::DuplicatedCommunitySubscriptionCampaignUrl
            }
            "INVALID_COMMUNITY_SUBSCRIPTION_CAMPAIGN_URL" => {
                Self::InvalidCommunitySubscriptionCampaignUrl
            }
            "INVALID_COMMUNITY_SUBSCRIPTION_CREDENTIAL" => {
                Self::InvalidCommunitySubscriptionCredential
            }
            "USER_NOT_FOUND" => Self::UserNotFound,
            "COMMUNITY_ADDRESS_NOT_IN_WHITELIST" => Self::CommunityAddressNotInWhitelist,
            "EMPTY_ENS_LIST" => Self::EmptyEnsList,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire representation of this code
    pub fn as_str(&self) -> &str {
        match self {
            Self::DuplicatedCommunitySubscriptionCampaignUrl => {
                "DUPLICATED_COMMUNITY_SUBSCRIPTION_CAMPAIGN_URL"
            }
            Self::InvalidCommunitySubscriptionCampaignUrl => {
                "INVALID_COMMUNITY_SUBSCRIPTION_CAMPAIGN_URL"
            }
            Self::InvalidCommunitySubscriptionCredential => {
                "INVALID_COMMUNITY_SUBSCRIPTION_CREDENTIAL"
            }
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::CommunityAddressNotInWhitelist => "COMMUNITY_ADDRESS_NOT_IN_WHITELIST",
            Self::EmptyEnsList => "EMPTY_ENS_LIST",
            Self::Other(reason) => reason,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    /// Machine readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Main error type for the Mail3 client core
#[derive(Debug, thiserror::Error)]
pub enum Mail3Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to create configuration directory
    #[error("Failed to create configuration directory: {0}")]
    ConfigDirCreateFailed(PathBuf),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Backend reported a domain error
    #[error("API error ({status}): {code}{}", message_suffix(.message))]
    Api {
        /// HTTP status code
        status: u16,
        /// Parsed reason
        code: ErrorCode,
        /// Optional message from the backend
        message: Option<String>,
    },

    /// Client-side validation failed before any request was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// The owning view unmounted before the result could be applied
    #[error("View unmounted before the request completed")]
    ViewUnmounted,

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic errors
    #[error("Error: {0}")]
    Generic(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(" - {m}")).unwrap_or_default()
}

impl Mail3Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new generic error
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Build an API error from a status and a raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = match parsed.reason {
            Some(reason) => ErrorCode::from_reason(&reason),
            None => ErrorCode::Other(format!("HTTP_{status}")),
        };
        Self::Api {
            status,
            code,
            message: parsed.message,
        }
    }

    /// Backend reason code, if this is a domain error
    pub fn domain_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this is a network-related error
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Io(_))
    }

    /// Check if this error was raised before reaching the network
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
