//! Cache keys

use std::fmt;

/// Operation names used as the first component of a [`QueryKey`]
pub mod ops {
    /// Alias book of the account
    pub const ALIASES: &str = "aliases";
    /// Pages of a mailbox, parameterized by mailbox then cursor
    pub const MAILBOX_MESSAGES: &str = "mailbox_messages";
    /// Message detail plus body, parameterized by message id
    pub const MESSAGE_PREVIEW: &str = "message_preview";
    /// Account settings
    pub const USER_INFO: &str = "user_info";
    /// Pages of sent community messages
    pub const COMMUNITY_MESSAGES: &str = "community_messages";
    /// Pages of community subscribers
    pub const SUBSCRIBERS: &str = "subscribers";
    /// Avatar URL, parameterized by address
    pub const AVATAR: &str = "avatar";
    /// Wallet address behind a name, parameterized by domain
    pub const PRIMITIVE_ADDRESS: &str = "primitive_address";
}

/// Operation name plus parameters identifying one cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    operation: String,
    params: Vec<String>,
}

impl QueryKey {
    /// Key with no parameters
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    /// Copy of this key with one more parameter
    pub fn param(&self, param: impl Into<String>) -> Self {
        let mut key = self.clone();
        key.params.push(param.into());
        key
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Parameters in order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Whether `self` is `prefix` or extends it with more parameters
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.operation == prefix.operation && self.params.starts_with(&prefix.params)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.operation)?;
        for param in &self.params {
            write!(f, ":{param}")?;
        }
        Ok(())
    }
}
