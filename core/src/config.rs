//! Configuration management for the Mail3 client core

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Mail3Error, Mail3Result};

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Backend server settings
    pub server: ServerConfig,
    /// Query cache settings
    pub query: QueryConfig,
    /// Mutation settings
    pub mutation: MutationConfig,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name
    pub name: String,
    /// Log level
    pub log_level: String,
    /// Configuration directory
    pub config_dir: PathBuf,
}

/// Backend server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST API base URL, e.g. `https://api.mail3.me/api/v1`
    pub base_url: Url,
    /// Mail domain appended to wallet addresses
    pub mail_domain: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Bearer token for authenticated endpoints
    pub bearer_token: Option<String>,
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a successful response counts as fresh (seconds)
    pub stale_time_secs: u64,
    /// How long an entry nobody observes stays cached (seconds)
    pub cache_time_secs: u64,
    /// Items requested per page
    pub page_size: u32,
    /// Automatic retries for failed reads
    pub retry: u32,
    /// Refetch stale data when a view mounts
    pub refetch_on_mount: bool,
}

/// Consistency discipline applied to every mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Local state changes only after the backend confirms
    ConfirmFirst,
    /// Local state changes first and is restored if the backend fails
    Optimistic,
}

impl std::fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyMode::ConfirmFirst => write!(f, "confirm_first"),
            ConsistencyMode::Optimistic => write!(f, "optimistic"),
        }
    }
}

/// Mutation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Consistency discipline
    pub consistency: ConsistencyMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: crate::APP_NAME.to_string(),
            log_level: "info".to_string(),
            config_dir: crate::default_config_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(crate::DEFAULT_SERVER_URL)
                .expect("default server URL is valid"),
            mail_domain: crate::DEFAULT_MAIL_DOMAIN.to_string(),
            timeout_secs: 30,
            bearer_token: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 0,
            cache_time_secs: 300,
            page_size: crate::DEFAULT_PAGE_SIZE,
            retry: 0,
            refetch_on_mount: true,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            consistency: ConsistencyMode::ConfirmFirst,
        }
    }
}

impl ServerConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl QueryConfig {
    /// Stale time as a duration
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    /// Cache time as a duration
    pub fn cache_time(&self) -> Duration {
        Duration::from_secs(self.cache_time_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(config_path: &Path) -> Mail3Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Mail3Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| Mail3Error::ConfigDirCreateFailed(parent.to_path_buf()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Load the configuration file from the config directory, then apply
    /// environment overrides
    pub fn load_default() -> Mail3Result<Self> {
        let path = crate::default_config_dir().join(crate::CONFIG_FILENAME);
        let mut config = Self::load(&path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `MAIL3_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(log_level) = std::env::var("MAIL3_LOG_LEVEL") {
            self.app.log_level = log_level;
        }

        if let Ok(server_url) = std::env::var("MAIL3_SERVER_URL") {
            match Url::parse(&server_url) {
                Ok(url) => self.server.base_url = url,
                Err(e) => tracing::warn!("Ignoring invalid MAIL3_SERVER_URL {}: {}", server_url, e),
            }
        }

        if let Ok(domain) = std::env::var("MAIL3_MAIL_DOMAIN") {
            self.server.mail_domain = domain;
        }

        if let Ok(token) = std::env::var("MAIL3_BEARER_TOKEN") {
            self.server.bearer_token = Some(token);
        }

        if let Ok(stale) = std::env::var("MAIL3_STALE_TIME_SECONDS") {
            if let Ok(secs) = stale.parse() {
                self.query.stale_time_secs = secs;
            }
        }

        if let Ok(cache) = std::env::var("MAIL3_CACHE_TIME_SECONDS") {
            if let Ok(secs) = cache.parse() {
                self.query.cache_time_secs = secs;
            }
        }

        if let Ok(mode) = std::env::var("MAIL3_CONSISTENCY") {
            self.mutation.consistency = match mode.to_lowercase().as_str() {
                "optimistic" => ConsistencyMode::Optimistic,
                _ => ConsistencyMode::ConfirmFirst,
            };
        }
    }

    /// Get the configuration file path
    pub fn config_file_path(&self) -> PathBuf {
        self.app.config_dir.join(crate::CONFIG_FILENAME)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Mail3Result<()> {
        match self.server.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Mail3Error::config(format!(
                    "Unsupported server URL scheme: {}",
                    other
                )))
            }
        }

        if self.server.mail_domain.is_empty() {
            return Err(Mail3Error::config("Mail domain cannot be empty"));
        }

        if self.query.page_size == 0 {
            return Err(Mail3Error::config("Page size cannot be zero"));
        }

        if self.server.timeout_secs == 0 {
            return Err(Mail3Error::config("Request timeout cannot be zero"));
        }

        Ok(())
    }
}
