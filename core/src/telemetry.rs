//! Logging setup

use tracing_subscriber::EnvFilter;

use crate::error::{Mail3Error, Mail3Result};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str) -> Mail3Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Mail3Error::config(format!("Invalid log level {}: {}", level, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Mail3Error::generic(format!("Logging already initialized: {}", e)))?;

    tracing::info!("Initialized {} core v{}", crate::APP_NAME, crate::VERSION);
    Ok(())
}
