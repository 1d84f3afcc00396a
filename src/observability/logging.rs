//! # Structured Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber. `RUST_LOG` wins over the
//! configured level; JSON output is opt-in.

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::{Result, SettingsError};

/// Initialize the global subscriber.
///
/// Returns `Ok` when a subscriber is already installed (e.g. by the host or
/// by another test), so it is safe to call more than once.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            SettingsError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json_logging { builder.json().try_init() } else { builder.try_init() };

    if installed.is_err() {
        // Subscriber already set elsewhere; keep it.
        tracing::debug!("Global tracing subscriber already installed");
    } else {
        tracing::info!(
            log_level = %config.log_level,
            json_logging = config.json_logging,
            "Logging initialized"
        );
    }

    Ok(())
}
