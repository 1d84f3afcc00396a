//! # Configuration Management
//!
//! Loads [`AppConfig`] from an optional file plus environment variables.
//! Environment variables use the `SEALED_SETTINGS__` prefix with `__` between
//! levels, e.g. `SEALED_SETTINGS__SOURCE__RELOAD_DELAY_MS=500`.

pub mod settings;

use std::path::Path;

use tracing::debug;

use crate::errors::Result;

pub use settings::{AppConfig, ObservabilityConfig, ProtectorConfig};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SEALED_SETTINGS";

impl AppConfig {
    /// Load configuration from `file` (if given) and the environment, then validate it.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            settings_path = %config.source.path,
            reload_on_change = config.source.reload_on_change,
            "Loaded settings subsystem configuration"
        );
        Ok(config)
    }

    /// Load configuration from the environment only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}
