//! # Configuration Settings
//!
//! Defines the configuration structure for the settings subsystem itself.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::Result;
use crate::protector::{AesGcmProtector, ProtectorError};
use crate::source::SettingsSource;

/// Main subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Settings file configuration
    #[validate(nested)]
    pub source: SettingsSource,

    /// Secret protection configuration
    #[validate(nested)]
    pub protector: ProtectorConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;
        Ok(())
    }
}

/// Secret protection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
#[serde(default)]
pub struct ProtectorConfig {
    /// Key file used when `SEALED_SETTINGS_MASTER_KEY` is not set.
    /// Created with a random key on first use.
    pub key_file: Option<PathBuf>,
}

impl ProtectorConfig {
    /// Build the host default protector.
    pub fn build(&self) -> std::result::Result<AesGcmProtector, ProtectorError> {
        AesGcmProtector::host_default(self.key_file.as_deref())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}
