//! # Sealed Settings
//!
//! Order-preserving JSON settings documents whose secret values are encrypted
//! at rest. A settings file is handled as a flat list of colon-joined keys;
//! keys ending in `*` hold ciphertext and are decrypted when the file is
//! loaded.
//!
//! ## Architecture
//!
//! ```text
//! write: value → flatten (protect secrets) → merge section → encode → file
//! read:  file → decode → unprotect marked keys → FlatModel → host config
//! ```
//!
//! ## Core Components
//!
//! - **Codec**: JSON document ⇄ [`FlatModel`], preserving order and literals
//! - **Flattener**: any `serde::Serialize` value to flat keys, with [`Secret`] fields encrypted
//! - **Store**: replaces one section of a settings file
//! - **Loader**: decodes a settings file and decrypts its secret values
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sealed_settings::{AppConfig, Result, Secret, Settings};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Database {
//!     host: String,
//!     password: Secret<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut settings = Settings::new(AppConfig::from_env()?)?;
//!     let db = Database { host: "db.internal".into(), password: Secret::new("hunter2".into()) };
//!     settings.update("Database", &db).await?;
//!     println!("{:?}", settings.data().get("Database:Password"));
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod flat;
pub mod flatten;
pub mod loader;
pub mod observability;
pub mod protector;
pub mod source;
pub mod store;

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Result, SettingsError};
pub use flat::{FlatModel, FlatValue};
pub use flatten::Secret;
pub use loader::{ConfigLoader, JsonConfigProvider, LoadFailure};
pub use observability::init_logging;
pub use protector::{AesGcmProtector, SecretProtector};
pub use source::SettingsSource;
pub use store::{JsonSettingsStore, SectionPlacement};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// One settings file wired to the host protector: writes go through the
/// store, reads through the provider.
pub struct Settings {
    config: AppConfig,
    protector: Arc<dyn SecretProtector>,
    store: JsonSettingsStore,
    provider: JsonConfigProvider,
}

impl Settings {
    /// Build the protector from `config` and bind it to the configured source.
    pub fn new(config: AppConfig) -> Result<Self> {
        let protector = config.protector.build().map_err(|e| {
            SettingsError::config_with_source("Failed to initialize secret protector", Box::new(e))
        })?;
        Ok(Self::with_protector(config, Arc::new(protector)))
    }

    /// Bind a caller-supplied protector to the configured source.
    pub fn with_protector(config: AppConfig, protector: Arc<dyn SecretProtector>) -> Self {
        let store = JsonSettingsStore::new(config.source.clone(), protector.clone());
        let provider = JsonConfigProvider::new(config.source.clone(), protector.clone());
        Self { config, protector, store, provider }
    }

    /// Install a decryption failure hook on the read path.
    ///
    /// See [`ConfigLoader::on_failure`]. Data loaded so far is discarded.
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoadFailure) -> bool + Send + Sync + 'static,
    {
        let loader = ConfigLoader::new(self.protector.clone())
            .with_component(self.config.source.path.clone())
            .on_failure(hook);
        self.provider = JsonConfigProvider::with_loader(self.config.source.clone(), loader);
        self
    }

    /// Replace `section` in the settings file, then reload it.
    ///
    /// The result is the result of the write. A failed reload is logged and
    /// leaves [`data`](Self::data) as it was; [`reload`](Self::reload)
    /// reports the error.
    pub async fn update<T>(&mut self, section: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.store.update_settings(section, value).await?;

        if let Err(error) = self.provider.reload().await {
            warn!(
                path = %self.config.source.path,
                section = %section,
                error = %error,
                "Settings written but reload failed, keeping previous data"
            );
        }
        Ok(())
    }

    /// Re-read the settings file.
    pub async fn reload(&mut self) -> Result<()> {
        tracing::debug!(app_name = APP_NAME, version = VERSION, "Reloading settings");
        self.provider.reload().await
    }

    /// Decrypted settings from the last load.
    pub fn data(&self) -> &FlatModel {
        self.provider.data()
    }

    pub fn store(&self) -> &JsonSettingsStore {
        &self.store
    }

    /// Get a reference to the subsystem configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "sealed-settings");
    }

    #[tokio::test]
    async fn test_update_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.source = SettingsSource::new("appsettings.json").base_dir(dir.path()).reload_on_change(false);

        let mut settings = Settings::with_protector(
            config,
            Arc::new(AesGcmProtector::new(protector::generate_key().unwrap())),
        );
        settings.update("Token", &Secret::new("top-secret-value".to_string())).await.unwrap();

        assert_eq!(settings.data().get("Token"), Some(&FlatValue::from("top-secret-value")));
        let raw = std::fs::read_to_string(dir.path().join("appsettings.json")).unwrap();
        assert!(raw.contains("\"Token*\""));
        assert!(!raw.contains("top-secret-value"));
    }
}
