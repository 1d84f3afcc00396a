//! File-backed configuration provider.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument};

use super::ConfigLoader;
use crate::errors::{Result, SettingsError};
use crate::flat::FlatModel;
use crate::protector::SecretProtector;
use crate::source::{FileProvider, SettingsSource};

/// Loads a JSON settings file and exposes its decrypted flat form.
pub struct JsonConfigProvider {
    source: SettingsSource,
    loader: ConfigLoader,
    provider: Option<Arc<dyn FileProvider>>,
    data: FlatModel,
}

impl JsonConfigProvider {
    /// Provider for `source`; failures are reported under the source path.
    pub fn new(source: SettingsSource, protector: Arc<dyn SecretProtector>) -> Self {
        let loader = ConfigLoader::new(protector).with_component(source.path.clone());
        Self::with_loader(source, loader)
    }

    /// Provider using a preconfigured loader (e.g. one with a failure hook).
    pub fn with_loader(source: SettingsSource, loader: ConfigLoader) -> Self {
        Self { source, loader, provider: None, data: FlatModel::new() }
    }

    pub fn with_file_provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn source(&self) -> &SettingsSource {
        &self.source
    }

    /// Settings from the last successful load.
    pub fn data(&self) -> &FlatModel {
        &self.data
    }

    /// Host handoff form of [`data`](Self::data).
    pub fn to_config_map(&self) -> std::collections::HashMap<String, Option<String>> {
        self.data.to_config_map()
    }

    /// Load the settings file. On error the previous data is kept.
    pub async fn load(&mut self) -> Result<()> {
        self.reload().await
    }

    /// Re-read the settings file, replacing the current data.
    #[instrument(skip(self), fields(path = %self.source.path))]
    pub async fn reload(&mut self) -> Result<()> {
        let path = self.physical_path()?;

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(text) => self.loader.load(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !self.source.optional {
                    return Err(SettingsError::FileNotFound { path });
                }
                FlatModel::new()
            }
            Err(e) => {
                return Err(SettingsError::io(format!("failed to read {}", path.display()), e));
            }
        };

        info!(keys = data.len(), "Loaded settings file");
        self.data = data;
        Ok(())
    }

    fn physical_path(&self) -> Result<PathBuf> {
        match &self.provider {
            Some(provider) => self.source.resolve_with(provider.as_ref()),
            None => self.source.resolve_path(),
        }
    }
}

impl std::fmt::Debug for JsonConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonConfigProvider")
            .field("source", &self.source)
            .field("loader", &self.loader)
            .field("keys", &self.data.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::FlatValue;
    use crate::protector::ProtectorError;

    struct PrefixProtector;

    impl SecretProtector for PrefixProtector {
        fn protect(&self, plaintext: &str) -> std::result::Result<String, ProtectorError> {
            Ok(format!("enc:{}", plaintext))
        }

        fn unprotect(&self, ciphertext: &str) -> std::result::Result<String, ProtectorError> {
            ciphertext
                .strip_prefix("enc:")
                .map(str::to_string)
                .ok_or_else(|| ProtectorError::decryption("missing prefix"))
        }
    }

    fn provider_in(dir: &std::path::Path, optional: bool) -> JsonConfigProvider {
        let source = SettingsSource::new("appsettings.json").base_dir(dir).optional(optional);
        JsonConfigProvider::new(source, Arc::new(PrefixProtector))
    }

    #[tokio::test]
    async fn test_load_decrypts_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("appsettings.json"),
            "{\n  // comment\n  \"Db\": {\"Password*\": \"enc:pw\", \"Port\": 5432,},\n}",
        )
        .unwrap();

        let mut provider = provider_in(dir.path(), false);
        provider.load().await.unwrap();

        assert_eq!(provider.data().get("Db:Password"), Some(&FlatValue::from("pw")));
        let map = provider.to_config_map();
        assert_eq!(map.get("Db:Port"), Some(&Some("5432".to_string())));
    }

    #[tokio::test]
    async fn test_missing_optional_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider_in(dir.path(), true);
        provider.load().await.unwrap();
        assert!(provider.data().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider_in(dir.path(), false);
        let err = provider.load().await.unwrap_err();
        assert!(matches!(err, SettingsError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes_and_keeps_data_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        std::fs::write(&path, r#"{"Name": "first"}"#).unwrap();

        let mut provider = provider_in(dir.path(), false);
        provider.load().await.unwrap();
        assert_eq!(provider.data().get("Name"), Some(&FlatValue::from("first")));

        std::fs::write(&path, r#"{"Name": "second"}"#).unwrap();
        provider.reload().await.unwrap();
        assert_eq!(provider.data().get("Name"), Some(&FlatValue::from("second")));

        std::fs::write(&path, "{ broken").unwrap();
        assert!(provider.reload().await.is_err());
        assert_eq!(provider.data().get("Name"), Some(&FlatValue::from("second")));
    }

    #[tokio::test]
    async fn test_failures_report_source_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("appsettings.json"), r#"{"Key*": "garbage"}"#).unwrap();

        let source = SettingsSource::new("appsettings.json").base_dir(dir.path());
        let loader = ConfigLoader::new(Arc::new(PrefixProtector))
            .with_component("appsettings.json")
            .on_failure(|failure| failure.component == "appsettings.json");
        let mut provider = JsonConfigProvider::with_loader(source, loader);

        provider.load().await.unwrap();
        assert_eq!(provider.data().get("Key"), Some(&FlatValue::Null));
    }
}
