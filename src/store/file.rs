//! File-backed settings store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{update_document, SectionPlacement};
use crate::errors::{Result, SettingsError};
use crate::protector::SecretProtector;
use crate::source::{FileProvider, SettingsSource};

/// Writes sections of a JSON settings file, encrypting secret values.
///
/// Updates through one store are serialized; concurrent writers in other
/// stores or processes are not coordinated.
pub struct JsonSettingsStore {
    source: SettingsSource,
    protector: Arc<dyn SecretProtector>,
    provider: Option<Arc<dyn FileProvider>>,
    placement: SectionPlacement,
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(source: SettingsSource, protector: Arc<dyn SecretProtector>) -> Self {
        Self {
            source,
            protector,
            provider: None,
            placement: SectionPlacement::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Resolve the settings path through `provider` instead of the source's base directory.
    pub fn with_file_provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_placement(mut self, placement: SectionPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn source(&self) -> &SettingsSource {
        &self.source
    }

    pub fn placement(&self) -> SectionPlacement {
        self.placement
    }

    /// Physical location of the settings file.
    pub fn physical_path(&self) -> Result<PathBuf> {
        match &self.provider {
            Some(provider) => self.source.resolve_with(provider.as_ref()),
            None => self.source.resolve_path(),
        }
    }

    /// Replace `section` of the settings file with `value`.
    ///
    /// A missing file is created. When the source reloads on change, this
    /// waits for the watcher to pick up the write before returning.
    #[instrument(skip(self, value), fields(path = %self.source.path))]
    pub async fn update_settings<T>(&self, section: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = self.physical_path()?;
        let _guard = self.write_lock.lock().await;

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Settings file does not exist yet");
                None
            }
            Err(e) => {
                return Err(SettingsError::io(format!("failed to read {}", path.display()), e));
            }
        };

        let updated =
            update_document(existing.as_deref(), section, value, self.protector.as_ref(), self.placement)?;

        write_replacing(&path, updated.as_bytes()).await?;

        info!(section = %section, bytes = updated.len(), "Updated settings section");

        if let Some(delay) = self.source.settle_delay() {
            debug!(delay_ms = delay.as_millis() as u64, "Waiting for settings reload");
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the old document or the new one, never a truncated file.
async fn write_replacing(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("settings");
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Err(e) = tokio::fs::write(&temp, contents).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(SettingsError::io(format!("failed to write {}", temp.display()), e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(SettingsError::io(format!("failed to replace {}", path.display()), e));
    }

    debug!(path = %path.display(), bytes = contents.len(), "Replaced settings file");
    Ok(())
}

impl std::fmt::Debug for JsonSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSettingsStore")
            .field("source", &self.source)
            .field("placement", &self.placement)
            .field("custom_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}
