//! # Settings Source
//!
//! Where a settings document lives and how the host wants it handled:
//! the logical path, whether the file may be missing, and whether an external
//! watcher reloads it after writes.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Result, SettingsError};

/// Extra time waited after the watcher's reload delay before an update returns.
pub const SETTLE_MARGIN: Duration = Duration::from_millis(50);

/// Resolves a logical settings path to a physical file location.
pub trait FileProvider: Send + Sync {
    fn resolve(&self, logical_path: &str) -> Result<PathBuf>;
}

/// File provider rooted at a directory on the local file system.
#[derive(Debug, Clone)]
pub struct PhysicalFileProvider {
    root: PathBuf,
}

impl PhysicalFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provider rooted at the process working directory.
    pub fn from_current_dir() -> Result<Self> {
        let root = std::env::current_dir()
            .map_err(|e| SettingsError::path_resolution(".", format!("no working directory: {}", e)))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileProvider for PhysicalFileProvider {
    fn resolve(&self, logical_path: &str) -> Result<PathBuf> {
        if logical_path.trim().is_empty() {
            return Err(SettingsError::path_resolution(logical_path, "path is empty"));
        }

        let relative = Path::new(logical_path);
        if relative.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(SettingsError::path_resolution(logical_path, "path escapes the provider root"));
        }

        let physical = if relative.is_absolute() { relative.to_path_buf() } else { self.root.join(relative) };

        match physical.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                Err(SettingsError::path_resolution(
                    logical_path,
                    format!("directory '{}' does not exist", parent.display()),
                ))
            }
            _ => Ok(physical),
        }
    }
}

/// Settings file source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct SettingsSource {
    /// Logical path of the settings file
    #[validate(length(min = 1, message = "Settings path cannot be empty"))]
    pub path: String,

    /// Missing file is an empty document instead of an error when loading
    pub optional: bool,

    /// An external watcher reloads the file after it changes
    pub reload_on_change: bool,

    /// Watcher debounce in milliseconds
    #[validate(range(max = 60000, message = "Reload delay must be at most 60 seconds"))]
    pub reload_delay_ms: u64,

    /// Root directory for relative paths (defaults to the working directory)
    pub base_dir: Option<PathBuf>,
}

impl Default for SettingsSource {
    fn default() -> Self {
        Self {
            path: "appsettings.json".to_string(),
            optional: false,
            reload_on_change: true,
            reload_delay_ms: 250,
            base_dir: None,
        }
    }
}

impl SettingsSource {
    /// Source for `path` with default flags.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn reload_on_change(mut self, reload_on_change: bool) -> Self {
        self.reload_on_change = reload_on_change;
        self
    }

    pub fn reload_delay_ms(mut self, reload_delay_ms: u64) -> Self {
        self.reload_delay_ms = reload_delay_ms;
        self
    }

    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Get reload delay as Duration
    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }

    /// Minimum wait after a write before an update may return, `None` when
    /// reloading is disabled.
    pub fn settle_delay(&self) -> Option<Duration> {
        self.reload_on_change.then(|| self.reload_delay() + SETTLE_MARGIN)
    }

    /// Resolve the physical path with the default provider.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(root) => self.resolve_with(&PhysicalFileProvider::new(root)),
            None => self.resolve_with(&PhysicalFileProvider::from_current_dir()?),
        }
    }

    /// Resolve the physical path with a caller-supplied provider.
    pub fn resolve_with(&self, provider: &dyn FileProvider) -> Result<PathBuf> {
        provider.resolve(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source() {
        let source = SettingsSource::default();
        assert_eq!(source.path, "appsettings.json");
        assert!(!source.optional);
        assert!(source.reload_on_change);
        assert_eq!(source.reload_delay(), Duration::from_millis(250));
        assert!(source.validate().is_ok());
    }

    #[test]
    fn test_settle_delay() {
        let source = SettingsSource::new("a.json").reload_delay_ms(100);
        assert_eq!(source.settle_delay(), Some(Duration::from_millis(150)));

        let source = source.reload_on_change(false);
        assert_eq!(source.settle_delay(), None);
    }

    #[test]
    fn test_empty_path_fails_validation() {
        let source = SettingsSource::new("");
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_resolve_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PhysicalFileProvider::new(dir.path());
        let resolved = provider.resolve("settings.json").unwrap();
        assert_eq!(resolved, dir.path().join("settings.json"));
    }

    #[test]
    fn test_resolve_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PhysicalFileProvider::new(dir.path());
        let err = provider.resolve("missing/settings.json").unwrap_err();
        assert!(matches!(err, SettingsError::PathResolution { .. }));
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let provider = PhysicalFileProvider::new("/tmp");
        assert!(provider.resolve("../etc/settings.json").is_err());
        assert!(provider.resolve("  ").is_err());
    }

    #[test]
    fn test_source_resolves_with_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = SettingsSource::new("app.json").base_dir(dir.path());
        assert_eq!(source.resolve_path().unwrap(), dir.path().join("app.json"));
    }
}
