//! # Config Loader
//!
//! Read path: settings text is decoded into a [`FlatModel`], then every key
//! carrying the secret marker is decrypted and renamed to its plain form.
//! The result is what configuration consumers see.
//!
//! Decryption failures go through an optional [`FailureHook`]. A hook that
//! returns `true` suppresses the failure and the key loads as null; without a
//! hook, or when the hook returns `false`, the whole load fails. Format
//! errors never reach the hook.

pub mod provider;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::errors::{Result, SettingsError};
use crate::flat::{key, FlatModel, FlatValue};
use crate::protector::SecretProtector;

pub use provider::JsonConfigProvider;

/// Decides whether a load failure is suppressed (`true`) or fatal (`false`).
pub type FailureHook = Arc<dyn Fn(&LoadFailure) -> bool + Send + Sync>;

/// A failure observed while loading one key.
#[derive(Debug)]
pub struct LoadFailure {
    /// Source path or caller-chosen label of the loading component
    pub component: String,
    /// Flat key as stored, marker included
    pub key: String,
    pub error: SettingsError,
}

/// Decodes settings documents and decrypts their secret values.
#[derive(Clone)]
pub struct ConfigLoader {
    protector: Arc<dyn SecretProtector>,
    component: String,
    on_failure: Option<FailureHook>,
}

impl ConfigLoader {
    pub fn new(protector: Arc<dyn SecretProtector>) -> Self {
        Self { protector, component: "settings".to_string(), on_failure: None }
    }

    /// Label reported in [`LoadFailure::component`].
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Install the decryption failure hook.
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoadFailure) -> bool + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Parse, decode and decrypt settings text.
    pub fn load(&self, text: &str) -> Result<FlatModel> {
        self.unprotect_model(codec::decode_str(text)?)
    }

    /// Decode and decrypt an already parsed document.
    pub fn load_document(&self, document: &Value) -> Result<FlatModel> {
        self.unprotect_model(codec::decode(document)?)
    }

    /// Decrypt every marked key of `model` in place.
    pub fn unprotect_model(&self, mut model: FlatModel) -> Result<FlatModel> {
        let marked: Vec<String> =
            model.keys().filter(|k| key::is_marked(k)).map(str::to_string).collect();

        let mut decrypted = 0usize;
        let mut suppressed = 0usize;

        for marked_key in marked {
            let Some(plain_key) = key::strip_marker(&marked_key).filter(|k| !k.is_empty()) else {
                continue;
            };
            let Some(stored) = model.get(&marked_key).cloned() else {
                continue;
            };

            let plain = if stored.is_blank() || stored.is_empty_container() {
                stored
            } else {
                let ciphertext = stored.to_config_string().unwrap_or_default();
                match self.protector.unprotect(&ciphertext) {
                    Ok(plaintext) => {
                        decrypted += 1;
                        FlatValue::String(plaintext)
                    }
                    Err(source) => {
                        let error = SettingsError::Decryption { key: marked_key.clone(), source };
                        self.handle_failure(&marked_key, error)?;
                        suppressed += 1;
                        FlatValue::Null
                    }
                }
            };

            model.insert(marked_key.as_str(), plain);
            model.rename(&marked_key, plain_key);
        }

        debug!(
            component = %self.component,
            keys = model.len(),
            decrypted,
            suppressed,
            "Loaded settings"
        );
        Ok(model)
    }

    fn handle_failure(&self, marked_key: &str, error: SettingsError) -> Result<()> {
        let failure =
            LoadFailure { component: self.component.clone(), key: marked_key.to_string(), error };

        let suppress = self.on_failure.as_ref().is_some_and(|hook| hook(&failure));
        if !suppress {
            return Err(failure.error);
        }

        warn!(
            component = %failure.component,
            key = %failure.key,
            error = %failure.error,
            "Suppressed secret decryption failure, value is null"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("component", &self.component)
            .field("has_failure_hook", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}
