//! # Error Types
//!
//! Error types for settings documents, secret handling and file access using `thiserror`.

use std::path::PathBuf;

use crate::protector::ProtectorError;

/// Custom result type for settings operations
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Main error type for settings operations
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// Invalid JSON syntax or an unsupported document shape
    #[error("Malformed settings document: {message}")]
    Format {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Two flat keys imply different node kinds at the same path
    #[error("Structural conflict at '{path}': {reason}")]
    StructuralConflict { path: String, reason: String },

    /// Protecting a secret value failed
    #[error("Failed to encrypt secret setting '{key}'")]
    Encryption {
        key: String,
        #[source]
        source: ProtectorError,
    },

    /// Unprotecting a marked value failed
    #[error("Failed to decrypt value for '{key}'")]
    Decryption {
        key: String,
        #[source]
        source: ProtectorError,
    },

    /// Section name cannot address a subtree
    #[error("Invalid section name '{section}': {reason}")]
    InvalidSection { section: String, reason: String },

    /// Settings object could not be serialized into a settings tree
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage location for the settings file cannot be determined
    #[error("Cannot resolve settings path '{path}': {reason}")]
    PathResolution { path: String, reason: String },

    /// A required settings file does not exist
    #[error("Settings file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl SettingsError {
    /// Create a format error without an underlying parser error
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format { message: message.into(), source: None }
    }

    /// Create a structural conflict error
    pub fn conflict<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::StructuralConflict { path: path.into(), reason: reason.into() }
    }

    /// Create an invalid section error
    pub fn invalid_section<S: Into<String>, R: Into<String>>(section: S, reason: R) -> Self {
        Self::InvalidSection { section: section.into(), reason: reason.into() }
    }

    /// Create a path resolution error
    pub fn path_resolution<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::PathResolution { path: path.into(), reason: reason.into() }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    /// True for errors raised while transforming a document (never worth retrying)
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SettingsError::Format { .. } | SettingsError::StructuralConflict { .. }
        )
    }

    /// True for a failure to unprotect a marked value
    pub fn is_decryption_error(&self) -> bool {
        matches!(self, SettingsError::Decryption { .. })
    }
}

impl serde::ser::Error for SettingsError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Format {
            message: format!("invalid JSON at line {} column {}", error.line(), error.column()),
            source: Some(error),
        }
    }
}

impl From<config::ConfigError> for SettingsError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for SettingsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = SettingsError::config("Test configuration error");
        assert!(matches!(error, SettingsError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_conflict_display() {
        let error = SettingsError::conflict("Child:Name", "scalar and container at the same path");
        assert_eq!(
            error.to_string(),
            "Structural conflict at 'Child:Name': scalar and container at the same path"
        );
        assert!(error.is_format_error());
    }

    #[test]
    fn test_decryption_error_keeps_source() {
        let error = SettingsError::Decryption {
            key: "Child:Password*".into(),
            source: ProtectorError::decryption("authentication failed"),
        };
        assert!(error.is_decryption_error());
        assert!(!error.is_format_error());
        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Decryption failed: authentication failed"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: SettingsError = io_error.into();
        assert!(matches!(error, SettingsError::Io { .. }));

        let json_error = serde_json::from_str::<serde_json::Value>("{ invalid").unwrap_err();
        let error: SettingsError = json_error.into();
        assert!(matches!(error, SettingsError::Format { source: Some(_), .. }));
        assert!(error.to_string().contains("line 1"));
    }
}
