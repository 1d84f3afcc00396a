//! Error types for secret protection.

use thiserror::Error;

/// Errors raised by a [`SecretProtector`](super::SecretProtector).
#[derive(Error, Debug)]
pub enum ProtectorError {
    /// Plaintext could not be sealed.
    #[error("Encryption failed: {message}")]
    Encryption { message: String },

    /// Ciphertext is malformed, foreign, or was sealed with another key.
    #[error("Decryption failed: {message}")]
    Decryption { message: String },

    /// Key material is missing or has the wrong shape.
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// Reading or writing the key file failed.
    #[error("Key storage error: {context}")]
    KeyStorage {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl ProtectorError {
    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Create a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption { message: message.into() }
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey { message: message.into() }
    }

    /// Create a key storage error.
    pub fn key_storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::KeyStorage { source, context: context.into() }
    }
}
