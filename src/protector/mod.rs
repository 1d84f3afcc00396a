//! Secret protection capability.
//!
//! The codec and the flattener never touch key material directly. They go
//! through the [`SecretProtector`] trait, which turns plaintext into an opaque
//! text blob and back. [`AesGcmProtector`] is the host-scoped default.
//!
//! ```rust,ignore
//! use sealed_settings::protector::{AesGcmProtector, SecretProtector};
//!
//! let protector = AesGcmProtector::host_default(Some(Path::new("/var/lib/app/settings.key")))?;
//! let sealed = protector.protect("hunter2")?;
//! assert_eq!(protector.unprotect(&sealed)?, "hunter2");
//! ```

pub mod aes;
pub mod error;

use std::sync::Arc;

pub use aes::{generate_key, AesGcmProtector, MASTER_KEY_ENV};
pub use error::ProtectorError;

/// Turns plaintext setting values into ciphertext and back.
///
/// `protect` may be non-deterministic. `unprotect` must fail with
/// [`ProtectorError::Decryption`] on malformed or foreign input.
pub trait SecretProtector: Send + Sync {
    /// Encrypt `plaintext` into a text-safe blob.
    fn protect(&self, plaintext: &str) -> Result<String, ProtectorError>;

    /// Decrypt a blob produced by [`protect`](Self::protect).
    fn unprotect(&self, ciphertext: &str) -> Result<String, ProtectorError>;
}

impl<T: SecretProtector + ?Sized> SecretProtector for Arc<T> {
    fn protect(&self, plaintext: &str) -> Result<String, ProtectorError> {
        (**self).protect(plaintext)
    }

    fn unprotect(&self, ciphertext: &str) -> Result<String, ProtectorError> {
        (**self).unprotect(ciphertext)
    }
}

impl<T: SecretProtector + ?Sized> SecretProtector for &T {
    fn protect(&self, plaintext: &str) -> Result<String, ProtectorError> {
        (**self).protect(plaintext)
    }

    fn unprotect(&self, ciphertext: &str) -> Result<String, ProtectorError> {
        (**self).unprotect(ciphertext)
    }
}
