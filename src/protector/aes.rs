//! Host-scoped secret protector using AES-256-GCM
//!
//! Every call to [`AesGcmProtector::protect`] seals the plaintext under a fresh
//! random nonce, so protecting the same value twice yields different text.
//! The text form is standard base64 of `nonce || ciphertext || tag`.
//!
//! ## Key material
//!
//! The 32-byte key is private to the host it was created on:
//! - `SEALED_SETTINGS_MASTER_KEY` - Base64-encoded 32-byte key, or
//! - a key file, generated with a random key on first use.
//!
//! Values protected on one host do not decrypt on another unless the key is
//! copied along with the settings file.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{ProtectorError, SecretProtector};

/// Environment variable holding a base64-encoded master key
pub const MASTER_KEY_ENV: &str = "SEALED_SETTINGS_MASTER_KEY";

/// Size of AES-256-GCM key in bytes
const KEY_SIZE: usize = 32;

/// Size of AES-256-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self { nonce: Some(nonce_bytes) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyMaterial([u8; KEY_SIZE]);

/// Default [`SecretProtector`] backed by AES-256-GCM.
#[derive(Clone)]
pub struct AesGcmProtector {
    key: Arc<KeyMaterial>,
    rng: SystemRandom,
}

impl AesGcmProtector {
    /// Create a protector from raw key bytes.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key: Arc::new(KeyMaterial(key)), rng: SystemRandom::new() }
    }

    /// Create a protector from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, ProtectorError> {
        let mut key_bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ProtectorError::invalid_key(format!("invalid base64: {}", e)))?;

        if key_bytes.len() != KEY_SIZE {
            let len = key_bytes.len();
            key_bytes.zeroize();
            return Err(ProtectorError::invalid_key(format!(
                "key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE, len
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&key_bytes);
        key_bytes.zeroize();
        Ok(Self::new(key))
    }

    /// Load the key from [`MASTER_KEY_ENV`]; `None` when the variable is unset.
    pub fn from_env() -> Result<Option<Self>, ProtectorError> {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(encoded) => Self::from_base64(&encoded).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Load the key stored at `path`, generating and persisting a new one if the file is missing.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn load_or_generate(path: &Path) -> Result<Self, ProtectorError> {
        match fs::read_to_string(path) {
            Ok(encoded) => {
                debug!("Loaded settings protection key");
                return Self::from_base64(&encoded);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ProtectorError::key_storage("failed to read key file", e)),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ProtectorError::key_storage("failed to create key directory", e))?;
        }

        let key = generate_key()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(key);

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(path) {
            Ok(mut file) => {
                file.write_all(encoded.as_bytes())
                    .map_err(|e| ProtectorError::key_storage("failed to write key file", e))?;
                info!("Generated new settings protection key");
                Ok(Self::new(key))
            }
            // Another process created the key between our read and create.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let encoded = fs::read_to_string(path)
                    .map_err(|e| ProtectorError::key_storage("failed to read key file", e))?;
                Self::from_base64(&encoded)
            }
            Err(e) => Err(ProtectorError::key_storage("failed to create key file", e)),
        }
    }

    /// Host default: [`MASTER_KEY_ENV`] first, then the key file.
    pub fn host_default(key_file: Option<&Path>) -> Result<Self, ProtectorError> {
        if let Some(protector) = Self::from_env()? {
            debug!("Using settings protection key from environment");
            return Ok(protector);
        }

        match key_file {
            Some(path) => Self::load_or_generate(path),
            None => Err(ProtectorError::invalid_key(format!(
                "{} is not set and no key file is configured",
                MASTER_KEY_ENV
            ))),
        }
    }

    fn unbound_key(&self) -> Result<UnboundKey, ring::error::Unspecified> {
        UnboundKey::new(&AES_256_GCM, &self.key.0)
    }
}

/// Generate a random 32-byte key.
pub fn generate_key() -> Result<[u8; KEY_SIZE], ProtectorError> {
    let mut key = [0u8; KEY_SIZE];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| ProtectorError::invalid_key("failed to generate random key"))?;
    Ok(key)
}

impl SecretProtector for AesGcmProtector {
    fn protect(&self, plaintext: &str) -> Result<String, ProtectorError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ProtectorError::encryption("failed to generate random nonce"))?;

        let unbound_key = self
            .unbound_key()
            .map_err(|_| ProtectorError::encryption("failed to create encryption key"))?;
        let mut sealing_key = aead::SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut sealed = plaintext.as_bytes().to_vec();
        sealed.reserve(TAG_SIZE);
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut sealed)
            .map_err(|_| ProtectorError::encryption("failed to seal value"))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + sealed.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&sealed);

        Ok(base64::engine::general_purpose::STANDARD.encode(output))
    }

    fn unprotect(&self, ciphertext: &str) -> Result<String, ProtectorError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| ProtectorError::decryption(format!("invalid base64: {}", e)))?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(ProtectorError::decryption("ciphertext too short"));
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&raw[..NONCE_SIZE]);

        let unbound_key = self
            .unbound_key()
            .map_err(|_| ProtectorError::decryption("failed to create decryption key"))?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut buffer = raw[NONCE_SIZE..].to_vec();
        let opened = opening_key
            .open_in_place(Aad::empty(), &mut buffer)
            .map_err(|_| ProtectorError::decryption("authentication failed - wrong key or tampered value"))?;

        String::from_utf8(opened.to_vec())
            .map_err(|_| ProtectorError::decryption("decrypted value is not valid UTF-8"))
    }
}

impl std::fmt::Debug for AesGcmProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmProtector").field("key", &"[REDACTED]").finish()
    }
}
