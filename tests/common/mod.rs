//! Common test utilities for all integration tests.
//!
//! Provides mock protectors and temporary settings files.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::path::{Path, PathBuf};

use sealed_settings::protector::{ProtectorError, SecretProtector};
use sealed_settings::SettingsSource;

pub const SETTINGS_FILE: &str = "test.json";

/// Write-only protector: every secret becomes `***`.
pub struct StarProtector;

impl SecretProtector for StarProtector {
    fn protect(&self, _plaintext: &str) -> Result<String, ProtectorError> {
        Ok("***".to_string())
    }

    fn unprotect(&self, _ciphertext: &str) -> Result<String, ProtectorError> {
        Err(ProtectorError::decryption("mock protector cannot decrypt"))
    }
}

/// Reversible protector: `enc:` followed by the reversed plaintext.
pub struct ReverseProtector;

impl SecretProtector for ReverseProtector {
    fn protect(&self, plaintext: &str) -> Result<String, ProtectorError> {
        Ok(format!("enc:{}", plaintext.chars().rev().collect::<String>()))
    }

    fn unprotect(&self, ciphertext: &str) -> Result<String, ProtectorError> {
        ciphertext
            .strip_prefix("enc:")
            .map(|body| body.chars().rev().collect())
            .ok_or_else(|| ProtectorError::decryption("not produced by this protector"))
    }
}

/// Source for `test.json` in `dir` with reloading off.
pub fn test_source(dir: &Path) -> SettingsSource {
    SettingsSource::new(SETTINGS_FILE).base_dir(dir).reload_on_change(false).reload_delay_ms(0)
}

pub fn write_settings(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join(SETTINGS_FILE);
    std::fs::write(&path, text).expect("write settings file");
    path
}

pub fn read_settings(dir: &Path) -> String {
    std::fs::read_to_string(dir.join(SETTINGS_FILE)).expect("read settings file")
}
