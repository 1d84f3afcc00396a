//! # Settings Store
//!
//! Replaces one section of a settings document and writes the result back.
//!
//! An update is a read-modify-write over the flat form of the document:
//!
//! 1. decode the current document (a missing document is empty),
//! 2. drop every key belonging to the section,
//! 3. flatten the new value under the section name, protecting secrets,
//! 4. splice the new keys in (see [`SectionPlacement`]),
//! 5. encode and render.
//!
//! Existing ciphertext outside the section is carried over untouched, so an
//! update never needs to decrypt anything.

pub mod file;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::errors::{Result, SettingsError};
use crate::flat::{key, FlatModel};
use crate::flatten::flatten;
use crate::protector::SecretProtector;

pub use file::JsonSettingsStore;

/// Where a replaced or new section lands in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPlacement {
    /// At the position of the section's first existing key; new sections go last.
    #[default]
    InPlace,
    /// Always at the end of the document.
    Append,
}

/// Reject section names that cannot address a subtree.
pub fn validate_section(section: &str) -> Result<()> {
    if section.trim().is_empty() {
        return Err(SettingsError::invalid_section(section, "section name is empty"));
    }
    if section.starts_with(key::SEPARATOR) || section.ends_with(key::SEPARATOR) {
        return Err(SettingsError::invalid_section(section, "section name cannot start or end with ':'"));
    }
    if key::segments(section).any(str::is_empty) {
        return Err(SettingsError::invalid_section(section, "section name has an empty segment"));
    }
    if key::is_marked(section) {
        return Err(SettingsError::invalid_section(section, "section name cannot end with the secret marker"));
    }
    Ok(())
}

/// Replace every key of `section` in `existing` with `inserted`.
///
/// Keys outside the section keep their values and relative order.
pub fn merge_section(
    existing: FlatModel,
    section: &str,
    inserted: FlatModel,
    placement: SectionPlacement,
) -> FlatModel {
    let mut survivors = Vec::with_capacity(existing.len());
    let mut anchor = None;
    let mut removed = 0usize;

    for (flat_key, value) in existing {
        if key::belongs_to_section(&flat_key, section) {
            anchor.get_or_insert(survivors.len());
            removed += 1;
        } else {
            survivors.push((flat_key, value));
        }
    }

    let split_at = match placement {
        SectionPlacement::InPlace => anchor.unwrap_or(survivors.len()),
        SectionPlacement::Append => survivors.len(),
    };
    let tail = survivors.split_off(split_at);
    let inserted_count = inserted.len();

    let mut merged = FlatModel::with_capacity(survivors.len() + inserted_count + tail.len());
    merged.extend(survivors);
    merged.extend(inserted);
    merged.extend(tail);

    debug!(
        section = %section,
        removed,
        inserted = inserted_count,
        placement = ?placement,
        "Merged settings section"
    );
    merged
}

/// Replace `section` of the document text `existing` with `value`.
///
/// `None` means the document does not exist yet. Returns the new document text.
pub fn update_document<T, P>(
    existing: Option<&str>,
    section: &str,
    value: &T,
    protector: &P,
    placement: SectionPlacement,
) -> Result<String>
where
    T: Serialize + ?Sized,
    P: SecretProtector + ?Sized,
{
    validate_section(section)?;

    let current = match existing {
        Some(text) => codec::decode_str(text)?,
        None => FlatModel::new(),
    };
    let inserted = flatten(value, section, protector)?;
    let merged = merge_section(current, section, inserted, placement);

    codec::encode_to_string(&merged)
}
