//! # Flat Settings Model
//!
//! The ordered key/value form of a settings document. Keys are colon-joined
//! paths (see [`key`]); values are JSON scalars kept with their literal form
//! so a document can be rebuilt byte-for-byte.
//!
//! Keys are unique case-insensitively. Inserting an existing key replaces its
//! value and spelling but keeps the position it first appeared at, which is
//! the position the key is written back at.

pub mod key;

use std::collections::HashMap;

use serde_json::{Number, Value};

pub use key::{SECRET_MARKER, SEPARATOR};

/// A leaf value of the flat model.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    /// JSON `null`, handed to the host as an absent value.
    Null,
    Bool(bool),
    /// A number with its literal text preserved.
    Number(Number),
    String(String),
    /// An array with no elements.
    EmptyArray,
    /// An object with no fields.
    EmptyObject,
}

impl FlatValue {
    /// Convert a JSON scalar or empty container; `None` for non-empty containers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FlatValue::Null),
            Value::Bool(b) => Some(FlatValue::Bool(*b)),
            Value::Number(n) => Some(FlatValue::Number(n.clone())),
            Value::String(s) => Some(FlatValue::String(s.clone())),
            Value::Array(items) if items.is_empty() => Some(FlatValue::EmptyArray),
            Value::Object(fields) if fields.is_empty() => Some(FlatValue::EmptyObject),
            _ => None,
        }
    }

    /// JSON node for this leaf.
    pub fn to_json(&self) -> Value {
        match self {
            FlatValue::Null => Value::Null,
            FlatValue::Bool(b) => Value::Bool(*b),
            FlatValue::Number(n) => Value::Number(n.clone()),
            FlatValue::String(s) => Value::String(s.clone()),
            FlatValue::EmptyArray => Value::Array(Vec::new()),
            FlatValue::EmptyObject => Value::Object(serde_json::Map::new()),
        }
    }

    /// String form handed to configuration consumers. Null and empty
    /// containers have no value.
    pub fn to_config_string(&self) -> Option<String> {
        match self {
            FlatValue::Null | FlatValue::EmptyArray | FlatValue::EmptyObject => None,
            FlatValue::Bool(b) => Some(b.to_string()),
            FlatValue::Number(n) => Some(n.to_string()),
            FlatValue::String(s) => Some(s.clone()),
        }
    }

    /// True for null and for strings that are empty or whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            FlatValue::Null => true,
            FlatValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// True for the empty container placeholders.
    pub fn is_empty_container(&self) -> bool {
        matches!(self, FlatValue::EmptyArray | FlatValue::EmptyObject)
    }
}

impl From<&str> for FlatValue {
    fn from(value: &str) -> Self {
        FlatValue::String(value.to_string())
    }
}

impl From<String> for FlatValue {
    fn from(value: String) -> Self {
        FlatValue::String(value)
    }
}

impl From<bool> for FlatValue {
    fn from(value: bool) -> Self {
        FlatValue::Bool(value)
    }
}

impl From<i64> for FlatValue {
    fn from(value: i64) -> Self {
        FlatValue::Number(value.into())
    }
}

impl From<u64> for FlatValue {
    fn from(value: u64) -> Self {
        FlatValue::Number(value.into())
    }
}

impl<T: Into<FlatValue>> From<Option<T>> for FlatValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FlatValue::Null, Into::into)
    }
}

/// Ordered, case-insensitively keyed settings.
#[derive(Debug, Clone, Default)]
pub struct FlatModel {
    entries: Vec<(String, FlatValue)>,
    index: HashMap<String, usize>,
}

impl FlatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity), index: HashMap::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a key. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FlatValue>) -> Option<FlatValue> {
        let key = key.into();
        let value = value.into();
        let folded = key::fold(&key);

        match self.index.get(&folded) {
            Some(&position) => {
                let slot = &mut self.entries[position];
                slot.0 = key;
                Some(std::mem::replace(&mut slot.1, value))
            }
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.position(key).map(|position| &self.entries[position].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Stored spelling of a key.
    pub fn key_spelling(&self, key: &str) -> Option<&str> {
        self.position(key).map(|position| self.entries[position].0.as_str())
    }

    /// Remove a key, keeping the relative order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<FlatValue> {
        let position = self.position(key)?;
        let (_, value) = self.entries.remove(position);
        self.reindex();
        Some(value)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &FlatValue) -> bool,
    {
        self.entries.retain(|(key, value)| keep(key, value));
        self.reindex();
    }

    /// Rename `from` to `to`.
    ///
    /// If `to` already exists its value is overwritten in place and `from`
    /// is dropped; otherwise the entry keeps its position under the new name.
    /// Returns false when `from` does not exist.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(position) = self.position(from) else {
            return false;
        };

        match self.position(to) {
            Some(target) if target != position => {
                let (_, value) = self.entries.remove(position);
                let target = if target > position { target - 1 } else { target };
                self.entries[target].1 = value;
                self.reindex();
            }
            _ => {
                self.index.remove(&key::fold(from));
                self.index.insert(key::fold(to), position);
                self.entries[position].0 = to.to_string();
            }
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Materialize the model for a configuration consumer.
    pub fn to_config_map(&self) -> HashMap<String, Option<String>> {
        self.entries.iter().map(|(key, value)| (key.clone(), value.to_config_string())).collect()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(&key::fold(key)).copied()
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, (key, _)) in self.entries.iter().enumerate() {
            self.index.insert(key::fold(key), position);
        }
    }
}

impl PartialEq for FlatModel {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<FlatValue>> FromIterator<(K, V)> for FlatModel {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut model = FlatModel::new();
        model.extend(iter);
        model
    }
}

impl<K: Into<String>, V: Into<FlatValue>> Extend<(K, V)> for FlatModel {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for FlatModel {
    type Item = (String, FlatValue);
    type IntoIter = std::vec::IntoIter<(String, FlatValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
