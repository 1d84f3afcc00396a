//! Settings tree and the secret marker.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Newtype-struct name that marks a secret value for the settings serializer.
pub(crate) const SECRET_TOKEN: &str = "$sealed_settings::private::Secret";

/// A settings object as seen by the flattener.
///
/// Usually produced from any `Serialize` type by [`to_node`](super::to_node),
/// but it can also be built by hand to describe which fields are secret
/// without deriving anything.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<SettingsNode>),
    /// Fields or map entries in declaration order.
    Map(Vec<(String, SettingsNode)>),
    /// Every leaf beneath this node is protected on write.
    Secret(Box<SettingsNode>),
}

impl SettingsNode {
    /// Mark a node as secret.
    pub fn secret(node: impl Into<SettingsNode>) -> Self {
        SettingsNode::Secret(Box::new(node.into()))
    }

    /// Build a map node from ordered entries.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<SettingsNode>,
        I: IntoIterator<Item = (K, V)>,
    {
        SettingsNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Build a sequence node.
    pub fn seq<V, I>(items: I) -> Self
    where
        V: Into<SettingsNode>,
        I: IntoIterator<Item = V>,
    {
        SettingsNode::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Text form of a scalar used as a map key.
    pub(crate) fn into_key(self) -> Option<String> {
        match self {
            SettingsNode::String(s) => Some(s),
            SettingsNode::Number(n) => Some(n.to_string()),
            SettingsNode::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for SettingsNode {
    fn from(value: &str) -> Self {
        SettingsNode::String(value.to_string())
    }
}

impl From<String> for SettingsNode {
    fn from(value: String) -> Self {
        SettingsNode::String(value)
    }
}

impl From<bool> for SettingsNode {
    fn from(value: bool) -> Self {
        SettingsNode::Bool(value)
    }
}

impl From<i64> for SettingsNode {
    fn from(value: i64) -> Self {
        SettingsNode::Number(value.into())
    }
}

impl Serialize for SettingsNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SettingsNode::Null => serializer.serialize_unit(),
            SettingsNode::Bool(b) => serializer.serialize_bool(*b),
            SettingsNode::Number(n) => n.serialize(serializer),
            SettingsNode::String(s) => serializer.serialize_str(s),
            SettingsNode::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            SettingsNode::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            SettingsNode::Secret(inner) => serializer.serialize_newtype_struct(SECRET_TOKEN, inner.as_ref()),
        }
    }
}

/// Marks a settings field as secret.
///
/// The settings flattener protects the wrapped value and stores it under a
/// marked key. Any other serializer sees the plain value, and deserializing
/// reads the plain value back, so the same settings type works for both
/// writing through the store and reading the decrypted configuration.
///
/// Debug and Display output never show the wrapped value.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Database {
///     host: String,
///     password: Secret<String>,
/// }
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Exposes the wrapped value. Never log the result.
    pub fn expose_secret(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Serialize> Serialize for Secret<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(SECRET_TOKEN, &self.0)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_transparent_to_serde_json() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"hunter2\"");

        let parsed: Secret<String> = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(parsed.expose_secret(), "hunter2");
    }

    #[test]
    fn test_secret_redacts_debug_and_display() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_node_builders() {
        let node = SettingsNode::map([
            ("Name", SettingsNode::from("x")),
            ("Password", SettingsNode::secret("p")),
            ("Types", SettingsNode::seq(["A", "B"])),
        ]);
        let SettingsNode::Map(entries) = node else { panic!("expected map") };
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[1].1, SettingsNode::Secret(_)));
    }
}
