//! # Secret Flattener
//!
//! Turns an arbitrary settings object into flat key/value pairs under a
//! section prefix, using the same key layout as the [codec](crate::codec) so
//! the result can be encoded straight into a document.
//!
//! Fields wrapped in [`Secret`] are protected on the way out: the value is
//! replaced by the protector's ciphertext and the key's last segment gets the
//! [`SECRET_MARKER`](crate::flat::SECRET_MARKER) suffix.
//!
//! ```rust,ignore
//! #[derive(Serialize)]
//! struct Child {
//!     name: String,
//!     password: Secret<String>,
//! }
//!
//! let model = flatten(&child, "Child", &protector)?;
//! // Child:name      -> "childName"
//! // Child:password* -> "<ciphertext>"
//! ```

pub mod node;
pub mod ser;

use serde::Serialize;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::flat::{key, FlatModel, FlatValue};
use crate::protector::SecretProtector;

pub use node::{Secret, SettingsNode};
pub use ser::to_node;

/// Flatten `value` under `prefix`, protecting every secret leaf.
///
/// Protection failures abort the whole flatten: a secret is never written in
/// plaintext.
pub fn flatten<T, P>(value: &T, prefix: &str, protector: &P) -> Result<FlatModel>
where
    T: Serialize + ?Sized,
    P: SecretProtector + ?Sized,
{
    let node = to_node(value)?;
    flatten_node(node, prefix, protector)
}

/// Flatten an already built settings tree.
pub fn flatten_node<P>(node: SettingsNode, prefix: &str, protector: &P) -> Result<FlatModel>
where
    P: SecretProtector + ?Sized,
{
    let mut flattener = Flattener { protector, model: FlatModel::new(), protected: 0 };
    flattener.walk(node, prefix.to_string(), false)?;

    debug!(
        prefix = %prefix,
        keys = flattener.model.len(),
        protected = flattener.protected,
        "Flattened settings object"
    );
    Ok(flattener.model)
}

struct Flattener<'a, P: ?Sized> {
    protector: &'a P,
    model: FlatModel,
    protected: usize,
}

impl<P: SecretProtector + ?Sized> Flattener<'_, P> {
    fn walk(&mut self, node: SettingsNode, path: String, secret: bool) -> Result<()> {
        match node {
            SettingsNode::Secret(inner) => self.walk(*inner, path, true),
            SettingsNode::Map(entries) if entries.is_empty() => {
                self.model.insert(path, FlatValue::EmptyObject);
                Ok(())
            }
            SettingsNode::Map(entries) => {
                for (name, child) in entries {
                    let child_path = key::join(&path, &name);
                    self.walk(child, child_path, secret)?;
                }
                Ok(())
            }
            SettingsNode::Seq(items) if items.is_empty() => {
                self.model.insert(path, FlatValue::EmptyArray);
                Ok(())
            }
            SettingsNode::Seq(items) => {
                for (position, child) in items.into_iter().enumerate() {
                    let child_path = key::join(&path, &position.to_string());
                    self.walk(child, child_path, secret)?;
                }
                Ok(())
            }
            SettingsNode::Null => self.leaf(path, FlatValue::Null, secret),
            SettingsNode::Bool(b) => self.leaf(path, FlatValue::Bool(b), secret),
            SettingsNode::Number(n) => self.leaf(path, FlatValue::Number(n), secret),
            SettingsNode::String(s) => self.leaf(path, FlatValue::String(s), secret),
        }
    }

    fn leaf(&mut self, path: String, value: FlatValue, secret: bool) -> Result<()> {
        if !secret {
            self.model.insert(path, value);
            return Ok(());
        }

        let marked = key::mark(&path);
        let stored = match value.to_config_string() {
            Some(plaintext) => {
                let ciphertext = self
                    .protector
                    .protect(&plaintext)
                    .map_err(|source| SettingsError::Encryption { key: marked.clone(), source })?;
                self.protected += 1;
                FlatValue::String(ciphertext)
            }
            None => value,
        };

        self.model.insert(marked, stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protector::ProtectorError;
    use std::collections::BTreeMap;

    /// Reverses the plaintext and tags it so tests can see what was protected.
    struct ReverseProtector;

    impl SecretProtector for ReverseProtector {
        fn protect(&self, plaintext: &str) -> std::result::Result<String, ProtectorError> {
            Ok(format!("enc:{}", plaintext.chars().rev().collect::<String>()))
        }

        fn unprotect(&self, ciphertext: &str) -> std::result::Result<String, ProtectorError> {
            ciphertext
                .strip_prefix("enc:")
                .map(|s| s.chars().rev().collect())
                .ok_or_else(|| ProtectorError::decryption("not produced by ReverseProtector"))
        }
    }

    struct FailingProtector;

    impl SecretProtector for FailingProtector {
        fn protect(&self, _plaintext: &str) -> std::result::Result<String, ProtectorError> {
            Err(ProtectorError::encryption("no key"))
        }

        fn unprotect(&self, _ciphertext: &str) -> std::result::Result<String, ProtectorError> {
            Err(ProtectorError::decryption("no key"))
        }
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct ChildSetting {
        name: String,
        password: Secret<String>,
        types: Vec<String>,
        data: BTreeMap<String, i32>,
    }

    fn child() -> ChildSetting {
        ChildSetting {
            name: "childName".into(),
            password: Secret::new("test".into()),
            types: vec!["A".into(), "B".into()],
            data: BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 2)]),
        }
    }

    #[test]
    fn test_flatten_marks_and_protects_secrets() {
        let model = flatten(&child(), "Child", &ReverseProtector).unwrap();

        let keys: Vec<&str> = model.keys().collect();
        assert_eq!(
            keys,
            vec![
                "Child:Name",
                "Child:Password*",
                "Child:Types:0",
                "Child:Types:1",
                "Child:Data:A",
                "Child:Data:B"
            ]
        );
        assert_eq!(model.get("Child:Password*"), Some(&FlatValue::from("enc:tset")));
        assert_eq!(model.get("Child:Name"), Some(&FlatValue::from("childName")));
        assert_eq!(model.get("Child:Data:A"), Some(&FlatValue::from(1i64)));
        assert!(model.get("Child:Password").is_none());
    }

    #[test]
    fn test_flatten_scalar_section() {
        let model = flatten(&25, "Age", &ReverseProtector).unwrap();
        assert_eq!(model.keys().collect::<Vec<_>>(), vec!["Age"]);
        assert_eq!(model.get("Age"), Some(&FlatValue::from(25i64)));
    }

    #[test]
    fn test_flatten_without_prefix_uses_field_names() {
        let node = SettingsNode::map([("Name", SettingsNode::from("x"))]);
        let model = flatten(&node, "", &ReverseProtector).unwrap();
        assert_eq!(model.keys().collect::<Vec<_>>(), vec!["Name"]);
    }

    #[test]
    fn test_secret_container_marks_every_leaf() {
        let node = SettingsNode::map([("Tokens", SettingsNode::secret(SettingsNode::seq(["a", "b"])))]);
        let model = flatten(&node, "Api", &ReverseProtector).unwrap();
        assert_eq!(model.keys().collect::<Vec<_>>(), vec!["Api:Tokens:0*", "Api:Tokens:1*"]);
        assert_eq!(model.get("Api:Tokens:1*"), Some(&FlatValue::from("enc:b")));
    }

    #[test]
    fn test_secret_null_is_not_protected() {
        let node = SettingsNode::map([("Password", SettingsNode::secret(SettingsNode::Null))]);
        let model = flatten(&node, "Db", &FailingProtector).unwrap();
        assert_eq!(model.get("Db:Password*"), Some(&FlatValue::Null));
    }

    #[test]
    fn test_secret_number_is_protected_as_text() {
        let node = SettingsNode::map([("Pin", SettingsNode::secret(1234i64))]);
        let model = flatten(&node, "Lock", &ReverseProtector).unwrap();
        assert_eq!(model.get("Lock:Pin*"), Some(&FlatValue::from("enc:4321")));
    }

    #[test]
    fn test_empty_containers_are_kept() {
        let node = SettingsNode::map([
            ("Types", SettingsNode::Seq(Vec::new())),
            ("Data", SettingsNode::Map(Vec::new())),
        ]);
        let model = flatten(&node, "Child", &ReverseProtector).unwrap();
        assert_eq!(model.get("Child:Types"), Some(&FlatValue::EmptyArray));
        assert_eq!(model.get("Child:Data"), Some(&FlatValue::EmptyObject));
    }

    #[test]
    fn test_encryption_failure_propagates() {
        let err = flatten(&child(), "Child", &FailingProtector).unwrap_err();
        match err {
            SettingsError::Encryption { key, .. } => assert_eq!(key, "Child:Password*"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plain_fields_are_stable_across_flattens() {
        let first = flatten(&child(), "Child", &ReverseProtector).unwrap();
        let second = flatten(&child(), "Child", &ReverseProtector).unwrap();
        assert_eq!(first, second);
    }
}
