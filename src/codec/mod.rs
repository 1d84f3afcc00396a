//! # Tree Codec
//!
//! Converts between a JSON settings document and its [`FlatModel`].
//!
//! - [`decode`] walks the document depth-first and emits one flat entry per
//!   leaf, in document order. Objects extend the path with `:<field>`,
//!   arrays with `:<index>`. Empty containers are kept as leaves.
//! - [`encode`] rebuilds the tree. A container whose child segments are
//!   exactly the indices `0..n` becomes an array; anything else, including
//!   sparse numeric keys such as `404` and `500`, becomes an object.
//!
//! `encode(decode(doc))` reproduces `doc` (field order, array order, number
//! literals) with two caveats:
//!
//! - field names containing the separator are split into nested objects;
//! - an object whose field names are exactly `"0"`, `"1"`, ... `"n"` is
//!   indistinguishable from an array in flat form and is written back as one.
//!
//! Keys are case-insensitive, so sibling fields that differ only by case
//! are rejected by [`decode`] as a format error.

pub mod lenient;

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::flat::{key, FlatModel, FlatValue};

/// Parse settings text, accepting comments and trailing commas.
///
/// Blank text is an empty document.
pub fn parse(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let relaxed = lenient::relax(text)?;
    Ok(serde_json::from_str(&relaxed)?)
}

/// Serialize a document with 2-space indentation.
pub fn render(document: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Flatten a document into ordered key/value pairs.
pub fn decode(document: &Value) -> Result<FlatModel> {
    let Value::Object(fields) = document else {
        return Err(SettingsError::format("top-level JSON element must be an object"));
    };

    let mut model = FlatModel::new();
    visit_fields(fields, "", &mut model)?;

    debug!(keys = model.len(), "Decoded settings document");
    Ok(model)
}

/// Parse and decode settings text.
pub fn decode_str(text: &str) -> Result<FlatModel> {
    decode(&parse(text)?)
}

fn visit_fields(fields: &Map<String, Value>, path: &str, model: &mut FlatModel) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for (name, child) in fields {
        if !seen.insert(key::fold(name)) {
            let parent = if path.is_empty() { "<root>" } else { path };
            return Err(SettingsError::format(format!(
                "duplicate field '{}' under '{}' (field names are case-insensitive)",
                name, parent
            )));
        }
        visit(child, key::join(path, name), model)?;
    }
    Ok(())
}

fn visit(value: &Value, path: String, model: &mut FlatModel) -> Result<()> {
    let leaf = match value {
        Value::Object(fields) if !fields.is_empty() => return visit_fields(fields, &path, model),
        Value::Array(items) if !items.is_empty() => {
            for (position, child) in items.iter().enumerate() {
                visit(child, key::join(&path, &position.to_string()), model)?;
            }
            return Ok(());
        }
        Value::Object(_) => FlatValue::EmptyObject,
        Value::Array(_) => FlatValue::EmptyArray,
        Value::Null => FlatValue::Null,
        Value::Bool(b) => FlatValue::Bool(*b),
        Value::Number(n) => FlatValue::Number(n.clone()),
        Value::String(s) => FlatValue::String(s.clone()),
    };

    // A field name containing the separator can collide with a nested path.
    if model.contains_key(&path) {
        return Err(SettingsError::format(format!("duplicate settings key '{}'", path)));
    }
    model.insert(path, leaf);
    Ok(())
}

/// Rebuild a document from ordered key/value pairs.
pub fn encode(model: &FlatModel) -> Result<Value> {
    let mut root = Branch::default();
    for (flat_key, value) in model.iter() {
        root.insert(flat_key, value.clone())?;
    }

    let document = root.into_object("")?;
    debug!(keys = model.len(), "Encoded settings document");
    Ok(document)
}

/// Encode and render a model.
pub fn encode_to_string(model: &FlatModel) -> Result<String> {
    render(&encode(model)?)
}

/// Partially built node. Children keep first-appearance order and are
/// looked up case-insensitively.
enum Draft {
    Leaf(FlatValue),
    Branch(Branch),
}

#[derive(Default)]
struct Branch {
    children: Vec<(String, Draft)>,
    lookup: HashMap<String, usize>,
}

impl Branch {
    fn position(&self, segment: &str) -> Option<usize> {
        self.lookup.get(&key::fold(segment)).copied()
    }

    fn push(&mut self, segment: &str, draft: Draft) -> usize {
        let position = self.children.len();
        self.lookup.insert(key::fold(segment), position);
        self.children.push((segment.to_string(), draft));
        position
    }

    fn insert(&mut self, flat_key: &str, value: FlatValue) -> Result<()> {
        let segments: Vec<&str> = key::segments(flat_key).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        let mut node = self;
        let mut path = String::new();

        for segment in parents {
            path = key::join(&path, segment);
            let position = match node.position(segment) {
                Some(position) => position,
                None => node.push(segment, Draft::Branch(Branch::default())),
            };

            let child = &mut node.children[position].1;
            if matches!(&*child, Draft::Leaf(leaf) if leaf.is_empty_container()) {
                *child = Draft::Branch(Branch::default());
            }
            node = match child {
                Draft::Branch(branch) => branch,
                Draft::Leaf(_) => {
                    return Err(SettingsError::conflict(
                        path,
                        format!("'{}' needs it to be a container but it holds a value", flat_key),
                    ));
                }
            };
        }

        path = key::join(&path, last);
        match node.position(last) {
            Some(position) => match &mut node.children[position].1 {
                // An empty placeholder never overrides populated children.
                Draft::Branch(_) if value.is_empty_container() => {}
                Draft::Branch(_) => {
                    return Err(SettingsError::conflict(
                        path,
                        "holds a value but other keys use it as a container",
                    ));
                }
                Draft::Leaf(existing) => *existing = value,
            },
            None => {
                node.push(last, Draft::Leaf(value));
            }
        }

        Ok(())
    }

    /// True when the child segments are exactly the indices `0..n`.
    fn is_array(&self) -> bool {
        let count = self.children.len();
        count > 0
            && self
                .children
                .iter()
                .all(|(segment, _)| key::parse_index(segment).is_some_and(|index| index < count))
    }

    fn into_value(self, path: &str) -> Result<Value> {
        if self.is_array() {
            self.into_array(path)
        } else {
            self.into_object(path)
        }
    }

    fn into_object(self, path: &str) -> Result<Value> {
        let mut fields = Map::with_capacity(self.children.len());
        for (segment, draft) in self.children {
            let child_path = key::join(path, &segment);
            let value = draft.into_value(&child_path)?;
            fields.insert(segment, value);
        }
        Ok(Value::Object(fields))
    }

    fn into_array(self, path: &str) -> Result<Value> {
        let mut indexed: Vec<(usize, String, Draft)> = self
            .children
            .into_iter()
            .filter_map(|(segment, draft)| key::parse_index(&segment).map(|index| (index, segment, draft)))
            .collect();
        indexed.sort_by_key(|(index, _, _)| *index);

        let mut items = Vec::with_capacity(indexed.len());
        for (_, segment, draft) in indexed {
            items.push(draft.into_value(&key::join(path, &segment))?);
        }
        Ok(Value::Array(items))
    }
}

impl Draft {
    fn into_value(self, path: &str) -> Result<Value> {
        match self {
            Draft::Leaf(value) => Ok(value.to_json()),
            Draft::Branch(branch) => branch.into_value(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(pairs: &[(&str, FlatValue)]) -> FlatModel {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_decode_paths_in_document_order() {
        let document = json!({
            "Name": "test",
            "Child": { "Age": 25, "Types": ["A", "B"] },
            "Enabled": true,
            "Missing": null
        });

        let model = decode(&document).unwrap();
        let keys: Vec<&str> = model.keys().collect();
        assert_eq!(
            keys,
            vec!["Name", "Child:Age", "Child:Types:0", "Child:Types:1", "Enabled", "Missing"]
        );
        assert_eq!(model.get("Child:Age").and_then(FlatValue::to_config_string).as_deref(), Some("25"));
        assert_eq!(model.get("Missing"), Some(&FlatValue::Null));
    }

    #[test]
    fn test_decode_rejects_non_object_root() {
        assert!(decode(&json!(["A"])).is_err());
        assert!(decode(&json!("text")).is_err());
    }

    #[test]
    fn test_empty_containers_survive() {
        let document = json!({ "Letters": [], "Child": {}, "Name": "x" });
        let model = decode(&document).unwrap();
        assert_eq!(model.get("Letters"), Some(&FlatValue::EmptyArray));
        assert_eq!(model.get("Child"), Some(&FlatValue::EmptyObject));
        assert_eq!(encode(&model).unwrap(), document);
    }

    #[test]
    fn test_encode_builds_arrays_from_indices() {
        let model = flat(&[
            ("Letters:0", "A".into()),
            ("Letters:1", "B".into()),
            ("Items:0:Name", "first".into()),
            ("Items:1:Name", "second".into()),
        ]);
        assert_eq!(
            encode(&model).unwrap(),
            json!({
                "Letters": ["A", "B"],
                "Items": [{ "Name": "first" }, { "Name": "second" }]
            })
        );
    }

    #[test]
    fn test_encode_orders_array_by_index() {
        let model = flat(&[("Letters:1", "B".into()), ("Letters:0", "A".into())]);
        assert_eq!(encode(&model).unwrap(), json!({ "Letters": ["A", "B"] }));
    }

    #[test]
    fn test_numeric_field_with_named_siblings_stays_object() {
        let model = flat(&[("Codes:200", "ok".into()), ("Codes:default", "other".into())]);
        assert_eq!(encode(&model).unwrap(), json!({ "Codes": { "200": "ok", "default": "other" } }));
    }

    #[test]
    fn test_sparse_indices_encode_as_object() {
        let model = flat(&[("Letters:0", "A".into()), ("Letters:2", "C".into())]);
        assert_eq!(encode(&model).unwrap(), json!({ "Letters": { "0": "A", "2": "C" } }));
    }

    #[test]
    fn test_numeric_object_roundtrips() {
        let text = "{\n  \"Http\": {\n    \"404\": \"nf\",\n    \"500\": \"err\"\n  },\n  \"Name\": \"x\"\n}";
        let model = decode_str(text).unwrap();
        assert_eq!(encode_to_string(&model).unwrap(), text);
    }

    #[test]
    fn test_contiguous_numeric_object_becomes_array() {
        let model = decode(&json!({ "Codes": { "1": "one", "0": "zero" } })).unwrap();
        assert_eq!(encode(&model).unwrap(), json!({ "Codes": ["zero", "one"] }));
    }

    #[test]
    fn test_decode_rejects_fields_differing_by_case() {
        let err = decode(&json!({ "a": { "x": 1 }, "A": 2 })).unwrap_err();
        assert!(matches!(err, SettingsError::Format { .. }));
        assert!(err.to_string().contains("case-insensitive"));

        let nested = decode(&json!({ "Child": { "Name": "x", "NAME": "y" } })).unwrap_err();
        assert!(nested.is_format_error());
    }

    #[test]
    fn test_decode_rejects_separator_collision() {
        let err = decode(&json!({ "A:B": 1, "A": { "B": 2 } })).unwrap_err();
        assert!(err.to_string().contains("duplicate settings key 'A:B'"));
    }

    #[test]
    fn test_scalar_then_container_conflicts() {
        let model = flat(&[("Child", "value".into()), ("Child:Name", "x".into())]);
        assert!(matches!(encode(&model).unwrap_err(), SettingsError::StructuralConflict { .. }));
    }

    #[test]
    fn test_container_then_scalar_conflicts() {
        let model = flat(&[("Child:Name", "x".into()), ("Child", "value".into())]);
        assert!(matches!(encode(&model).unwrap_err(), SettingsError::StructuralConflict { .. }));
    }

    #[test]
    fn test_segments_merge_case_insensitively() {
        let model = flat(&[("Child:Name", "x".into()), ("child:Age", 3i64.into())]);
        assert_eq!(encode(&model).unwrap(), json!({ "Child": { "Name": "x", "Age": 3 } }));
    }

    #[test]
    fn test_empty_model_encodes_empty_object() {
        assert_eq!(encode_to_string(&FlatModel::new()).unwrap(), "{}");
    }

    #[test]
    fn test_numeric_root_fields_stay_object() {
        let model = flat(&[("0", "zero".into()), ("1", "one".into())]);
        assert_eq!(encode(&model).unwrap(), json!({ "0": "zero", "1": "one" }));
    }

    #[test]
    fn test_parse_relaxed_and_blank() {
        let value = parse("{\n  \"Name\": \"Old Name\",\n  \"Age\": 25,\n}").unwrap();
        assert_eq!(value, json!({ "Name": "Old Name", "Age": 25 }));
        assert_eq!(parse("  \n").unwrap(), json!({}));
        assert!(matches!(parse("{ \"Name\": }"), Err(SettingsError::Format { .. })));
    }

    #[test]
    fn test_render_preserves_number_literals() {
        let text = "{\n  \"Ratio\": 1.50,\n  \"Big\": 12345678901234567890123,\n  \"Exp\": 1e3\n}";
        let model = decode_str(text).unwrap();
        assert_eq!(encode_to_string(&model).unwrap(), text);
    }

    #[test]
    fn test_roundtrip_canonical_text() {
        let text = r#"{
  "Name": "testName",
  "Child": {
    "Name": "childName",
    "Password*": "***",
    "Types": [
      "A",
      "B"
    ],
    "Data": {
      "A": 1,
      "B": 2
    }
  },
  "Flags": [
    true,
    false,
    null
  ]
}"#;
        let model = decode_str(text).unwrap();
        assert_eq!(encode_to_string(&model).unwrap(), text);
    }
}
