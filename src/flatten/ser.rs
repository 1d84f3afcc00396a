//! Serde serializer producing a [`SettingsNode`] tree.
//!
//! Mirrors the layout `serde_json::to_value` produces (externally tagged
//! enums, `None` as null, non-finite floats as null) with two additions:
//! [`Secret`](super::Secret) values become [`SettingsNode::Secret`], and
//! `serde_json` arbitrary-precision numbers keep their literal text.

use std::str::FromStr;

use serde::ser::{self, Serialize};
use serde_json::{Number, Value};

use super::node::{SettingsNode, SECRET_TOKEN};
use crate::errors::{Result, SettingsError};

/// Struct name `serde_json` uses for arbitrary-precision numbers.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Serialize any value into a settings tree.
pub fn to_node<T>(value: &T) -> Result<SettingsNode>
where
    T: Serialize + ?Sized,
{
    value.serialize(NodeSerializer)
}

fn float_node(value: Value) -> SettingsNode {
    match value {
        Value::Number(n) => SettingsNode::Number(n),
        _ => SettingsNode::Null,
    }
}

pub struct NodeSerializer;

impl ser::Serializer for NodeSerializer {
    type Ok = SettingsNode;
    type Error = SettingsError;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<SettingsNode> {
        Ok(SettingsNode::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_u8(self, v: u8) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<SettingsNode> {
        Ok(SettingsNode::Number(v.into()))
    }

    fn serialize_f32(self, v: f32) -> Result<SettingsNode> {
        Ok(float_node(Value::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<SettingsNode> {
        Ok(float_node(Value::from(v)))
    }

    fn serialize_char(self, v: char) -> Result<SettingsNode> {
        Ok(SettingsNode::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<SettingsNode> {
        Ok(SettingsNode::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<SettingsNode> {
        Ok(SettingsNode::Seq(v.iter().map(|b| SettingsNode::Number((*b).into())).collect()))
    }

    fn serialize_none(self) -> Result<SettingsNode> {
        Ok(SettingsNode::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<SettingsNode>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<SettingsNode> {
        Ok(SettingsNode::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<SettingsNode> {
        Ok(SettingsNode::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<SettingsNode> {
        Ok(SettingsNode::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<SettingsNode>
    where
        T: ?Sized + Serialize,
    {
        if name == SECRET_TOKEN {
            Ok(SettingsNode::Secret(Box::new(value.serialize(NodeSerializer)?)))
        } else {
            value.serialize(self)
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<SettingsNode>
    where
        T: ?Sized + Serialize,
    {
        Ok(SettingsNode::Map(vec![(variant.to_string(), value.serialize(NodeSerializer)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec { items: Vec::with_capacity(len.unwrap_or(0)) })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant> {
        Ok(SerializeTupleVariant { variant, items: Vec::with_capacity(len) })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap::Map { entries: Vec::with_capacity(len.unwrap_or(0)), next_key: None })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<SerializeMap> {
        if name == NUMBER_TOKEN {
            Ok(SerializeMap::Number { number: None })
        } else {
            self.serialize_map(Some(len))
        }
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant> {
        Ok(SerializeStructVariant { variant, entries: Vec::with_capacity(len) })
    }
}

pub struct SerializeVec {
    items: Vec<SettingsNode>,
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    items: Vec<SettingsNode>,
}

pub enum SerializeMap {
    Map { entries: Vec<(String, SettingsNode)>, next_key: Option<String> },
    Number { number: Option<Number> },
}

pub struct SerializeStructVariant {
    variant: &'static str,
    entries: Vec<(String, SettingsNode)>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<SettingsNode> {
        Ok(SettingsNode::Seq(self.items))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<SettingsNode> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<SettingsNode> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<SettingsNode> {
        Ok(SettingsNode::Map(vec![(self.variant.to_string(), SettingsNode::Seq(self.items))]))
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match self {
            SerializeMap::Map { next_key, .. } => {
                let key = key.serialize(NodeSerializer)?.into_key().ok_or_else(|| {
                    SettingsError::Serialization("map key must be a string, number or bool".into())
                })?;
                *next_key = Some(key);
                Ok(())
            }
            SerializeMap::Number { .. } => {
                Err(SettingsError::Serialization("unexpected map key in number".into()))
            }
        }
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match self {
            SerializeMap::Map { entries, next_key } => {
                let key = next_key.take().ok_or_else(|| {
                    SettingsError::Serialization("map value serialized before its key".into())
                })?;
                entries.push((key, value.serialize(NodeSerializer)?));
                Ok(())
            }
            SerializeMap::Number { .. } => {
                Err(SettingsError::Serialization("unexpected map value in number".into()))
            }
        }
    }

    fn end(self) -> Result<SettingsNode> {
        match self {
            SerializeMap::Map { entries, .. } => Ok(SettingsNode::Map(entries)),
            SerializeMap::Number { number } => number
                .map(SettingsNode::Number)
                .ok_or_else(|| SettingsError::Serialization("number without a value".into())),
        }
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match self {
            SerializeMap::Map { entries, .. } => {
                entries.push((key.to_string(), value.serialize(NodeSerializer)?));
                Ok(())
            }
            SerializeMap::Number { number } => {
                let SettingsNode::String(literal) = value.serialize(NodeSerializer)? else {
                    return Err(SettingsError::Serialization("number literal must be a string".into()));
                };
                let parsed = Number::from_str(&literal)
                    .map_err(|e| SettingsError::Serialization(format!("invalid number literal: {}", e)))?;
                *number = Some(parsed);
                Ok(())
            }
        }
    }

    fn end(self) -> Result<SettingsNode> {
        ser::SerializeMap::end(self)
    }
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = SettingsNode;
    type Error = SettingsError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((key.to_string(), value.serialize(NodeSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<SettingsNode> {
        Ok(SettingsNode::Map(vec![(self.variant.to_string(), SettingsNode::Map(self.entries))]))
    }
}
