//! Field mapping between internal field names and backend wire keys.
//!
//! # Design
//! Every payload and model declares one ordered `FieldMapping`. The Rust
//! struct is serialized with serde under its own field names (the internal
//! side), then the mapping renames those keys to the wire side. Decoding runs
//! the same table backwards before handing the object to serde. A type that
//! extends another composes tables with `FieldMapping::merge` instead of
//! inheriting one.
//!
//! Payload fields that need to distinguish "not sent" from "sent as null"
//! use `Field<T>`.

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{error, warn};

/// Ordered `internal -> wire` key table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(&'static str, &'static str)>,
}

impl FieldMapping {
    /// Build a table from `(internal, wire)` pairs.
    ///
    /// # Panics
    /// Panics when an internal key or a wire key appears twice. That is a
    /// declaration bug, not a runtime condition.
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        let mut mapping = Self::default();
        for &(internal, wire) in entries {
            assert!(
                mapping.wire_key(internal).is_none(),
                "internal key `{internal}` is declared more than once"
            );
            mapping.insert(internal, wire);
        }
        mapping
    }

    /// Compose a parent table with child additions. Child entries come after
    /// the parent's; a child entry for an existing internal key replaces the
    /// parent's wire key in place.
    #[must_use]
    pub fn merge(mut self, child: Self) -> Self {
        for (internal, wire) in child.entries {
            self.insert(internal, wire);
        }
        self
    }

    fn insert(&mut self, internal: &'static str, wire: &'static str) {
        assert!(
            !self
                .entries
                .iter()
                .any(|&(other, taken)| taken == wire && other != internal),
            "wire key `{wire}` is mapped more than once"
        );
        match self.entries.iter_mut().find(|(key, _)| *key == internal) {
            Some(entry) => entry.1 = wire,
            None => self.entries.push((internal, wire)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries.iter().copied()
    }

    pub fn wire_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|&(_, wire)| wire)
    }

    pub fn internal_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|&(internal, _)| internal)
    }

    pub fn wire_key(&self, internal: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(key, _)| *key == internal)
            .map(|&(_, wire)| wire)
    }

    pub fn internal_key(&self, wire: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, key)| *key == wire)
            .map(|&(internal, _)| internal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rename an internal-keyed object to wire keys. Keys absent from
    /// `internal` are skipped; keys present with `null` are kept.
    pub fn to_wire(&self, internal: &Map<String, Value>) -> Map<String, Value> {
        let mut wire = Map::new();
        for (internal_key, wire_key) in self.iter() {
            if let Some(value) = internal.get(internal_key) {
                wire.insert(wire_key.to_string(), value.clone());
            }
        }
        wire
    }

    /// Rename a wire-keyed object to internal keys, dropping unmapped keys.
    pub fn to_internal(&self, wire: &Map<String, Value>) -> Map<String, Value> {
        let mut internal = Map::new();
        for (internal_key, wire_key) in self.iter() {
            if let Some(value) = wire.get(wire_key) {
                internal.insert(internal_key.to_string(), value.clone());
            }
        }
        internal
    }
}

/// A payload value that can be left out, sent as `null`, or set.
///
/// Declare it with `#[serde(default, skip_serializing_if = "Field::is_undefined")]`
/// so an `Undefined` field never reaches the wire and a missing key decodes
/// back to `Undefined`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Undefined,
    Null,
    Set(T),
}

impl<T> Field<T> {
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Undefined | Self::Null => None,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Undefined
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Undefined | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Set))
    }
}

/// A type that crosses the wire through a `FieldMapping`.
///
/// Implementors derive `Serialize`, `Deserialize` and `Default` and carry
/// `#[serde(default)]` so keys missing on the wire fall back to defaults.
pub trait FieldMapped: Serialize + DeserializeOwned + Default {
    fn field_mapping() -> FieldMapping;

    /// Encode to a wire-keyed object.
    ///
    /// A type with an empty mapping encodes to `{}`. That is logged, not
    /// reported, so a forgotten declaration shows up as an empty request
    /// body rather than an error.
    fn to_wire(&self) -> Map<String, Value> {
        let mapping = Self::field_mapping();
        if mapping.is_empty() {
            warn!(
                payload = type_name::<Self>(),
                "no field mapping declared, encoding an empty object"
            );
            return Map::new();
        }
        match serde_json::to_value(self) {
            Ok(Value::Object(internal)) => mapping.to_wire(&internal),
            Ok(other) => {
                error!(
                    payload = type_name::<Self>(),
                    kind = json_kind(&other),
                    "payload did not serialize to an object"
                );
                Map::new()
            }
            Err(err) => {
                error!(payload = type_name::<Self>(), error = %err, "payload serialization failed");
                Map::new()
            }
        }
    }

    /// Decode from wire JSON. Never fails: anything that does not fit yields
    /// the type's default.
    fn from_wire(json: &Value) -> Self {
        let Some(wire) = json.as_object() else {
            if !json.is_null() {
                warn!(
                    model = type_name::<Self>(),
                    kind = json_kind(json),
                    "expected a JSON object, using defaults"
                );
            }
            return Self::default();
        };
        let internal = Self::field_mapping().to_internal(wire);
        serde_json::from_value(Value::Object(internal)).unwrap_or_else(|err| {
            warn!(model = type_name::<Self>(), error = %err, "wire object did not fit, using defaults");
            Self::default()
        })
    }
}

/// Encode `payload` to its wire object.
pub fn serialize<P: FieldMapped>(payload: &P) -> Map<String, Value> {
    payload.to_wire()
}

/// Decode a wire object into `M`.
pub fn deserialize<M: FieldMapped>(json: &Value) -> M {
    M::from_wire(json)
}

pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
