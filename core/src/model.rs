//! Composition of typed sub-models inside mapped types.
//!
//! A nested field arrives either as raw wire JSON (decoded from a response)
//! or as an already-built model (set by code). `wrap_model` accepts both and
//! never builds a model twice. The `nested` and `nested_list` serde modules
//! route nested fields through the sub-model's own mapping, so a parent's
//! wire form carries wire keys all the way down.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::mapping::FieldMapped;

/// Input to `wrap_model`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource<M> {
    Typed(M),
    Raw(Value),
}

/// Typed values pass through untouched, raw objects are decoded through the
/// model's mapping, anything else is `None`.
pub fn wrap_model<M: FieldMapped>(source: ModelSource<M>) -> Option<M> {
    match source {
        ModelSource::Typed(model) => Some(model),
        ModelSource::Raw(value @ Value::Object(_)) => Some(M::from_wire(&value)),
        ModelSource::Raw(_) => None,
    }
}

/// Decode every object element of an array; non-arrays give an empty list.
pub fn wrap_models<M: FieldMapped>(value: Value) -> Vec<M> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| wrap_model(ModelSource::Raw(item)))
            .collect(),
        _ => Vec::new(),
    }
}

/// `#[serde(with = "model::nested")]` for `Option<M>` fields.
pub mod nested {
    use super::*;

    pub fn serialize<M: FieldMapped, S: Serializer>(
        value: &Option<M>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(model) => model.to_wire().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, M: FieldMapped, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<M>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(wrap_model(ModelSource::Raw(value)))
    }
}

/// `#[serde(with = "model::nested_list")]` for `Vec<M>` fields.
pub mod nested_list {
    use super::*;

    pub fn serialize<M: FieldMapped, S: Serializer>(
        value: &[M],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter().map(FieldMapped::to_wire))
    }

    pub fn deserialize<'de, M: FieldMapped, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<M>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(wrap_models(value))
    }
}
