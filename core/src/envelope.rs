//! Response envelopes.
//!
//! # Design
//! Every backend reply is `{success, message, errors, ...}` plus a
//! resource-specific part, conventionally `data`. `BaseEnvelope` holds the
//! common four fields (`status` comes from the transport, never the body).
//! Richer envelopes embed a `BaseEnvelope` and merge its mapping with their
//! own keys; `ApiResponse` is the seam the dispatcher builds them through.

use serde_json::{Map, Value};

use crate::mapping::{FieldMapped, FieldMapping};
use crate::model::{wrap_model, ModelSource};

/// The four fields every reply carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseEnvelope {
    /// HTTP status stamped by the dispatcher; `0` when no reply arrived.
    pub status: u16,
    pub success: bool,
    pub message: Option<String>,
    /// Opaque: a string, an object of field errors, or absent.
    pub errors: Option<Value>,
}

impl BaseEnvelope {
    /// Decode the common fields one by one, so a mistyped `message` does not
    /// cost the `success` flag.
    fn decode(body: Option<&Value>) -> Self {
        let mapping = Self::field_mapping();
        let field = |internal: &str| {
            let wire = mapping.wire_key(internal)?;
            body?.get(wire)
        };
        Self {
            status: 0,
            success: field("success").and_then(Value::as_bool).unwrap_or(false),
            message: field("message").and_then(Value::as_str).map(str::to_string),
            errors: field("errors").filter(|value| !value.is_null()).cloned(),
        }
    }

    fn encode(&self) -> Map<String, Value> {
        let mut internal = Map::new();
        internal.insert("success".to_string(), Value::Bool(self.success));
        internal.insert(
            "message".to_string(),
            self.message.clone().map_or(Value::Null, Value::String),
        );
        internal.insert(
            "errors".to_string(),
            self.errors.clone().unwrap_or(Value::Null),
        );
        Self::field_mapping().to_wire(&internal)
    }
}

/// A response type the dispatcher can build from a parsed body.
pub trait ApiResponse: Default + Send {
    fn field_mapping() -> FieldMapping;

    /// Build from the parsed body; `None` when the body was not JSON.
    fn from_body(body: Option<&Value>) -> Self;

    /// Wire-keyed view, used for diagnostics.
    fn to_wire(&self) -> Map<String, Value>;

    fn base(&self) -> &BaseEnvelope;

    fn base_mut(&mut self) -> &mut BaseEnvelope;

    fn status(&self) -> u16 {
        self.base().status
    }

    fn success(&self) -> bool {
        self.base().success
    }

    fn message(&self) -> Option<&str> {
        self.base().message.as_deref()
    }

    fn errors(&self) -> Option<&Value> {
        self.base().errors.as_ref()
    }

    /// Fields beyond the base four, found by diffing against a bare base
    /// envelope's keys, in mapping order.
    fn extra_fields(&self) -> Vec<(String, Value)> {
        let bare = BaseEnvelope::default().to_wire();
        let wire = self.to_wire();
        Self::field_mapping()
            .wire_keys()
            .filter(|key| !bare.contains_key(*key))
            .map(|key| (key.to_string(), wire.get(key).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Envelope for a call that produced no reply at all.
    fn network_failure(message: impl Into<String>) -> Self {
        let mut envelope = Self::default();
        let base = envelope.base_mut();
        base.status = 0;
        base.success = false;
        base.message = Some(message.into());
        envelope
    }
}

impl ApiResponse for BaseEnvelope {
    fn field_mapping() -> FieldMapping {
        FieldMapping::new(&[
            ("success", "success"),
            ("message", "message"),
            ("errors", "errors"),
        ])
    }

    fn from_body(body: Option<&Value>) -> Self {
        Self::decode(body)
    }

    fn to_wire(&self) -> Map<String, Value> {
        self.encode()
    }

    fn base(&self) -> &BaseEnvelope {
        self
    }

    fn base_mut(&mut self) -> &mut BaseEnvelope {
        self
    }
}

/// A value that can sit in an envelope's `data` slot: a scalar, a model,
/// or a list of either.
pub trait WireValue: Sized {
    fn from_wire_value(value: &Value) -> Option<Self>;

    fn to_wire_value(&self) -> Value;
}

impl<M: FieldMapped> WireValue for M {
    fn from_wire_value(value: &Value) -> Option<Self> {
        wrap_model(ModelSource::Raw(value.clone()))
    }

    fn to_wire_value(&self) -> Value {
        Value::Object(self.to_wire())
    }
}

impl WireValue for Value {
    fn from_wire_value(value: &Value) -> Option<Self> {
        (!value.is_null()).then(|| value.clone())
    }

    fn to_wire_value(&self) -> Value {
        self.clone()
    }
}

impl WireValue for String {
    fn from_wire_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn to_wire_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl WireValue for bool {
    fn from_wire_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn to_wire_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl WireValue for i64 {
    fn from_wire_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }

    fn to_wire_value(&self) -> Value {
        Value::from(*self)
    }
}

impl WireValue for f64 {
    fn from_wire_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }

    fn to_wire_value(&self) -> Value {
        Value::from(*self)
    }
}

impl<T: WireValue> WireValue for Vec<T> {
    fn from_wire_value(value: &Value) -> Option<Self> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(T::from_wire_value).collect())
    }

    fn to_wire_value(&self) -> Value {
        Value::Array(self.iter().map(WireValue::to_wire_value).collect())
    }
}

/// Base envelope plus a typed `data` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEnvelope<D> {
    pub base: BaseEnvelope,
    pub data: Option<D>,
}

impl<D> Default for DataEnvelope<D> {
    fn default() -> Self {
        Self {
            base: BaseEnvelope::default(),
            data: None,
        }
    }
}

impl<D: WireValue + Send> ApiResponse for DataEnvelope<D> {
    fn field_mapping() -> FieldMapping {
        BaseEnvelope::field_mapping().merge(FieldMapping::new(&[("data", "data")]))
    }

    fn from_body(body: Option<&Value>) -> Self {
        let data_key = Self::field_mapping().wire_key("data");
        let data = body
            .zip(data_key)
            .and_then(|(body, key)| body.get(key))
            .and_then(D::from_wire_value);
        Self {
            base: BaseEnvelope::decode(body),
            data,
        }
    }

    fn to_wire(&self) -> Map<String, Value> {
        let mut wire = self.base.encode();
        if let Some(key) = Self::field_mapping().wire_key("data") {
            let data = self
                .data
                .as_ref()
                .map_or(Value::Null, WireValue::to_wire_value);
            wire.insert(key.to_string(), data);
        }
        wire
    }

    fn base(&self) -> &BaseEnvelope {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseEnvelope {
        &mut self.base
    }
}
