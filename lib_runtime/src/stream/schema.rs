//! # Schemas
//!
//! A `Schema` binds one application value type to an opaque byte payload. It is
//! stateless: the same instance is shared by the producer, every consumer and
//! every message of a topic.
//!
//! The reference codec, `JsonSchema<T>`, rides on `serde`, so any type with
//! `Serialize` and `Deserialize` derives round-trips with full fidelity,
//! including enums, nested records, maps and `Option` fields.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::StreamError;

/// # Schema
///
/// The encode/decode contract for a topic. `decode` must be the exact inverse of
/// `encode` for every representable value.
pub trait Schema: Send + Sync + 'static {
    /// The value type this schema is bound to.
    type Value: Send + Sync + 'static;

    /// Human-readable name of the bound type, used in `TypeMismatch` errors.
    fn type_name(&self) -> &str;

    /// Encodes a value into its payload.
    fn encode(&self, value: &Self::Value) -> Result<Bytes, StreamError>;

    /// Rebuilds a value from a payload produced by `encode`.
    ///
    /// A payload that is not a valid encoding of `Self::Value` is a `TypeMismatch`.
    fn decode(&self, data: &[u8]) -> Result<Self::Value, StreamError>;
}

/// # JSON Schema
///
/// Generic structured-object codec backed by `serde_json`.
pub struct JsonSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchema<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for JsonSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSchema<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonSchema<{}>", type_name::<T>())
    }
}

impl<T> Schema for JsonSchema<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Value = T;

    fn type_name(&self) -> &str {
        type_name::<T>()
    }

    fn encode(&self, value: &T) -> Result<Bytes, StreamError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| StreamError::type_mismatch(type_name::<T>(), e))
    }

    fn decode(&self, data: &[u8]) -> Result<T, StreamError> {
        serde_json::from_slice(data).map_err(|e| StreamError::type_mismatch(type_name::<T>(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Unit {
        Kilograms,
        Pounds,
        Custom(String),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shipment {
        id: u32,
        unit: Unit,
        weight: f64,
        tags: BTreeMap<String, String>,
        parent: Option<Box<Shipment>>,
    }

    #[test]
    fn structured_values_round_trip() {
        let schema = JsonSchema::<Shipment>::new();
        let inner = Shipment {
            id: 1,
            unit: Unit::Custom("crate".into()),
            weight: 0.5,
            tags: BTreeMap::new(),
            parent: None,
        };
        let value = Shipment {
            id: 2,
            unit: Unit::Pounds,
            weight: 12.25,
            tags: BTreeMap::from([("entity".into(), "Shipment".into())]),
            parent: Some(Box::new(inner)),
        };

        let payload = schema.encode(&value).unwrap();
        assert_eq!(schema.decode(&payload).unwrap(), value);
    }

    #[test]
    fn unit_enum_and_option_round_trip() {
        let schema = JsonSchema::<Option<Unit>>::new();
        for value in [None, Some(Unit::Kilograms)] {
            let payload = schema.encode(&value).unwrap();
            assert_eq!(schema.decode(&payload).unwrap(), value);
        }
    }

    #[test]
    fn foreign_payload_is_a_type_mismatch() {
        let payload = JsonSchema::<String>::new().encode(&"not a shipment".to_string()).unwrap();
        let err = JsonSchema::<Shipment>::new().decode(&payload).unwrap_err();
        assert!(matches!(err, StreamError::TypeMismatch { ref expected, .. } if expected.ends_with("Shipment")));
    }

    #[test]
    fn unencodable_value_is_a_type_mismatch() {
        // JSON object keys must be strings.
        let schema = JsonSchema::<BTreeMap<(u8, u8), u8>>::new();
        let value = BTreeMap::from([((1, 2), 3)]);
        assert!(matches!(schema.encode(&value), Err(StreamError::TypeMismatch { .. })));
    }
}
