//! Opaque record values moved between tiers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-serializable value persisted under a `(key, scope)` pair.
///
/// The resolver never interprets the contents. A record may be a single
/// object or an array of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Serializes any value into a record.
    ///
    /// # Errors
    ///
    /// Fails when the value is not representable as JSON (for example a map
    /// with non-string keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self)
    }

    /// Decodes the record into a concrete type.
    ///
    /// # Errors
    ///
    /// Fails when the record does not match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// Parses the string form stored in the Local Cache.
    ///
    /// # Errors
    ///
    /// Fails when `raw` is not valid JSON.
    pub fn from_canonical_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }

    /// Compact JSON encoding. Object keys are emitted in sorted order, so
    /// two equal records always produce identical bytes.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        // Value's Display never fails and serde_json's default map is sorted.
        self.0.to_string()
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Approximate stored size in bytes, used by quota-limited caches.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.to_canonical_string().len()
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn canonical_string_is_order_independent() {
        let a = Record::new(json!({"b": 1, "a": [1, 2]}));
        let b = Record::from_canonical_str(r#"{"a":[1,2],"b":1}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_canonical_string(), b.to_canonical_string());
    }

    #[test]
    fn decode_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Customer {
            id: String,
            name: String,
        }

        let customers = vec![Customer {
            id: "c1".into(),
            name: "Ann".into(),
        }];
        let record = Record::from_serialize(&customers).unwrap();
        assert_eq!(record.as_value(), &json!([{"id": "c1", "name": "Ann"}]));
        let back: Vec<Customer> = record.decode().unwrap();
        assert_eq!(back, customers);
    }

    #[test]
    fn non_string_map_keys_fail_to_serialize() {
        let mut map = HashMap::new();
        map.insert((1, 2), "x");
        assert!(Record::from_serialize(&map).is_err());
    }
}
