//! Structured key-value document used for portable payload persistence.
//!
//! Serializers write the keys they own into an `EdgeDocument`;
//! deserializers read them back. The core never validates key names.
//! Keys a deserializer ignores are left alone on restore, but a save writes
//! only the keys the serializer sets, so unknown keys in the stored file are
//! not carried over.

use crate::consts::DEFAULT_DOCUMENT_CAPACITY;
use crate::driver::EdgeError;
use serde_json::{Map, Value};

/// Mutable mapping from string keys to JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeDocument {
    entries: Map<String, Value>,
}

impl EdgeDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a document from its stored form.
    ///
    /// # Errors
    /// `EdgeError::Decode` if the bytes are not valid JSON,
    /// `EdgeError::StructuralMismatch` if the top-level value is not an object.
    pub fn from_slice(name: &str, bytes: &[u8]) -> Result<Self, EdgeError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| EdgeError::Decode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(EdgeError::StructuralMismatch {
                name: name.to_string(),
                reason: format!("expected object, found {}", json_kind(&other)),
            }),
        }
    }

    /// Encode the document into its stored form.
    ///
    /// # Errors
    /// `EdgeError::Encode` if a value cannot be represented.
    pub fn to_vec(&self, name: &str) -> Result<Vec<u8>, EdgeError> {
        let mut out = Vec::with_capacity(DEFAULT_DOCUMENT_CAPACITY);
        serde_json::to_writer(&mut out, &self.entries).map_err(|e| EdgeError::Encode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(out)
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// String value under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer value under `key`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(Value::as_u64)
    }

    /// Signed integer value under `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    /// Floating point value under `key`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    /// Boolean value under `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl From<Map<String, Value>> for EdgeDocument {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
