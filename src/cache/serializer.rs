//! Serializer Module
//!
//! Pluggable value codec used by every adapter that stores bytes.

use std::fmt::Debug;

use serde_json::Value;

use crate::error::Result;

/// Converts cache values to bytes and back.
pub trait Serializer: Send + Sync + Debug {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;
}

// == JSON Serializer ==
/// Default serializer: compact JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
