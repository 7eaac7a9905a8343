//! Request DTOs for the cache server API
//!
//! Keys and TTLs arrive as untyped JSON so that a number, boolean or null
//! where a key belongs is reported as an invalid key rather than a body
//! parse failure.

use serde::Deserialize;
use serde_json::Value;

use crate::adapter::ValueMap;
use crate::cache::{key_from_json, keys_from_json, Ttl};
use crate::error::{CacheError, Result};

/// Request body for PUT /cache
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    /// Seconds, a duration string such as `"5m"`, or null for no expiry
    #[serde(default)]
    pub ttl: Value,
}

impl SetRequest {
    pub fn key(&self) -> Result<&str> {
        key_from_json(&self.key)
    }

    pub fn ttl(&self) -> Result<Ttl> {
        Ttl::try_from(&self.ttl)
    }
}

/// Request body for POST /cache/mget
#[derive(Debug, Clone, Deserialize)]
pub struct GetMultipleRequest {
    pub keys: Value,
    /// Substituted for every missing key
    #[serde(default)]
    pub default: Value,
}

impl GetMultipleRequest {
    pub fn keys(&self) -> Result<Vec<&str>> {
        keys_from_json(&self.keys)
    }
}

/// Request body for POST /cache/mset
#[derive(Debug, Clone, Deserialize)]
pub struct SetMultipleRequest {
    /// Object of key to value
    pub values: Value,
    #[serde(default)]
    pub ttl: Value,
}

impl SetMultipleRequest {
    pub fn into_values(self) -> Result<ValueMap> {
        match self.values {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(CacheError::InvalidKeys),
        }
    }

    pub fn ttl(&self) -> Result<Ttl> {
        Ttl::try_from(&self.ttl)
    }
}

/// Request body for POST /cache/mdel
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteMultipleRequest {
    pub keys: Value,
}

impl DeleteMultipleRequest {
    pub fn keys(&self) -> Result<Vec<&str>> {
        keys_from_json(&self.keys)
    }
}
