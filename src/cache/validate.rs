//! Key Validation
//!
//! The single key/key-batch policy every adapter runs before touching storage,
//! plus the equivalents for keys arriving as untyped JSON.

use serde_json::Value;

use crate::error::{CacheError, Result};

/// Rejects empty keys.
pub fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

/// Rejects a batch containing any empty key.
pub fn check_keys<'a, I>(keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    if keys.into_iter().any(str::is_empty) {
        return Err(CacheError::InvalidKeys);
    }
    Ok(())
}

/// Extracts a key from a JSON value; only non-empty strings are keys.
pub fn key_from_json(value: &Value) -> Result<&str> {
    match value {
        Value::String(key) if !key.is_empty() => Ok(key),
        _ => Err(CacheError::InvalidKey),
    }
}

/// Extracts a key batch from a JSON value; it must be an array of non-empty strings.
pub fn keys_from_json(value: &Value) -> Result<Vec<&str>> {
    let Value::Array(items) = value else {
        return Err(CacheError::InvalidKeys);
    };

    items
        .iter()
        .map(|item| key_from_json(item).map_err(|_| CacheError::InvalidKeys))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_key() {
        assert!(check_key("a").is_ok());
        assert!(matches!(check_key(""), Err(CacheError::InvalidKey)));
    }

    #[test]
    fn test_check_keys() {
        assert!(check_keys(["a", "b"]).is_ok());
        assert!(check_keys(Vec::<&str>::new()).is_ok());
        assert!(matches!(check_keys(["a", ""]), Err(CacheError::InvalidKeys)));
    }

    #[test]
    fn test_key_from_json_rejects_non_strings() {
        assert_eq!(key_from_json(&json!("k")).unwrap(), "k");

        for bad in [json!(123), json!(null), json!(true), json!(""), json!(["k"])] {
            assert!(matches!(key_from_json(&bad), Err(CacheError::InvalidKey)));
        }
    }

    #[test]
    fn test_keys_from_json() {
        assert_eq!(keys_from_json(&json!(["a", "b"])).unwrap(), vec!["a", "b"]);

        for bad in [json!("a"), json!({"a": 1}), json!(null), json!(["a", 1])] {
            assert!(matches!(keys_from_json(&bad), Err(CacheError::InvalidKeys)));
        }
    }
}
