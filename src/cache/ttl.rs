//! TTL Module
//!
//! Accepted TTL forms and their normalization to whole seconds.

use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::error::{CacheError, Result};

// == TTL ==
/// Time-to-live accepted by `set` and `set_multiple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// No expiration
    #[default]
    Never,
    /// Signed second count; `<= 0` means no expiration
    Seconds(i64),
    /// Standard library duration, truncated to whole seconds
    Duration(Duration),
    /// Signed chrono duration, truncated to whole seconds
    Delta(chrono::Duration),
}

impl Ttl {
    /// Requested lifetime in whole seconds; `None` means "never expires".
    fn seconds(&self) -> Option<u64> {
        let secs = match *self {
            Ttl::Never => return None,
            Ttl::Seconds(secs) => u64::try_from(secs).ok()?,
            Ttl::Duration(duration) => duration.as_secs(),
            Ttl::Delta(delta) => u64::try_from(delta.num_seconds()).ok()?,
        };
        (secs > 0).then_some(secs)
    }

    /// Absolute expiration second for an entry written at `now`; 0 means
    /// "never expires".
    ///
    /// Non-positive inputs become 0 rather than "already expired". A lifetime
    /// that cannot be added to `now` is rejected, never clamped.
    pub fn expire_at(&self, now: i64) -> Result<i64> {
        let Some(secs) = self.seconds() else {
            return Ok(0);
        };
        i64::try_from(secs)
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| CacheError::InvalidTtl(format!("{self:?} past {now}")))
    }

    /// Normalizes to seconds remaining at `now`; 0 means "never expires".
    ///
    /// Rejects exactly what [`Ttl::expire_at`] rejects.
    pub fn normalize(&self, now: i64) -> Result<u64> {
        self.expire_at(now)?;
        Ok(self.seconds().unwrap_or(0))
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<i32> for Ttl {
    fn from(secs: i32) -> Self {
        Ttl::Seconds(i64::from(secs))
    }
}

impl From<u64> for Ttl {
    fn from(secs: u64) -> Self {
        Ttl::Duration(Duration::from_secs(secs))
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Duration(duration)
    }
}

impl From<chrono::Duration> for Ttl {
    fn from(delta: chrono::Duration) -> Self {
        Ttl::Delta(delta)
    }
}

impl<T: Into<Ttl>> From<Option<T>> for Ttl {
    fn from(value: Option<T>) -> Self {
        value.map_or(Ttl::Never, Into::into)
    }
}

// == Parsing ==
impl FromStr for Ttl {
    type Err = CacheError;

    /// Parses `"90"`, `"90s"`, `"5m"`, `"2h"` or `"1d"`.
    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || CacheError::InvalidTtl(format!("\"{input}\""));

        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let amount: i64 = digits.parse().map_err(|_| invalid())?;

        let multiplier = match unit {
            "" | "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return Err(invalid()),
        };

        amount
            .checked_mul(multiplier)
            .map(Ttl::Seconds)
            .ok_or_else(invalid)
    }
}

impl TryFrom<&Value> for Ttl {
    type Error = CacheError;

    /// Accepts `null`, integers and duration strings; anything else is malformed.
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Ttl::Never),
            Value::Number(number) => number
                .as_i64()
                .map(Ttl::Seconds)
                .ok_or_else(|| CacheError::InvalidTtl(format!("number {number}"))),
            Value::String(text) => text.parse(),
            Value::Bool(_) => Err(CacheError::InvalidTtl("boolean".into())),
            Value::Array(_) => Err(CacheError::InvalidTtl("array".into())),
            Value::Object(_) => Err(CacheError::InvalidTtl("object".into())),
        }
    }
}
