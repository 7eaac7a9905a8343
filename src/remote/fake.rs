//! In-process stand-in for the remote service, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::RemoteStore;
use crate::error::{CacheError, Result};

/// Keeps values in a map and records the ttl each key was written with.
#[derive(Debug, Default)]
pub(crate) struct FakeStore {
    pub(crate) data: Mutex<HashMap<String, (Vec<u8>, u64)>>,
    offline: bool,
}

impl FakeStore {
    /// A store whose every call fails like a refused connection.
    pub(crate) fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.offline {
            return Err(CacheError::Remote("connection refused".to_string()));
        }
        Ok(())
    }

    pub(crate) fn ttl_of(&self, key: &str) -> Option<u64> {
        self.data.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub(crate) fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<bool> {
        self.check()?;
        self.data.lock().unwrap().insert(key.to_string(), (value, ttl));
        Ok(true)
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.data.lock().unwrap().contains_key(key))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check()?;
        Ok(keys.iter().map(|k| self.raw(k)).collect())
    }

    async fn mset(&self, values: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<bool> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        for (key, value) in values {
            data.insert(key, (value, ttl));
        }
        Ok(true)
    }
}
