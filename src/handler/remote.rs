//! Remote Session Handler
//!
//! One remote key per session, written with the session lifetime as its TTL.
//! The service expires sessions itself, so `gc` has nothing to do.

use std::sync::Arc;

use async_trait::async_trait;

use super::{session_text, HandlerOptions, SessionHandler};
use crate::cache::{check_key, DEFAULT_REMOTE_PREFIX};
use crate::error::Result;
use crate::remote::RemoteStore;

#[derive(Debug)]
pub struct RemoteHandler {
    options: HandlerOptions,
    store: Arc<dyn RemoteStore>,
}

impl RemoteHandler {
    pub fn new(options: HandlerOptions, store: Arc<dyn RemoteStore>) -> Self {
        Self { options, store }
    }

    /// Options with the remote default prefix (`cache:`).
    pub fn default_options() -> HandlerOptions {
        HandlerOptions::new().with_prefix(DEFAULT_REMOTE_PREFIX)
    }
}

#[async_trait]
impl SessionHandler for RemoteHandler {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn open(&self, _save_path: &str, _name: &str) -> Result<bool> {
        Ok(true)
    }

    async fn close(&self) -> Result<bool> {
        Ok(true)
    }

    async fn read(&self, id: &str) -> Result<String> {
        check_key(id)?;
        let bytes = self.store.get(&self.options.session_key(id)).await?;
        Ok(bytes.map(|bytes| session_text(id, bytes)).unwrap_or_default())
    }

    async fn write(&self, id: &str, data: &str) -> Result<bool> {
        check_key(id)?;
        self.store
            .set(
                &self.options.session_key(id),
                data.as_bytes().to_vec(),
                self.options.lifetime,
            )
            .await
    }

    async fn destroy(&self, id: &str) -> Result<bool> {
        check_key(id)?;
        let removed = self.store.del(&[self.options.session_key(id)]).await?;
        Ok(removed == 1)
    }

    async fn gc(&self, _max_lifetime: u64) -> Result<bool> {
        Ok(true)
    }
}
