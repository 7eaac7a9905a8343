//! GC Task
//!
//! Background task that periodically asks the active backend to reclaim
//! stale entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::manager::CacheManager;

/// Spawns a background task that calls `gc(max_lifetime)` every
/// `interval_secs` seconds.
///
/// Returns a JoinHandle for the spawned task, aborted during graceful
/// shutdown. An interval of 0 is treated as 1 second.
pub fn spawn_gc_task(
    manager: CacheManager,
    interval_secs: u64,
    max_lifetime: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            max_lifetime,
            adapter = manager.adapter().name(),
            "starting gc task"
        );

        loop {
            tokio::time::sleep(interval).await;

            match manager.gc(max_lifetime).await {
                Ok(true) => debug!("gc pass finished"),
                Ok(false) => warn!("gc pass finished with storage failures"),
                Err(err) => warn!(error = %err, "gc pass failed"),
            }
        }
    })
}
