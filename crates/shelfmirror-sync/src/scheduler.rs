//! Download scheduler - global concurrency gate over remote operations
//!
//! One semaphore bounds every remote call in a run: listings, metadata
//! probes, and content downloads all acquire a permit for the duration of
//! the network operation, wherever in the tree they happen. Because the
//! permit spans only the remote call itself (never the await on child
//! tasks), deeply nested recursion cannot deadlock the gate: a waiting
//! parent holds no permit while its descendants do their remote work.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Bounds concurrent remote operations with a single shared semaphore
///
/// Cloning is cheap and shares the same permit pool.
#[derive(Clone)]
pub struct DownloadScheduler {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl DownloadScheduler {
    /// Creates a scheduler allowing at most `limit` simultaneous remote
    /// operations
    pub fn new(limit: usize) -> Self {
        debug!(limit, "Creating download scheduler");
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Acquires one permit, waiting until a slot frees up
    ///
    /// The permit is released when the returned guard drops; hold it
    /// exactly across the remote call it covers.
    pub async fn acquire(&self) -> anyhow::Result<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .context("download scheduler semaphore closed")
    }

    /// The configured concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently available (test/diagnostic aid)
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
