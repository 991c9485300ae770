//! Attempt Pruner - expires stale attempt counters and dead-letter marks
//!
//! Counters normally disappear when their record settles. A record that
//! never comes back (lost with a non-durable channel, or trimmed) leaves its
//! counter behind; dead-letter marks are only needed while stray copies can
//! still arrive. Both are removed once untouched for `retention`.

use std::sync::Arc;
use std::time::Duration;

use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::storage::{AttemptStore, StorageResult};

pub struct AttemptPruner {
    store: Arc<dyn AttemptStore>,
    retention: Duration,
    interval: Duration,
}

impl AttemptPruner {
    pub fn new(store: Arc<dyn AttemptStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Attempt pruner started"
        );

        let mut prune_interval = tokio::time::interval(self.interval);
        prune_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Attempt pruner shutting down");
                    break;
                }
                _ = prune_interval.tick() => {
                    match self.prune_once(now_millis()) {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Pruned stale attempt entries"),
                        Err(e) => tracing::error!(error = %e, "Attempt pruning failed"),
                    }
                }
            }
        }
    }

    /// Remove entries last touched more than `retention` before `now_ms`
    pub fn prune_once(&self, now_ms: i64) -> StorageResult<usize> {
        let retention_ms = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        self.store.prune(now_ms.saturating_sub(retention_ms))
    }
}
