//! Schedule Worker - releases parked transfers
//!
//! Scans the schedule store on a fixed interval and re-publishes every
//! transfer whose release instant has passed, unchanged and with its original
//! key, then removes it. A failed publish leaves the entry for the next scan.

use std::sync::Arc;
use std::time::Duration;

use shared::WalletCommand;
use shared::util::now_secs;
use tokio_util::sync::CancellationToken;

use super::producer::CommandProducer;
use crate::storage::ScheduleStore;
use crate::utils::AppResult;

pub struct ScheduleWorker {
    store: Arc<dyn ScheduleStore>,
    producer: CommandProducer,
    interval: Duration,
}

impl ScheduleWorker {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        producer: CommandProducer,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            producer,
            interval,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Schedule worker started"
        );

        let mut scan_interval = tokio::time::interval(self.interval);
        scan_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Schedule worker shutting down");
                    break;
                }
                _ = scan_interval.tick() => {
                    if let Err(e) = self.release_due(now_secs()).await {
                        tracing::error!(error = %e, "Schedule scan failed");
                    }
                }
            }
        }
    }

    /// Re-publish everything due at `now`; returns how many were released
    pub async fn release_due(&self, now: i64) -> AppResult<usize> {
        let due = self.store.due(now)?;
        let mut released = 0;

        for entry in due {
            let command_id = entry.command.command_id.clone();
            let command = WalletCommand::Transfer(entry.command);
            if let Err(e) = self.producer.publish_with_key(&command, &entry.key).await {
                tracing::warn!(command_id = %command_id, error = %e, "Failed to release transfer");
                continue;
            }

            self.store.remove(&command_id)?;
            released += 1;
            tracing::info!(command_id = %command_id, release_at = entry.release_at, "Transfer released");
        }

        Ok(released)
    }
}
