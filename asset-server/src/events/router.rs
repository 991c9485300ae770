//! Event Router
//!
//! ```text
//! received ─▶ decoded ─▶ projected ─▶ Applied / Skipped(duplicate)
//!               │            │
//!               └────────────┴─▶ Escalator ─▶ Retried / DeadLettered
//! ```
//!
//! Subscribed to both the event channel and the retry channel. An unknown
//! `type` is permanent and dropped without escalation.
//!
//! The attempt counter of a record only grows while the record is in flight.
//! Applying it (or finding it already applied) settles the record and removes
//! the counter together with the in-flight state.

use std::sync::Arc;

use async_trait::async_trait;
use shared::Record;
use shared::message::codec;

use super::escalator::Escalator;
use crate::message::{MessageProcessor, ProcessResult};
use crate::storage::{AttemptStore, ProjectionStore};
use crate::utils::AppResult;

pub struct EventRouter {
    projection: Arc<dyn ProjectionStore>,
    attempts: Arc<dyn AttemptStore>,
    escalator: Escalator,
}

impl EventRouter {
    pub fn new(
        projection: Arc<dyn ProjectionStore>,
        attempts: Arc<dyn AttemptStore>,
        escalator: Escalator,
    ) -> Self {
        Self {
            projection,
            attempts,
            escalator,
        }
    }

    pub async fn route(&self, record: &Record) -> AppResult<ProcessResult> {
        let event = match codec::decode_event(&record.payload) {
            Ok(event) => event,
            Err(e) if e.is_permanent() => {
                tracing::warn!(id = %record.id, key = %record.key, error = %e, "Dropping event");
                return Ok(ProcessResult::skipped(e.to_string()));
            }
            Err(e) => {
                return self
                    .escalator
                    .escalate(record, &format!("decode failed: {}", e))
                    .await;
            }
        };

        let result = match self.projection.apply_event(&event) {
            Ok(true) => ProcessResult::applied(format!(
                "{} {} {} on wallet {}",
                event.kind, event.amount, event.asset_name, event.wallet_id
            )),
            Ok(false) => ProcessResult::skipped(format!("duplicate event {}", event.event_id)),
            Err(e) => {
                return self
                    .escalator
                    .escalate(record, &format!("projection failed: {}", e))
                    .await;
            }
        };

        // Settled: the record leaves the retry cycle
        if let Err(e) = self.attempts.clear(&record.id.to_string()) {
            tracing::warn!(id = %record.id, error = %e, "Failed to clear attempt counter");
        }
        Ok(result)
    }
}

#[async_trait]
impl MessageProcessor for EventRouter {
    fn name(&self) -> &'static str {
        "event_router"
    }

    async fn process(&self, record: &Record) -> AppResult<ProcessResult> {
        self.route(record).await
    }
}
