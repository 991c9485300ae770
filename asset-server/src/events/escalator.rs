//! Retry / dead-letter escalation
//!
//! `attempts` counts failures of one message identity (`Record::id`), which
//! republishing preserves. Failure number `n` goes to the retry channel while
//! `n < max_attempts`, otherwise to the dead-letter channel. The counter
//! lives in the [`AttemptStore`] so it survives restarts.
//!
//! A failure is only counted once its record has been published. When the
//! retry or dead-letter channel is down, `escalate` returns `Err` with the
//! budget untouched and the handler redelivers the record later. A
//! dead-lettered id keeps a mark, so a stray copy still in the retry channel
//! is dropped instead of starting a new budget.

use std::sync::Arc;

use shared::Record;

use crate::message::{ProcessResult, Publisher};
use crate::storage::AttemptStore;
use crate::utils::AppResult;
use crate::utils::logger::DEAD_LETTER_TARGET;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct Escalator {
    publisher: Arc<dyn Publisher>,
    attempts: Arc<dyn AttemptStore>,
    retry_topic: String,
    dlq_topic: String,
    max_attempts: u32,
}

impl Escalator {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        attempts: Arc<dyn AttemptStore>,
        retry_topic: impl Into<String>,
        dlq_topic: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            attempts,
            retry_topic: retry_topic.into(),
            dlq_topic: dlq_topic.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Record one more failure of `record` and route it accordingly
    pub async fn escalate(&self, record: &Record, reason: &str) -> AppResult<ProcessResult> {
        let id = record.id.to_string();
        if self.attempts.is_dead_lettered(&id)? {
            tracing::warn!(
                id = %record.id,
                key = %record.key,
                reason = %reason,
                "Dropping copy of dead-lettered message"
            );
            return Ok(ProcessResult::skipped("already dead-lettered"));
        }

        let attempts = self.attempts.attempts(&id)?.saturating_add(1);

        if attempts < self.max_attempts {
            self.publisher
                .publish(&self.retry_topic, record.clone())
                .await?;
            self.attempts.increment(&id)?;
            tracing::warn!(
                id = %record.id,
                key = %record.key,
                attempt = attempts,
                reason = %reason,
                "Message sent to retry channel"
            );
            return Ok(ProcessResult::Retried {
                attempt: attempts,
                reason: reason.to_string(),
            });
        }

        self.publisher.publish(&self.dlq_topic, record.clone()).await?;
        self.attempts.mark_dead_lettered(&id)?;
        tracing::error!(
            target: DEAD_LETTER_TARGET,
            id = %record.id,
            key = %record.key,
            attempts,
            reason = %reason,
            payload = %record.payload_text(),
            "Message moved to dead-letter channel"
        );

        Ok(ProcessResult::DeadLettered {
            attempts,
            reason: reason.to_string(),
        })
    }
}
