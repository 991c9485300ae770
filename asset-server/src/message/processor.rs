//! Message Processor Trait
//!
//! Both routers implement [`MessageProcessor`]; the [`super::MessageHandler`]
//! loop owns the subscription and decides whether to commit.

use async_trait::async_trait;
use std::fmt;

use shared::Record;

use crate::utils::AppResult;

/// Result of message processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// State changed (command applied, event projected)
    Applied { message: String },
    /// Transfer not yet due; re-queued or parked in the schedule store
    Deferred { reason: String },
    /// Dropped without effect (unknown type, duplicate, undecodable command)
    Skipped { reason: String },
    /// Apply failed; nothing further happens for this delivery
    Failed { reason: String },
    /// Re-published to the retry channel
    Retried { attempt: u32, reason: String },
    /// Moved to the dead-letter channel
    DeadLettered { attempts: u32, reason: String },
}

impl ProcessResult {
    pub fn applied(message: impl Into<String>) -> Self {
        ProcessResult::Applied {
            message: message.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        ProcessResult::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ProcessResult::Applied { .. })
    }

    pub fn is_escalated(&self) -> bool {
        matches!(
            self,
            ProcessResult::Retried { .. } | ProcessResult::DeadLettered { .. }
        )
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessResult::Applied { message } => write!(f, "applied: {}", message),
            ProcessResult::Deferred { reason } => write!(f, "deferred: {}", reason),
            ProcessResult::Skipped { reason } => write!(f, "skipped: {}", reason),
            ProcessResult::Failed { reason } => write!(f, "failed: {}", reason),
            ProcessResult::Retried { attempt, reason } => {
                write!(f, "retried (attempt {}): {}", attempt, reason)
            }
            ProcessResult::DeadLettered { attempts, reason } => {
                write!(f, "dead-lettered after {} attempts: {}", attempts, reason)
            }
        }
    }
}

/// Message Processor trait
///
/// Called sequentially for every record of one subscription, so
/// implementations need not be reentrant. Returning `Err` means the record
/// could not be settled (e.g. the escalation channel is down); the handler
/// leaves it uncommitted and delivers it again after a backoff.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn process(&self, record: &Record) -> AppResult<ProcessResult>;
}
