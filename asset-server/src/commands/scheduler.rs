//! Transfer Scheduler
//!
//! Evaluated on every delivery of a transfer command, from `execute_time`
//! alone (`status` is never consulted):
//!
//! - `execute_time <= now + horizon` → withdraw `from_wallet`, then deposit
//!   `to_wallet`. A failed withdraw stops before the deposit. A failed deposit
//!   after a successful withdraw is reported as [`TransferError::DepositLeg`];
//!   there is no compensation.
//! - otherwise → defer, unchanged:
//!   - [`DeferMode::Requeue`] re-appends the original record to the command
//!     channel right away (busy re-poll, paced only by redelivery)
//!   - [`DeferMode::Schedule`] parks the command in the [`ScheduleStore`]
//!     until `execute_time - horizon`; the `ScheduleWorker` re-publishes it

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use shared::{Record, TransferCommand, WalletEvent};

use super::producer::{CommandProducer, ProducerError};
use super::service::{ApplyError, AssetService};
use crate::storage::{ScheduleStore, StorageError};

/// Ten minutes
pub const DEFAULT_HORIZON_SECS: i64 = 600;

/// What to do with a transfer that is not yet due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferMode {
    Requeue,
    #[default]
    Schedule,
}

impl FromStr for DeferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requeue" => Ok(DeferMode::Requeue),
            "schedule" => Ok(DeferMode::Schedule),
            other => Err(format!("unknown defer mode: {other}")),
        }
    }
}

impl fmt::Display for DeferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferMode::Requeue => write!(f, "requeue"),
            DeferMode::Schedule => write!(f, "schedule"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    ExecuteNow,
    /// `release_at` is the first instant at which the transfer is within the horizon
    Defer { release_at: i64 },
}

#[derive(Debug)]
pub enum TransferOutcome {
    Executed {
        withdraw: WalletEvent,
        deposit: WalletEvent,
    },
    Requeued,
    Scheduled {
        release_at: i64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("withdraw leg failed: {0}")]
    WithdrawLeg(#[source] ApplyError),

    #[error("deposit leg failed after withdraw {withdraw_event_id}: {source}")]
    DepositLeg {
        withdraw_event_id: String,
        #[source]
        source: ApplyError,
    },

    #[error("requeue failed: {0}")]
    Requeue(#[from] ProducerError),

    #[error("schedule failed: {0}")]
    Schedule(#[from] StorageError),
}

impl TransferError {
    /// Whether redelivering the command is safe and may succeed
    ///
    /// A failed deposit leg is never transient: its withdraw is already
    /// journaled and a second delivery would withdraw again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::WithdrawLeg(e) => e.is_transient(),
            Self::DepositLeg { .. } => false,
            Self::Requeue(e) => e.is_transient(),
            Self::Schedule(_) => true,
        }
    }
}

pub struct TransferScheduler {
    assets: AssetService,
    producer: CommandProducer,
    schedule: Arc<dyn ScheduleStore>,
    horizon_secs: i64,
    mode: DeferMode,
}

impl TransferScheduler {
    pub fn new(
        assets: AssetService,
        producer: CommandProducer,
        schedule: Arc<dyn ScheduleStore>,
    ) -> Self {
        Self {
            assets,
            producer,
            schedule,
            horizon_secs: DEFAULT_HORIZON_SECS,
            mode: DeferMode::default(),
        }
    }

    pub fn with_horizon(mut self, horizon_secs: i64) -> Self {
        self.horizon_secs = horizon_secs.max(0);
        self
    }

    pub fn with_mode(mut self, mode: DeferMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DeferMode {
        self.mode
    }

    pub fn decide(&self, command: &TransferCommand, now: i64) -> Decision {
        if command.execute_time <= now.saturating_add(self.horizon_secs) {
            Decision::ExecuteNow
        } else {
            Decision::Defer {
                release_at: command.execute_time - self.horizon_secs,
            }
        }
    }

    /// Handle one delivery of `record`, which decoded to `command`
    pub async fn handle(
        &self,
        record: &Record,
        command: &TransferCommand,
        now: i64,
    ) -> Result<TransferOutcome, TransferError> {
        match self.decide(command, now) {
            Decision::ExecuteNow => {
                let (withdraw, deposit) = self.execute(command).await?;
                Ok(TransferOutcome::Executed { withdraw, deposit })
            }
            Decision::Defer { release_at } => self.defer(record, command, release_at).await,
        }
    }

    /// Withdraw from the source, then deposit to the destination
    pub async fn execute(
        &self,
        command: &TransferCommand,
    ) -> Result<(WalletEvent, WalletEvent), TransferError> {
        let withdraw = self
            .assets
            .withdraw(command.from_wallet, &command.asset_name, command.amount)
            .await
            .map_err(TransferError::WithdrawLeg)?;

        let deposit = self
            .assets
            .deposit(command.to_wallet, &command.asset_name, command.amount)
            .await
            .map_err(|source| TransferError::DepositLeg {
                withdraw_event_id: withdraw.event_id.clone(),
                source,
            })?;

        Ok((withdraw, deposit))
    }

    async fn defer(
        &self,
        record: &Record,
        command: &TransferCommand,
        release_at: i64,
    ) -> Result<TransferOutcome, TransferError> {
        match self.mode {
            DeferMode::Requeue => {
                self.producer.republish(record).await?;
                tracing::debug!(
                    command_id = %command.command_id,
                    execute_time = command.execute_time,
                    "Transfer not due, re-queued"
                );
                Ok(TransferOutcome::Requeued)
            }
            DeferMode::Schedule => {
                self.schedule.schedule(command, &record.key, release_at)?;
                tracing::info!(
                    command_id = %command.command_id,
                    execute_time = command.execute_time,
                    release_at,
                    "Transfer not due, scheduled"
                );
                Ok(TransferOutcome::Scheduled { release_at })
            }
        }
    }
}
