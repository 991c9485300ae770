//! Command Router
//!
//! Decodes each command record and dispatches on its variant. Undecodable
//! commands and unknown types are logged and dropped; there is no retry
//! channel on the command side. A transient failure (channel or store
//! outage with nothing yet journaled) is returned as `Err`, so the handler
//! keeps the record and delivers it again.

use std::sync::Arc;

use async_trait::async_trait;
use shared::message::codec;
use shared::util::now_secs;
use shared::{Record, WalletCommand};

use super::scheduler::{TransferError, TransferOutcome, TransferScheduler};
use super::service::AssetService;
use crate::message::{MessageProcessor, ProcessResult};
use crate::utils::{AppError, AppResult};

pub struct CommandRouter {
    assets: AssetService,
    scheduler: Arc<TransferScheduler>,
}

impl CommandRouter {
    pub fn new(assets: AssetService, scheduler: Arc<TransferScheduler>) -> Self {
        Self { assets, scheduler }
    }

    /// Route one record as of `now` (unix seconds)
    pub async fn route(&self, record: &Record, now: i64) -> AppResult<ProcessResult> {
        let command = match codec::decode_command(&record.payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(
                    id = %record.id,
                    key = %record.key,
                    error = %e,
                    payload = %record.payload_text(),
                    "Dropping undecodable command"
                );
                return Ok(ProcessResult::skipped(e.to_string()));
            }
        };

        let result = match &command {
            WalletCommand::Withdraw(cmd) => {
                match self
                    .assets
                    .withdraw(cmd.wallet_id, &cmd.asset_name, cmd.amount)
                    .await
                {
                    Ok(event) => ProcessResult::applied(format!("withdraw {}", event.event_id)),
                    Err(e) if e.is_transient() => return Err(AppError::transient(e.to_string())),
                    Err(e) => ProcessResult::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            WalletCommand::Deposit(cmd) => {
                match self
                    .assets
                    .deposit(cmd.wallet_id, &cmd.asset_name, cmd.amount)
                    .await
                {
                    Ok(event) => ProcessResult::applied(format!("deposit {}", event.event_id)),
                    Err(e) if e.is_transient() => return Err(AppError::transient(e.to_string())),
                    Err(e) => ProcessResult::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            WalletCommand::Transfer(cmd) => match self.scheduler.handle(record, cmd, now).await {
                Ok(TransferOutcome::Executed { withdraw, deposit }) => ProcessResult::applied(
                    format!("transfer {} -> {}", withdraw.event_id, deposit.event_id),
                ),
                Ok(TransferOutcome::Requeued) => ProcessResult::Deferred {
                    reason: format!("execute_time {} re-queued", cmd.execute_time),
                },
                Ok(TransferOutcome::Scheduled { release_at }) => ProcessResult::Deferred {
                    reason: format!(
                        "execute_time {} scheduled for release at {}",
                        cmd.execute_time, release_at
                    ),
                },
                Err(e) if e.is_transient() => return Err(AppError::transient(e.to_string())),
                Err(e) => {
                    if let TransferError::DepositLeg {
                        withdraw_event_id, ..
                    } = &e
                    {
                        tracing::error!(
                            command_id = %cmd.command_id,
                            from_wallet = cmd.from_wallet,
                            to_wallet = cmd.to_wallet,
                            asset = %cmd.asset_name,
                            amount = %cmd.amount,
                            withdraw_event_id = %withdraw_event_id,
                            "Transfer left withdrawn but not deposited"
                        );
                    }
                    ProcessResult::Failed {
                        reason: e.to_string(),
                    }
                }
            },
        };

        tracing::debug!(
            command_id = %command.command_id(),
            command_type = %command.command_type(),
            result = %result,
            "Command routed"
        );
        Ok(result)
    }
}

#[async_trait]
impl MessageProcessor for CommandRouter {
    fn name(&self) -> &'static str {
        "command_router"
    }

    async fn process(&self, record: &Record) -> AppResult<ProcessResult> {
        self.route(record, now_secs()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandProducer, DeferMode};
    use crate::events::EventJournal;
    use crate::message::{ChannelError, MessageBus, Publisher};
    use crate::storage::LedgerStorage;
    use rust_decimal::Decimal;
    use shared::{EventKind, WalletEvent};

    struct DownPublisher;

    #[async_trait]
    impl Publisher for DownPublisher {
        async fn publish(&self, topic: &str, _record: Record) -> Result<(), ChannelError> {
            Err(ChannelError::Unavailable {
                topic: topic.to_string(),
                reason: "broker down".to_string(),
            })
        }
    }

    fn router_with(events: Arc<dyn Publisher>, bus: &MessageBus, mode: DeferMode) -> CommandRouter {
        let assets = AssetService::new(EventJournal::new(events, "events"));
        let scheduler = TransferScheduler::new(
            assets.clone(),
            CommandProducer::new(Arc::new(bus.clone()), "commands"),
            Arc::new(LedgerStorage::open_in_memory().unwrap()),
        )
        .with_mode(mode);
        CommandRouter::new(assets, Arc::new(scheduler))
    }

    fn router(bus: &MessageBus, mode: DeferMode) -> CommandRouter {
        router_with(Arc::new(bus.clone()), bus, mode)
    }

    fn journaled(bus: &MessageBus) -> Vec<WalletEvent> {
        bus.records("events")
            .iter()
            .map(|r| codec::decode_event(&r.payload).unwrap())
            .collect()
    }

    fn record(command: &WalletCommand) -> Record {
        Record::new(command.partition_key(), serde_json::to_vec(command).unwrap())
    }

    #[tokio::test]
    async fn test_deposit_applies_once_per_delivery() {
        let bus = MessageBus::new();
        let router = router(&bus, DeferMode::Schedule);
        let command = WalletCommand::deposit(1, "BTC", Decimal::new(100, 0));

        let result = router.route(&record(&command), now_secs()).await.unwrap();
        assert!(result.is_applied());

        let events = journaled(&bus);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Deposit);
        assert_eq!(events[0].wallet_id, 1);
        assert_eq!(events[0].amount, Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_withdraw_with_invalid_amount_fails() {
        let bus = MessageBus::new();
        let router = router(&bus, DeferMode::Schedule);
        let command = WalletCommand::withdraw(1, "BTC", Decimal::ZERO);

        let result = router.route(&record(&command), now_secs()).await.unwrap();
        assert!(matches!(result, ProcessResult::Failed { .. }));
        assert!(journaled(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_commands_are_dropped() {
        let bus = MessageBus::new();
        let router = router(&bus, DeferMode::Schedule);

        for payload in [
            br#"{"type":"freeze","wallet_id":1}"#.to_vec(),
            b"not json at all".to_vec(),
            Vec::new(),
        ] {
            let result = router
                .route(&Record::new("wallet-1", payload), now_secs())
                .await
                .unwrap();
            assert!(matches!(result, ProcessResult::Skipped { .. }));
        }
        assert_eq!(bus.published_count("events"), 0);
        assert_eq!(bus.published_count("commands"), 0);
    }

    #[tokio::test]
    async fn test_far_future_transfer_is_requeued_unchanged() {
        let bus = MessageBus::new();
        let router = router(&bus, DeferMode::Requeue);
        let now = now_secs();
        let command = WalletCommand::transfer(1, 2, "BTC", Decimal::ONE, Some(now + 3600));
        let rec = record(&command);

        let result = router.route(&rec, now).await.unwrap();
        assert!(matches!(result, ProcessResult::Deferred { .. }));
        assert_eq!(bus.records("commands"), vec![rec.clone()]);
        assert!(journaled(&bus).is_empty());

        // Redelivered once inside the horizon it applies
        let result = router.route(&rec, now + 3000).await.unwrap();
        assert!(result.is_applied());
        let events = journaled(&bus);
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].kind, events[0].wallet_id), (EventKind::Withdraw, 1));
        assert_eq!((events[1].kind, events[1].wallet_id), (EventKind::Deposit, 2));
    }

    #[tokio::test]
    async fn test_journal_outage_keeps_command() {
        let bus = MessageBus::new();
        let router = router_with(Arc::new(DownPublisher), &bus, DeferMode::Schedule);

        for command in [
            WalletCommand::deposit(1, "BTC", Decimal::ONE),
            WalletCommand::withdraw(1, "BTC", Decimal::ONE),
            WalletCommand::transfer(1, 2, "BTC", Decimal::ONE, None),
        ] {
            let err = router.route(&record(&command), now_secs()).await.unwrap_err();
            assert!(matches!(err, AppError::Transient(_)));
        }
    }

    #[tokio::test]
    async fn test_base64_command_is_accepted() {
        let bus = MessageBus::new();
        let router = router(&bus, DeferMode::Schedule);
        let command = WalletCommand::deposit(4, "SOL", Decimal::new(3, 0));
        let payload = codec::encode(&command, codec::PayloadEncoding::Base64).unwrap();

        let result = router
            .route(&Record::new("wallet-4", payload), now_secs())
            .await
            .unwrap();
        assert!(result.is_applied());
    }
}
