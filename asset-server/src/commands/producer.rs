//! Command Producer
//!
//! Serializes commands onto the command channel. Validation covers only what
//! makes a command meaningless (empty asset, non-positive amount); channel
//! failures are returned to the caller and never retried here.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::message::codec::{self, PayloadEncoding};
use shared::{Record, WalletCommand};

use crate::message::{ChannelError, Publisher};

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("Failed to serialize command: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Invalid command: {0}")]
    Invalid(String),
}

impl ProducerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

#[derive(Clone)]
pub struct CommandProducer {
    publisher: Arc<dyn Publisher>,
    topic: String,
    encoding: PayloadEncoding,
}

impl CommandProducer {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            encoding: PayloadEncoding::Json,
        }
    }

    pub fn with_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish keyed by the command's own partition key
    pub async fn publish(&self, command: &WalletCommand) -> Result<(), ProducerError> {
        self.publish_with_key(command, &command.partition_key()).await
    }

    pub async fn publish_with_key(
        &self,
        command: &WalletCommand,
        key: &str,
    ) -> Result<(), ProducerError> {
        let payload = codec::encode(command, self.encoding)?;
        self.publisher
            .publish(&self.topic, Record::new(key, payload))
            .await?;

        tracing::debug!(
            command_id = %command.command_id(),
            command_type = %command.command_type(),
            key = %key,
            "Command published"
        );
        Ok(())
    }

    /// Append an already-encoded record unchanged (same id, key and bytes)
    pub async fn republish(&self, record: &Record) -> Result<(), ProducerError> {
        self.publisher.publish(&self.topic, record.clone()).await?;
        Ok(())
    }

    // ========== Intent helpers ==========

    pub async fn withdraw(
        &self,
        wallet_id: i64,
        asset_name: &str,
        amount: Decimal,
    ) -> Result<WalletCommand, ProducerError> {
        validate(asset_name, amount)?;
        let command = WalletCommand::withdraw(wallet_id, asset_name, amount);
        self.publish(&command).await?;
        Ok(command)
    }

    pub async fn deposit(
        &self,
        wallet_id: i64,
        asset_name: &str,
        amount: Decimal,
    ) -> Result<WalletCommand, ProducerError> {
        validate(asset_name, amount)?;
        let command = WalletCommand::deposit(wallet_id, asset_name, amount);
        self.publish(&command).await?;
        Ok(command)
    }

    /// A missing or past `execute_time` means "now" (status `executed`)
    pub async fn transfer(
        &self,
        from_wallet: i64,
        to_wallet: i64,
        asset_name: &str,
        amount: Decimal,
        execute_time: Option<i64>,
    ) -> Result<WalletCommand, ProducerError> {
        validate(asset_name, amount)?;
        let command =
            WalletCommand::transfer(from_wallet, to_wallet, asset_name, amount, execute_time);
        self.publish(&command).await?;
        Ok(command)
    }
}

fn validate(asset_name: &str, amount: Decimal) -> Result<(), ProducerError> {
    if asset_name.trim().is_empty() {
        return Err(ProducerError::Invalid("asset_name is required".into()));
    }
    if amount <= Decimal::ZERO {
        return Err(ProducerError::Invalid(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBus;
    use shared::{TransferStatus, util::now_secs};
    use std::str::FromStr;

    fn producer(bus: &MessageBus) -> CommandProducer {
        CommandProducer::new(Arc::new(bus.clone()), "commands")
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let bus = MessageBus::new();
        let amount = Decimal::from_str("0.123456789012345678").unwrap();
        let command = producer(&bus).deposit(1, "BTC", amount).await.unwrap();

        let records = bus.records("commands");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "wallet-1");

        let decoded = codec::decode_command(&records[0].payload).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.amount(), amount);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_publishing() {
        let bus = MessageBus::new();
        let producer = producer(&bus);

        assert!(matches!(
            producer.withdraw(1, "BTC", Decimal::ZERO).await,
            Err(ProducerError::Invalid(_))
        ));
        assert!(matches!(
            producer.deposit(1, " ", Decimal::ONE).await,
            Err(ProducerError::Invalid(_))
        ));
        assert_eq!(bus.published_count("commands"), 0);
    }

    #[tokio::test]
    async fn test_transfer_status_follows_execute_time() {
        let bus = MessageBus::new();
        let producer = producer(&bus);

        let now_cmd = producer
            .transfer(1, 2, "BTC", Decimal::ONE, Some(now_secs() - 10))
            .await
            .unwrap();
        let later_cmd = producer
            .transfer(1, 2, "BTC", Decimal::ONE, Some(now_secs() + 3600))
            .await
            .unwrap();

        let status = |cmd: &WalletCommand| match cmd {
            WalletCommand::Transfer(t) => t.status,
            _ => unreachable!(),
        };
        assert_eq!(status(&now_cmd), TransferStatus::Executed);
        assert_eq!(status(&later_cmd), TransferStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_republish_keeps_record_identity() {
        let bus = MessageBus::new();
        let producer = producer(&bus);
        let record = Record::new("wallet-3", b"{}".to_vec());

        producer.republish(&record).await.unwrap();
        assert_eq!(bus.records("commands"), vec![record]);
    }

    #[tokio::test]
    async fn test_channel_failure_surfaces() {
        let bus = MessageBus::new();
        bus.shutdown();
        let err = producer(&bus)
            .deposit(1, "BTC", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::Channel(ChannelError::Closed)));
    }
}
