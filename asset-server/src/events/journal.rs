//! Event Journal Producer
//!
//! One call per applied withdraw/deposit, keyed `wallet-<id>` so each
//! wallet's events stay in order. Duplicate publishes are tolerated
//! downstream through `event_id`.

use std::sync::Arc;

use shared::message::codec::{self, PayloadEncoding};
use shared::{Record, WalletEvent};

use crate::message::{ChannelError, Publisher};

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl JournalError {
    /// Nothing was journaled and the same call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

#[derive(Clone)]
pub struct EventJournal {
    publisher: Arc<dyn Publisher>,
    topic: String,
    encoding: PayloadEncoding,
}

impl EventJournal {
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

    pub async fn publish(&self, event: &WalletEvent) -> Result<(), JournalError> {
        let payload = codec::encode(event, self.encoding)?;
        let record = Record::new(event.partition_key(), payload);
        self.publisher.publish(&self.topic, record).await?;

        tracing::debug!(
            event_id = %event.event_id,
            wallet_id = event.wallet_id,
            kind = %event.kind,
            amount = %event.amount,
            "Event journaled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBus;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_publish_keys_by_wallet() {
        let bus = MessageBus::new();
        let journal = EventJournal::new(Arc::new(bus.clone()), "events");

        let event = WalletEvent::withdraw(42, "BTC", Decimal::new(5, 0));
        journal.publish(&event).await.unwrap();

        let records = bus.records("events");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "wallet-42");
        assert_eq!(codec::decode_event(&records[0].payload).unwrap(), event);
    }

    #[tokio::test]
    async fn test_base64_encoding() {
        let bus = MessageBus::new();
        let journal =
            EventJournal::new(Arc::new(bus.clone()), "events").with_encoding(PayloadEncoding::Base64);

        let event = WalletEvent::deposit(1, "BTC", Decimal::new(1, 8));
        journal.publish(&event).await.unwrap();

        let payload = &bus.records("events")[0].payload;
        assert_eq!(payload.first(), Some(&b'"'));
        assert_eq!(codec::decode_event(payload).unwrap(), event);
    }

    #[tokio::test]
    async fn test_closed_channel_is_reported() {
        let bus = MessageBus::new();
        bus.shutdown();
        let journal = EventJournal::new(Arc::new(bus), "events");

        let err = journal
            .publish(&WalletEvent::deposit(1, "BTC", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Channel(ChannelError::Closed)));
    }
}
