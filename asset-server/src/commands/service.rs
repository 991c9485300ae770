//! Asset service - the apply path for withdraw and deposit
//!
//! Balance mutation itself happens downstream in the projection; applying a
//! command here means journaling the corresponding `WalletEvent`.

use rust_decimal::Decimal;
use shared::{EventKind, WalletEvent};

use crate::events::{EventJournal, JournalError};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Invalid command: {0}")]
    Invalid(String),

    #[error("Event journal error: {0}")]
    Journal(#[from] JournalError),
}

impl ApplyError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Invalid(_) => false,
            Self::Journal(e) => e.is_transient(),
        }
    }
}

#[derive(Clone)]
pub struct AssetService {
    journal: EventJournal,
}

impl AssetService {
    pub fn new(journal: EventJournal) -> Self {
        Self { journal }
    }

    pub async fn withdraw(
        &self,
        wallet_id: i64,
        asset_name: &str,
        amount: Decimal,
    ) -> Result<WalletEvent, ApplyError> {
        self.apply(EventKind::Withdraw, wallet_id, asset_name, amount)
            .await
    }

    pub async fn deposit(
        &self,
        wallet_id: i64,
        asset_name: &str,
        amount: Decimal,
    ) -> Result<WalletEvent, ApplyError> {
        self.apply(EventKind::Deposit, wallet_id, asset_name, amount)
            .await
    }

    async fn apply(
        &self,
        kind: EventKind,
        wallet_id: i64,
        asset_name: &str,
        amount: Decimal,
    ) -> Result<WalletEvent, ApplyError> {
        if asset_name.trim().is_empty() {
            return Err(ApplyError::Invalid("asset_name is required".into()));
        }
        if amount <= Decimal::ZERO {
            return Err(ApplyError::Invalid(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let event = WalletEvent::new(wallet_id, asset_name, kind, amount);
        self.journal.publish(&event).await?;

        tracing::info!(
            event_id = %event.event_id,
            wallet_id,
            asset = %asset_name,
            kind = %kind,
            amount = %amount,
            "Command applied"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBus;
    use shared::message::codec;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_withdraw_emits_event() {
        let bus = MessageBus::new();
        let service = AssetService::new(EventJournal::new(Arc::new(bus.clone()), "events"));

        let event = service.withdraw(3, "ETH", Decimal::new(15, 1)).await.unwrap();
        assert_eq!(event.kind, EventKind::Withdraw);

        let records = bus.records("events");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "wallet-3");
        assert_eq!(codec::decode_event(&records[0].payload).unwrap(), event);
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected() {
        let bus = MessageBus::new();
        let service = AssetService::new(EventJournal::new(Arc::new(bus.clone()), "events"));

        let err = service
            .deposit(3, "ETH", Decimal::new(-1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::Invalid(_)));
        assert!(bus.records("events").is_empty());
    }
}
