//! Wallet events - immutable facts recorded after a command was applied

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::EventKind;
use crate::util::{now_secs, wallet_key};

/// Wallet event - immutable journal record
///
/// A transfer is journaled as two events (withdraw on the source wallet,
/// deposit on the destination), never as one combined record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEvent {
    /// Event unique ID (idempotency key for the projection)
    pub event_id: String,
    pub wallet_id: i64,
    pub asset_name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Unsigned; the sign is applied by the projection from `kind`
    pub amount: Decimal,
    /// Unix seconds
    pub timestamp: i64,
    /// Optional free-form JSON metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl WalletEvent {
    pub fn new(
        wallet_id: i64,
        asset_name: impl Into<String>,
        kind: EventKind,
        amount: Decimal,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            wallet_id,
            asset_name: asset_name.into(),
            kind,
            amount,
            timestamp: now_secs(),
            metadata: None,
        }
    }

    pub fn withdraw(wallet_id: i64, asset_name: impl Into<String>, amount: Decimal) -> Self {
        Self::new(wallet_id, asset_name, EventKind::Withdraw, amount)
    }

    pub fn deposit(wallet_id: i64, asset_name: impl Into<String>, amount: Decimal) -> Self {
        Self::new(wallet_id, asset_name, EventKind::Deposit, amount)
    }

    /// Balance delta this event applies to `(wallet_id, asset_name)`
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            EventKind::Deposit => self.amount,
            EventKind::Withdraw | EventKind::Transfer => -self.amount,
        }
    }

    pub fn partition_key(&self) -> String {
        wallet_key(self.wallet_id)
    }
}
