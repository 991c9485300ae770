//! Persistence for the read model and pipeline bookkeeping
//!
//! - [`ProjectionStore`] - balances and transaction history
//! - [`AttemptStore`] - escalation attempt counters
//! - [`ScheduleStore`] - transfers parked until their release instant
//!
//! [`LedgerStorage`] implements all three on a single redb database.

pub mod ledger;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::{EventKind, TransferCommand, WalletEvent};

pub use ledger::{LedgerStorage, StorageStats};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt balance for wallet {wallet_id} / {asset}: {value}")]
    CorruptBalance {
        wallet_id: i64,
        asset: String,
        value: String,
    },

    #[error("Balance overflow for wallet {wallet_id} / {asset}")]
    BalanceOverflow { wallet_id: i64, asset: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One line of a wallet's transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Per-store sequence, assigned on insert
    #[serde(default)]
    pub seq: u64,
    pub event_id: String,
    pub wallet_id: i64,
    pub asset_name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Signed balance delta
    pub amount: Decimal,
    pub balance_after: Decimal,
    /// Unix seconds of the originating event
    pub timestamp: i64,
}

impl TransactionRecord {
    pub fn from_event(event: &WalletEvent, balance_after: Decimal) -> Self {
        Self {
            seq: 0,
            event_id: event.event_id.clone(),
            wallet_id: event.wallet_id,
            asset_name: event.asset_name.clone(),
            kind: event.kind,
            amount: event.signed_amount(),
            balance_after,
            timestamp: event.timestamp,
        }
    }
}

/// A transfer waiting for its release instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTransfer {
    pub command: TransferCommand,
    /// Partition key the command was originally published with
    pub key: String,
    /// Unix seconds from which the command re-enters the command channel
    pub release_at: i64,
    /// Unix milliseconds
    pub scheduled_at: i64,
}

/// Balance ledger and transaction history, mutated only by the event router
pub trait ProjectionStore: Send + Sync {
    /// Missing balances read as zero
    fn get_balance(&self, wallet_id: i64, asset: &str) -> StorageResult<Decimal>;

    /// Add `delta` to the balance, returning the new balance
    fn update_balance(&self, wallet_id: i64, asset: &str, delta: Decimal)
    -> StorageResult<Decimal>;

    /// Append to history, returning the assigned sequence
    fn insert_transaction(&self, record: &TransactionRecord) -> StorageResult<u64>;

    /// History for one wallet/asset pair, oldest first
    fn get_transaction_history(
        &self,
        wallet_id: i64,
        asset: &str,
    ) -> StorageResult<Vec<TransactionRecord>>;

    /// Apply an event's delta, record it in history and mark its `event_id`,
    /// atomically. Returns `false` if the event was already applied.
    fn apply_event(&self, event: &WalletEvent) -> StorageResult<bool>;

    // ========== Wallet-level reads ==========

    /// Every asset balance held by one wallet, ordered by asset name
    fn get_wallet_balances(&self, wallet_id: i64) -> StorageResult<Vec<(String, Decimal)>>;

    /// History across all assets of one wallet, in application order
    fn get_wallet_history(&self, wallet_id: i64) -> StorageResult<Vec<TransactionRecord>>;

    /// Ids of every wallet with at least one balance, ascending
    fn list_wallets(&self) -> StorageResult<Vec<i64>>;
}

/// Durable per-message failure counters
///
/// A counter belongs to one delivery chain (original delivery plus its
/// retries). It only grows while the chain is in flight and is removed once
/// the chain ends: `clear` after the message is applied, or
/// `mark_dead_lettered` once it reaches the dead-letter channel.
pub trait AttemptStore: Send + Sync {
    /// Increment and return the new count in one write transaction
    fn increment(&self, id: &str) -> StorageResult<u32>;

    fn attempts(&self, id: &str) -> StorageResult<u32>;

    /// End the chain after a successful apply
    fn clear(&self, id: &str) -> StorageResult<()>;

    /// End the chain in the dead-letter channel, replacing the counter with
    /// a terminal mark
    fn mark_dead_lettered(&self, id: &str) -> StorageResult<()>;

    fn is_dead_lettered(&self, id: &str) -> StorageResult<bool>;

    /// Drop counters and dead-letter marks last touched before `before_ms`
    /// (unix milliseconds), returning how many entries were removed
    fn prune(&self, before_ms: i64) -> StorageResult<usize>;
}

/// Transfers deferred past the execution horizon
pub trait ScheduleStore: Send + Sync {
    /// Park a transfer; re-scheduling the same `command_id` replaces the entry
    fn schedule(&self, command: &TransferCommand, key: &str, release_at: i64)
    -> StorageResult<()>;

    /// Entries whose release instant is `<= now`, earliest first
    fn due(&self, now: i64) -> StorageResult<Vec<ScheduledTransfer>>;

    fn remove(&self, command_id: &str) -> StorageResult<()>;

    /// All parked entries, earliest release first
    fn pending(&self) -> StorageResult<Vec<ScheduledTransfer>>;
}
