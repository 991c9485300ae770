//! redb-based ledger storage
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `balances` | `(wallet_id, asset)` | decimal string | Current balance |
//! | `transactions` | `(wallet_id, asset, seq)` | `TransactionRecord` | History (append-only) |
//! | `applied_events` | `event_id` | `()` | Projection idempotency |
//! | `retry_attempts` | record id | `(u32, i64)` | Failure count, last failure (ms) |
//! | `dead_letters` | record id | `i64` | Dead-lettered at (ms) |
//! | `scheduled_transfers` | `command_id` | `ScheduledTransfer` | Deferred transfers |
//! | `sequence_counter` | name | `u64` | History sequence |
//!
//! Balances are stored as decimal strings so no precision is lost between
//! the wire and the read model.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use rust_decimal::Decimal;

use super::{
    AttemptStore, ProjectionStore, ScheduleStore, ScheduledTransfer, StorageError, StorageResult,
    TransactionRecord,
};
use shared::util::now_millis;
use shared::{TransferCommand, WalletEvent};

const BALANCES_TABLE: TableDefinition<(i64, &str), &str> = TableDefinition::new("balances");

const TRANSACTIONS_TABLE: TableDefinition<(i64, &str, u64), &[u8]> =
    TableDefinition::new("transactions");

const APPLIED_EVENTS_TABLE: TableDefinition<&str, ()> = TableDefinition::new("applied_events");

const RETRY_ATTEMPTS_TABLE: TableDefinition<&str, (u32, i64)> =
    TableDefinition::new("retry_attempts");

const DEAD_LETTERS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("dead_letters");

const SCHEDULED_TRANSFERS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("scheduled_transfers");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const TRANSACTION_SEQ_KEY: &str = "transaction_seq";

/// Ledger storage backed by redb
#[derive(Clone)]
pub struct LedgerStorage {
    db: Arc<Database>,
}

impl LedgerStorage {
    /// Open or create the database at the given path
    ///
    /// Commits are durable once `commit()` returns (redb copy-on-write with
    /// atomic pointer swap), so balances survive an unexpected shutdown.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BALANCES_TABLE)?;
            let _ = write_txn.open_table(TRANSACTIONS_TABLE)?;
            let _ = write_txn.open_table(APPLIED_EVENTS_TABLE)?;
            let _ = write_txn.open_table(RETRY_ATTEMPTS_TABLE)?;
            let _ = write_txn.open_table(DEAD_LETTERS_TABLE)?;
            let _ = write_txn.open_table(SCHEDULED_TRANSFERS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(TRANSACTION_SEQ_KEY)?.is_none() {
                seq_table.insert(TRANSACTION_SEQ_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Transaction-scoped helpers ==========

    fn add_to_balance(
        txn: &WriteTransaction,
        wallet_id: i64,
        asset: &str,
        delta: Decimal,
    ) -> StorageResult<Decimal> {
        let mut table = txn.open_table(BALANCES_TABLE)?;
        let current = table
            .get((wallet_id, asset))?
            .map(|guard| guard.value().to_string());
        let current = match current {
            Some(value) => parse_balance(wallet_id, asset, &value)?,
            None => Decimal::ZERO,
        };

        let next = current
            .checked_add(delta)
            .ok_or_else(|| StorageError::BalanceOverflow {
                wallet_id,
                asset: asset.to_string(),
            })?;
        table.insert((wallet_id, asset), next.to_string().as_str())?;
        Ok(next)
    }

    fn append_transaction(txn: &WriteTransaction, record: &TransactionRecord) -> StorageResult<u64> {
        let seq = {
            let mut seq_table = txn.open_table(SEQUENCE_TABLE)?;
            let current = seq_table
                .get(TRANSACTION_SEQ_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let next = current + 1;
            seq_table.insert(TRANSACTION_SEQ_KEY, next)?;
            next
        };

        let stored = TransactionRecord {
            seq,
            ..record.clone()
        };
        let value = serde_json::to_vec(&stored)?;
        let mut table = txn.open_table(TRANSACTIONS_TABLE)?;
        table.insert(
            (record.wallet_id, record.asset_name.as_str(), seq),
            value.as_slice(),
        )?;
        Ok(seq)
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        Ok(StorageStats {
            balance_count: read_txn.open_table(BALANCES_TABLE)?.len()?,
            transaction_count: read_txn.open_table(TRANSACTIONS_TABLE)?.len()?,
            applied_event_count: read_txn.open_table(APPLIED_EVENTS_TABLE)?.len()?,
            retrying_count: read_txn.open_table(RETRY_ATTEMPTS_TABLE)?.len()?,
            dead_lettered_count: read_txn.open_table(DEAD_LETTERS_TABLE)?.len()?,
            scheduled_count: read_txn.open_table(SCHEDULED_TRANSFERS_TABLE)?.len()?,
        })
    }

    /// Whether an event has already been projected
    pub fn is_event_applied(&self, event_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(APPLIED_EVENTS_TABLE)?;
        Ok(table.get(event_id)?.is_some())
    }
}

fn parse_balance(wallet_id: i64, asset: &str, value: &str) -> StorageResult<Decimal> {
    Decimal::from_str(value).map_err(|_| StorageError::CorruptBalance {
        wallet_id,
        asset: asset.to_string(),
        value: value.to_string(),
    })
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub balance_count: u64,
    pub transaction_count: u64,
    pub applied_event_count: u64,
    pub retrying_count: u64,
    pub dead_lettered_count: u64,
    pub scheduled_count: u64,
}

// ========== Projection ==========

impl ProjectionStore for LedgerStorage {
    fn get_balance(&self, wallet_id: i64, asset: &str) -> StorageResult<Decimal> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES_TABLE)?;
        match table.get((wallet_id, asset))? {
            Some(guard) => parse_balance(wallet_id, asset, guard.value()),
            None => Ok(Decimal::ZERO),
        }
    }

    fn update_balance(
        &self,
        wallet_id: i64,
        asset: &str,
        delta: Decimal,
    ) -> StorageResult<Decimal> {
        let txn = self.db.begin_write()?;
        let balance = Self::add_to_balance(&txn, wallet_id, asset, delta)?;
        txn.commit()?;
        Ok(balance)
    }

    fn insert_transaction(&self, record: &TransactionRecord) -> StorageResult<u64> {
        let txn = self.db.begin_write()?;
        let seq = Self::append_transaction(&txn, record)?;
        txn.commit()?;
        Ok(seq)
    }

    fn get_transaction_history(
        &self,
        wallet_id: i64,
        asset: &str,
    ) -> StorageResult<Vec<TransactionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS_TABLE)?;

        let mut records = Vec::new();
        for result in table.range((wallet_id, asset, 0u64)..=(wallet_id, asset, u64::MAX))? {
            let (_key, value) = result?;
            let record: TransactionRecord = serde_json::from_slice(value.value())?;
            records.push(record);
        }
        Ok(records)
    }

    fn apply_event(&self, event: &WalletEvent) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;

        let already_applied = {
            let table = txn.open_table(APPLIED_EVENTS_TABLE)?;
            table.get(event.event_id.as_str())?.is_some()
        };
        if already_applied {
            txn.abort()?;
            return Ok(false);
        }

        let balance_after =
            Self::add_to_balance(&txn, event.wallet_id, &event.asset_name, event.signed_amount())?;
        Self::append_transaction(&txn, &TransactionRecord::from_event(event, balance_after))?;
        {
            let mut table = txn.open_table(APPLIED_EVENTS_TABLE)?;
            table.insert(event.event_id.as_str(), ())?;
        }

        txn.commit()?;
        Ok(true)
    }

    fn get_wallet_balances(&self, wallet_id: i64) -> StorageResult<Vec<(String, Decimal)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES_TABLE)?;
        let range = match wallet_id.checked_add(1) {
            Some(next) => table.range((wallet_id, "")..(next, ""))?,
            None => table.range((wallet_id, "")..)?,
        };

        let mut balances = Vec::new();
        for result in range {
            let (key, value) = result?;
            let (_, asset) = key.value();
            balances.push((
                asset.to_string(),
                parse_balance(wallet_id, asset, value.value())?,
            ));
        }
        Ok(balances)
    }

    fn get_wallet_history(&self, wallet_id: i64) -> StorageResult<Vec<TransactionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS_TABLE)?;
        let range = match wallet_id.checked_add(1) {
            Some(next) => table.range((wallet_id, "", 0u64)..(next, "", 0u64))?,
            None => table.range((wallet_id, "", 0u64)..)?,
        };

        let mut records = Vec::new();
        for result in range {
            let (_key, value) = result?;
            let record: TransactionRecord = serde_json::from_slice(value.value())?;
            records.push(record);
        }
        // Keys group by asset; the sequence restores application order
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }

    fn list_wallets(&self) -> StorageResult<Vec<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES_TABLE)?;

        let mut wallets: Vec<i64> = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            let (wallet_id, _) = key.value();
            if wallets.last() != Some(&wallet_id) {
                wallets.push(wallet_id);
            }
        }
        Ok(wallets)
    }
}

// ========== Escalation attempts ==========

impl AttemptStore for LedgerStorage {
    fn increment(&self, id: &str) -> StorageResult<u32> {
        let txn = self.db.begin_write()?;
        let next = {
            let mut table = txn.open_table(RETRY_ATTEMPTS_TABLE)?;
            let current = table.get(id)?.map(|guard| guard.value().0).unwrap_or(0);
            let next = current.saturating_add(1);
            table.insert(id, (next, now_millis()))?;
            next
        };
        txn.commit()?;
        Ok(next)
    }

    fn attempts(&self, id: &str) -> StorageResult<u32> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RETRY_ATTEMPTS_TABLE)?;
        Ok(table.get(id)?.map(|guard| guard.value().0).unwrap_or(0))
    }

    fn clear(&self, id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RETRY_ATTEMPTS_TABLE)?;
            table.remove(id)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn mark_dead_lettered(&self, id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut counters = txn.open_table(RETRY_ATTEMPTS_TABLE)?;
            counters.remove(id)?;
            let mut marks = txn.open_table(DEAD_LETTERS_TABLE)?;
            marks.insert(id, now_millis())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn is_dead_lettered(&self, id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEAD_LETTERS_TABLE)?;
        Ok(table.get(id)?.is_some())
    }

    fn prune(&self, before_ms: i64) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut counters = txn.open_table(RETRY_ATTEMPTS_TABLE)?;
            let mut stale = Vec::new();
            for result in counters.iter()? {
                let (key, value) = result?;
                if value.value().1 < before_ms {
                    stale.push(key.value().to_string());
                }
            }
            for id in &stale {
                counters.remove(id.as_str())?;
            }
            removed += stale.len();

            let mut marks = txn.open_table(DEAD_LETTERS_TABLE)?;
            let mut expired = Vec::new();
            for result in marks.iter()? {
                let (key, value) = result?;
                if value.value() < before_ms {
                    expired.push(key.value().to_string());
                }
            }
            for id in &expired {
                marks.remove(id.as_str())?;
            }
            removed += expired.len();
        }
        txn.commit()?;
        Ok(removed)
    }
}

// ========== Deferred transfers ==========

impl LedgerStorage {
    fn scheduled_entries(&self) -> StorageResult<Vec<ScheduledTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SCHEDULED_TRANSFERS_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: ScheduledTransfer = serde_json::from_slice(value.value())?;
            entries.push(entry);
        }
        entries.sort_by_key(|e| e.release_at);
        Ok(entries)
    }
}

impl ScheduleStore for LedgerStorage {
    fn schedule(
        &self,
        command: &TransferCommand,
        key: &str,
        release_at: i64,
    ) -> StorageResult<()> {
        let entry = ScheduledTransfer {
            command: command.clone(),
            key: key.to_string(),
            release_at,
            scheduled_at: shared::util::now_millis(),
        };
        let value = serde_json::to_vec(&entry)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SCHEDULED_TRANSFERS_TABLE)?;
            table.insert(command.command_id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn due(&self, now: i64) -> StorageResult<Vec<ScheduledTransfer>> {
        let mut entries = self.scheduled_entries()?;
        entries.retain(|e| e.release_at <= now);
        Ok(entries)
    }

    fn remove(&self, command_id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SCHEDULED_TRANSFERS_TABLE)?;
            table.remove(command_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn pending(&self) -> StorageResult<Vec<ScheduledTransfer>> {
        self.scheduled_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::EventKind;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_missing_balance_is_zero() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        assert_eq!(storage.get_balance(1, "BTC").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_update_balance_accumulates_deltas() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage.update_balance(1, "BTC", dec("100")).unwrap();
        storage.update_balance(1, "BTC", dec("-0.25")).unwrap();
        storage.update_balance(1, "ETH", dec("3")).unwrap();

        assert_eq!(storage.get_balance(1, "BTC").unwrap(), dec("99.75"));
        assert_eq!(storage.get_balance(1, "ETH").unwrap(), dec("3"));
        assert_eq!(storage.get_balance(2, "BTC").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_apply_event_is_idempotent() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let event = WalletEvent::deposit(1, "BTC", dec("100"));

        assert!(storage.apply_event(&event).unwrap());
        assert!(!storage.apply_event(&event).unwrap());

        assert_eq!(storage.get_balance(1, "BTC").unwrap(), dec("100"));
        let history = storage.get_transaction_history(1, "BTC").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_id, event.event_id);
        assert_eq!(history[0].balance_after, dec("100"));
        assert!(storage.is_event_applied(&event.event_id).unwrap());
    }

    #[test]
    fn test_withdraw_and_transfer_events_debit() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage
            .apply_event(&WalletEvent::deposit(1, "BTC", dec("10")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::withdraw(1, "BTC", dec("3")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::new(1, "BTC", EventKind::Transfer, dec("2")))
            .unwrap();

        assert_eq!(storage.get_balance(1, "BTC").unwrap(), dec("5"));
        let amounts: Vec<Decimal> = storage
            .get_transaction_history(1, "BTC")
            .unwrap()
            .iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(amounts, vec![dec("10"), dec("-3"), dec("-2")]);
    }

    #[test]
    fn test_history_is_scoped_to_wallet_and_asset() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage
            .apply_event(&WalletEvent::deposit(1, "BTC", dec("1")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::deposit(1, "BTCX", dec("1")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::deposit(2, "BTC", dec("1")))
            .unwrap();

        assert_eq!(storage.get_transaction_history(1, "BTC").unwrap().len(), 1);
        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.transaction_count, 3);
        assert_eq!(stats.balance_count, 3);
    }

    #[test]
    fn test_insert_transaction_assigns_sequence() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let event = WalletEvent::deposit(1, "BTC", dec("1"));
        let record = TransactionRecord::from_event(&event, dec("1"));

        let first = storage.insert_transaction(&record).unwrap();
        let second = storage.insert_transaction(&record).unwrap();
        assert_eq!(second, first + 1);

        let history = storage.get_transaction_history(1, "BTC").unwrap();
        assert_eq!(history.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![first, second]);
    }

    #[test]
    fn test_attempt_counter() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        assert_eq!(storage.attempts("msg-1").unwrap(), 0);
        assert_eq!(storage.increment("msg-1").unwrap(), 1);
        assert_eq!(storage.increment("msg-1").unwrap(), 2);
        assert_eq!(storage.attempts("msg-2").unwrap(), 0);

        storage.clear("msg-1").unwrap();
        assert_eq!(storage.attempts("msg-1").unwrap(), 0);
    }

    #[test]
    fn test_dead_letter_mark_replaces_counter() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage.increment("msg-1").unwrap();
        storage.increment("msg-1").unwrap();

        storage.mark_dead_lettered("msg-1").unwrap();
        assert!(storage.is_dead_lettered("msg-1").unwrap());
        assert!(!storage.is_dead_lettered("msg-2").unwrap());
        assert_eq!(storage.attempts("msg-1").unwrap(), 0);

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.retrying_count, 0);
        assert_eq!(stats.dead_lettered_count, 1);
    }

    #[test]
    fn test_prune_removes_only_stale_entries() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage.increment("in-flight").unwrap();
        storage.mark_dead_lettered("dead").unwrap();

        assert_eq!(storage.prune(0).unwrap(), 0);
        assert_eq!(storage.attempts("in-flight").unwrap(), 1);

        assert_eq!(storage.prune(i64::MAX).unwrap(), 2);
        assert_eq!(storage.attempts("in-flight").unwrap(), 0);
        assert!(!storage.is_dead_lettered("dead").unwrap());
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        assert!(
            storage
                .apply_event(&WalletEvent::deposit(1, "BTC", Decimal::MAX))
                .unwrap()
        );

        let overflow = WalletEvent::deposit(1, "BTC", Decimal::ONE);
        let err = storage.apply_event(&overflow).unwrap_err();
        assert!(matches!(
            err,
            StorageError::BalanceOverflow { wallet_id: 1, ref asset } if asset == "BTC"
        ));

        // Nothing from the failed event was written
        assert_eq!(storage.get_balance(1, "BTC").unwrap(), Decimal::MAX);
        assert_eq!(storage.get_transaction_history(1, "BTC").unwrap().len(), 1);
        assert!(!storage.is_event_applied(&overflow.event_id).unwrap());

        // The ledger keeps working for other events
        assert!(
            storage
                .apply_event(&WalletEvent::withdraw(1, "BTC", Decimal::ONE))
                .unwrap()
        );
    }

    #[test]
    fn test_wallet_level_reads() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        storage
            .apply_event(&WalletEvent::deposit(1, "ETH", dec("2")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::deposit(1, "BTC", dec("5")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::withdraw(1, "ETH", dec("0.5")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::deposit(2, "BTC", dec("9")))
            .unwrap();
        storage
            .apply_event(&WalletEvent::deposit(i64::MAX, "SOL", dec("1")))
            .unwrap();

        assert_eq!(
            storage.get_wallet_balances(1).unwrap(),
            vec![("BTC".to_string(), dec("5")), ("ETH".to_string(), dec("1.5"))]
        );
        assert_eq!(
            storage.get_wallet_balances(i64::MAX).unwrap(),
            vec![("SOL".to_string(), dec("1"))]
        );
        assert!(storage.get_wallet_balances(3).unwrap().is_empty());

        let history = storage.get_wallet_history(1).unwrap();
        let lines: Vec<(String, Decimal)> = history
            .iter()
            .map(|r| (r.asset_name.clone(), r.amount))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("ETH".to_string(), dec("2")),
                ("BTC".to_string(), dec("5")),
                ("ETH".to_string(), dec("-0.5")),
            ]
        );
        assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));

        assert_eq!(storage.list_wallets().unwrap(), vec![1, 2, i64::MAX]);
    }

    #[test]
    fn test_schedule_due_and_remove() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let early = TransferCommand::new(1, 2, "BTC", dec("1"), Some(i64::MAX / 2));
        let late = TransferCommand::new(1, 3, "BTC", dec("1"), Some(i64::MAX / 2));

        storage.schedule(&late, "wallet-1", 2_000).unwrap();
        storage.schedule(&early, "wallet-1", 1_000).unwrap();

        assert!(storage.due(999).unwrap().is_empty());
        let due = storage.due(1_000).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].command, early);

        let pending = storage.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].release_at, 1_000);

        storage.remove(&early.command_id).unwrap();
        assert_eq!(storage.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");

        {
            let storage = LedgerStorage::open(&path).unwrap();
            storage
                .apply_event(&WalletEvent::deposit(7, "ETH", dec("1.5")))
                .unwrap();
            storage.increment("msg").unwrap();
        }

        let storage = LedgerStorage::open(&path).unwrap();
        assert_eq!(storage.get_balance(7, "ETH").unwrap(), dec("1.5"));
        assert_eq!(storage.attempts("msg").unwrap(), 1);
    }
}
