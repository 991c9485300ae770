//! Wallet commands - requests recorded on the command channel

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{CommandType, TransferStatus};
use crate::util::{now_secs, wallet_key};

/// Withdraw / deposit command body
///
/// The `type` discriminant lives on [`WalletCommand`]; a `Command` is the
/// same shape for both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Opaque unique identifier
    #[serde(alias = "comand_id")]
    pub command_id: String,
    pub wallet_id: i64,
    pub asset_name: String,
    /// Always positive; direction comes from the command type
    pub amount: Decimal,
    /// Unix seconds
    pub timestamp: i64,
}

impl Command {
    pub fn new(wallet_id: i64, asset_name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            wallet_id,
            asset_name: asset_name.into(),
            amount,
            timestamp: now_secs(),
        }
    }
}

/// Transfer between two wallets, eligible from `execute_time` on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCommand {
    pub command_id: String,
    pub from_wallet: i64,
    pub to_wallet: i64,
    pub asset_name: String,
    pub amount: Decimal,
    /// Unix seconds at which the transfer becomes eligible
    pub execute_time: i64,
    /// Advisory only: the router re-evaluates `execute_time` on every delivery
    #[serde(default)]
    pub status: TransferStatus,
    /// Unix seconds
    pub created_at: i64,
}

impl TransferCommand {
    /// Build a transfer; a missing or past `execute_time` means "now"
    pub fn new(
        from_wallet: i64,
        to_wallet: i64,
        asset_name: impl Into<String>,
        amount: Decimal,
        execute_time: Option<i64>,
    ) -> Self {
        let now = now_secs();
        let execute_time = execute_time.filter(|t| *t > now).unwrap_or(now);
        let status = if execute_time > now {
            TransferStatus::Scheduled
        } else {
            TransferStatus::Executed
        };

        Self {
            command_id: Uuid::new_v4().to_string(),
            from_wallet,
            to_wallet,
            asset_name: asset_name.into(),
            amount,
            execute_time,
            status,
            created_at: now,
        }
    }
}

/// Command channel payload, discriminated by `type`
///
/// ```json
/// {"type":"deposit","command_id":"…","wallet_id":1,"asset_name":"BTC","amount":"100","timestamp":1738492914}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WalletCommand {
    Withdraw(Command),
    Deposit(Command),
    Transfer(TransferCommand),
}

impl WalletCommand {
    pub fn withdraw(wallet_id: i64, asset_name: impl Into<String>, amount: Decimal) -> Self {
        WalletCommand::Withdraw(Command::new(wallet_id, asset_name, amount))
    }

    pub fn deposit(wallet_id: i64, asset_name: impl Into<String>, amount: Decimal) -> Self {
        WalletCommand::Deposit(Command::new(wallet_id, asset_name, amount))
    }

    pub fn transfer(
        from_wallet: i64,
        to_wallet: i64,
        asset_name: impl Into<String>,
        amount: Decimal,
        execute_time: Option<i64>,
    ) -> Self {
        WalletCommand::Transfer(TransferCommand::new(
            from_wallet,
            to_wallet,
            asset_name,
            amount,
            execute_time,
        ))
    }

    pub fn command_type(&self) -> CommandType {
        match self {
            WalletCommand::Withdraw(_) => CommandType::Withdraw,
            WalletCommand::Deposit(_) => CommandType::Deposit,
            WalletCommand::Transfer(_) => CommandType::Transfer,
        }
    }

    pub fn command_id(&self) -> &str {
        match self {
            WalletCommand::Withdraw(cmd) | WalletCommand::Deposit(cmd) => &cmd.command_id,
            WalletCommand::Transfer(cmd) => &cmd.command_id,
        }
    }

    pub fn asset_name(&self) -> &str {
        match self {
            WalletCommand::Withdraw(cmd) | WalletCommand::Deposit(cmd) => &cmd.asset_name,
            WalletCommand::Transfer(cmd) => &cmd.asset_name,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            WalletCommand::Withdraw(cmd) | WalletCommand::Deposit(cmd) => cmd.amount,
            WalletCommand::Transfer(cmd) => cmd.amount,
        }
    }

    /// Default partition key: the wallet whose balance moves first
    pub fn partition_key(&self) -> String {
        match self {
            WalletCommand::Withdraw(cmd) | WalletCommand::Deposit(cmd) => wallet_key(cmd.wallet_id),
            WalletCommand::Transfer(cmd) => wallet_key(cmd.from_wallet),
        }
    }
}
