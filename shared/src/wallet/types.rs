//! Shared enums for wallet commands and events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Command discriminant
// ============================================================================

/// Value of the `type` field on the command channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Withdraw,
    Deposit,
    Transfer,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Withdraw => "withdraw",
            CommandType::Deposit => "deposit",
            CommandType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdraw" => Ok(CommandType::Withdraw),
            "deposit" => Ok(CommandType::Deposit),
            "transfer" => Ok(CommandType::Transfer),
            other => Err(other.to_string()),
        }
    }
}

// ============================================================================
// Event discriminant
// ============================================================================

/// Value of the `type` field on the event channel
///
/// The journal only ever emits `Withdraw` and `Deposit`; `Transfer` is still
/// accepted by the projection (source-side debit only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Withdraw,
    Deposit,
    Transfer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Withdraw => "withdraw",
            EventKind::Deposit => "deposit",
            EventKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdraw" => Ok(EventKind::Withdraw),
            "deposit" => Ok(EventKind::Deposit),
            "transfer" => Ok(EventKind::Transfer),
            other => Err(other.to_string()),
        }
    }
}

// ============================================================================
// Transfer status
// ============================================================================

/// 转账状态（仅用于观测，不参与执行判断）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    #[default]
    Scheduled,
    Executed,
}
