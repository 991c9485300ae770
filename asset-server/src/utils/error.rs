//! 统一错误处理
//!
//! Each layer owns a `thiserror` enum (`ChannelError`, `StorageError`,
//! `ProducerError`, `ApplyError`, `TransferError`, `JournalError`); processors
//! surface them as [`AppError`] when a message cannot be settled, and the
//! handler delivers it again.
//!
//! ```ignore
//! return Err(AppError::invalid("amount must be positive"));
//! ```

use crate::message::ChannelError;
use crate::storage::StorageError;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 请求错误 ==========
    #[error("Invalid request: {0}")]
    Invalid(String),

    // ========== 系统错误 ==========
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Database error: {0}")]
    Database(String),

    /// Not settled yet; the same message may succeed on redelivery
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(matches!(AppError::invalid("x"), AppError::Invalid(m) if m == "x"));
        assert!(matches!(AppError::transient("down"), AppError::Transient(m) if m == "down"));
        assert!(matches!(
            AppError::from(StorageError::BalanceOverflow {
                wallet_id: 1,
                asset: "BTC".to_string(),
            }),
            AppError::Database(_)
        ));
        assert_eq!(
            AppError::from(ChannelError::Closed).to_string(),
            "Channel error: channel closed"
        );
    }
}
