//! Unified Result Types

use super::AppError;

/// Application-level Result type
///
/// Used by message processors and background workers
pub type AppResult<T> = Result<T, AppError>;
