//! Wallet command/event data model
//!
//! - Commands: durable requests to mutate wallet state, not yet applied
//! - Events: immutable facts recorded after a command was applied

pub mod command;
pub mod event;
pub mod types;

// Re-exports
pub use command::{Command, TransferCommand, WalletCommand};
pub use event::WalletEvent;
pub use types::{CommandType, EventKind, TransferStatus};
