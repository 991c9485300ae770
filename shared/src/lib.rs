//! Shared types for the wallet asset pipeline
//!
//! Wire-level types used by every stage of the pipeline: the command and
//! event data model, the channel record envelope, and the payload codec.

pub mod message;
pub mod util;
pub mod wallet;

// Re-exports
pub use message::codec::{DecodeError, PayloadEncoding};
pub use message::Record;
pub use wallet::{
    Command, CommandType, EventKind, TransferCommand, TransferStatus, WalletCommand, WalletEvent,
};
