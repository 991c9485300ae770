//! Event side of the pipeline
//!
//! - [`EventJournal`] - appends `WalletEvent`s to the event channel
//! - [`EventRouter`] - projects events, escalating failures
//! - [`Escalator`] - bounded retry, then dead-letter
//! - [`AttemptPruner`] - expires stale attempt state

pub mod escalator;
pub mod journal;
pub mod pruner;
pub mod router;

pub use escalator::Escalator;
pub use journal::{EventJournal, JournalError};
pub use pruner::AttemptPruner;
pub use router::EventRouter;
