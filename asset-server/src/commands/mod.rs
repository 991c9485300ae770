//! Command side of the pipeline
//!
//! - [`CommandProducer`] - intent → command channel
//! - [`CommandRouter`] - dispatches commands by type
//! - [`TransferScheduler`] - execute-now vs defer decision for transfers
//! - [`AssetService`] - apply path, emits wallet events
//! - [`ScheduleWorker`] - releases parked transfers when they come due

pub mod producer;
pub mod router;
pub mod schedule_worker;
pub mod scheduler;
pub mod service;

pub use producer::{CommandProducer, ProducerError};
pub use router::CommandRouter;
pub use schedule_worker::ScheduleWorker;
pub use scheduler::{
    DEFAULT_HORIZON_SECS, Decision, DeferMode, TransferError, TransferOutcome, TransferScheduler,
};
pub use service::{ApplyError, AssetService};
