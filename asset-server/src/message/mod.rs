//! Message channel
//!
//! ```text
//!  CommandProducer ──▶ command-queue ──▶ CommandRouter ──▶ AssetService
//!                          ▲  ▲                                │
//!        TCP ingress ──────┘  └── ScheduleWorker               ▼
//!                                                     event-journal
//!                                                          │
//!          event-retry ◀── Escalator ◀── EventRouter ◀─────┘
//!               │              │              ▲
//!               │              ▼              │
//!               │          event-dlq          │
//!               └─────────────────────────────┘
//! ```
//!
//! Every arrow is a [`Publisher::publish`] of a [`Record`]; every consumer is
//! a [`MessageHandler`] driving one [`MessageProcessor`].

pub mod bus;
pub mod handler;
pub mod processor;
pub mod tcp_server;

pub use bus::{ChannelError, MessageBus, Publisher, Subscriber, Subscription};
pub use handler::MessageHandler;
pub use processor::{MessageProcessor, ProcessResult};
pub use shared::Record;
pub use tcp_server::IngressServer;
