//! Channel record envelope
//!
//! Every stage of the pipeline exchanges `Record`s: an opaque payload plus the
//! partition key and a stable identity used for retry accounting.

pub mod codec;

use uuid::Uuid;

use crate::util::now_millis;

/// One message on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Message identity; republishing a record unchanged keeps it
    pub id: Uuid,
    /// Partition key (`wallet-<id>`)
    pub key: String,
    pub payload: Vec<u8>,
    /// Unix milliseconds of the first publish
    pub published_at: i64,
}

impl Record {
    pub fn new(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            payload,
            published_at: now_millis(),
        }
    }

    /// Payload as UTF-8 text, lossy; for logging only
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
