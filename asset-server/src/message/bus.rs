//! 消息总线核心实现
//!
//! # 架构
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 MessageBus                    │
//! │  topic ──▶ TopicLog { base, records, offsets }│
//! └──────────────────────┬────────────────────────┘
//!                        │ subscribe(topic, group)
//!             ┌──────────┴──────────┐
//!             ▼                     ▼
//!       Subscription           Subscription
//!     (command router)        (event router)
//! ```
//!
//! Each topic is a single append-only log, so records sharing a key are
//! always delivered in publish order. Consumer groups keep their own
//! committed offset; a record read but not committed is delivered again to
//! the next subscription of the same group.
//!
//! Consumers only see the [`Publisher`] and [`Subscriber`] traits. This
//! in-process backend keeps logs and offsets in memory, so queued records
//! survive a consumer restart but not a process restart. Durability across
//! process restarts needs a broker-backed implementation of both traits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use shared::Record;

/// Channel errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("publish to {topic} failed: {reason}")]
    Unavailable { topic: String, reason: String },
}

/// Append side of a channel
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, record: Record) -> Result<(), ChannelError>;
}

/// Consume side of a channel: one consumer group's cursor on one topic
#[async_trait]
pub trait Subscriber: Send {
    fn topic(&self) -> &str;

    fn group(&self) -> &str;

    /// Wait for the next record after the cursor
    async fn recv(&mut self) -> Result<Record, ChannelError>;

    /// Mark everything returned by `recv` so far as consumed by the group
    fn commit(&mut self);

    /// Move the cursor back to the group's committed offset
    ///
    /// Records received since the last commit are delivered again.
    fn rewind(&mut self);
}

struct LogState {
    /// Absolute offset of `records[0]`
    base: u64,
    records: VecDeque<Record>,
    /// Committed offset per consumer group
    offsets: HashMap<String, u64>,
}

struct TopicLog {
    state: Mutex<LogState>,
    notify: Notify,
    /// Records kept once every group has consumed them
    retention: usize,
}

impl TopicLog {
    fn new(retention: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                base: 0,
                records: VecDeque::new(),
                offsets: HashMap::new(),
            }),
            notify: Notify::new(),
            retention,
        }
    }

    fn append(&self, record: Record) {
        self.state.lock().records.push_back(record);
        self.notify.notify_waiters();
    }

    fn get(&self, offset: u64) -> Option<Record> {
        let state = self.state.lock();
        let index = offset.checked_sub(state.base)?;
        state.records.get(index as usize).cloned()
    }

    /// Committed offset of `group`, registering the group on first use
    ///
    /// A registered group holds back retention until it commits.
    fn start_offset(&self, group: &str) -> u64 {
        let mut state = self.state.lock();
        let base = state.base;
        let committed = *state.offsets.entry(group.to_string()).or_insert(base);
        committed.max(base)
    }

    fn commit(&self, group: &str, offset: u64) {
        let mut state = self.state.lock();
        let entry = state.offsets.entry(group.to_string()).or_insert(0);
        if offset > *entry {
            *entry = offset;
        }

        // Drop records every known group has consumed, beyond the retention window
        let consumed = state.offsets.values().copied().min().unwrap_or(0);
        while state.records.len() > self.retention && state.base < consumed {
            state.records.pop_front();
            state.base += 1;
        }
    }

    fn snapshot(&self) -> Vec<Record> {
        self.state.lock().records.iter().cloned().collect()
    }

    fn end_offset(&self) -> u64 {
        let state = self.state.lock();
        state.base + state.records.len() as u64
    }
}

/// 消息总线 - 进程内分区有序日志
///
/// Cloning shares the same topics and shutdown token.
#[derive(Clone)]
pub struct MessageBus {
    topics: Arc<DashMap<String, Arc<TopicLog>>>,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
    retention: usize,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("topics", &self.topics.len())
            .field("closed", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// `capacity` consumed records are kept per topic for inspection
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            shutdown_token: CancellationToken::new(),
            retention: capacity,
        }
    }

    fn topic(&self, topic: &str) -> Arc<TopicLog> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicLog::new(self.retention)))
            .clone()
    }

    /// Append a record to `topic`
    pub fn append(&self, topic: &str, record: Record) -> Result<(), ChannelError> {
        if self.shutdown_token.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        tracing::trace!(topic = %topic, key = %record.key, id = %record.id, "Record appended");
        self.topic(topic).append(record);
        Ok(())
    }

    /// Subscribe `group` to `topic`, resuming from its committed offset
    pub fn subscribe(&self, topic: &str, group: &str) -> Subscription {
        let log = self.topic(topic);
        let position = log.start_offset(group);
        Subscription {
            topic: topic.to_string(),
            group: group.to_string(),
            log,
            position,
            shutdown_token: self.shutdown_token.clone(),
        }
    }

    /// Records currently retained on `topic`, oldest first
    pub fn records(&self, topic: &str) -> Vec<Record> {
        self.topics
            .get(topic)
            .map(|log| log.snapshot())
            .unwrap_or_default()
    }

    /// Total number of records ever appended to `topic`
    pub fn published_count(&self, topic: &str) -> u64 {
        self.topics
            .get(topic)
            .map(|log| log.end_offset())
            .unwrap_or(0)
    }

    /// 获取关闭令牌 (用于监控关闭信号)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭消息总线
    ///
    /// 唤醒所有等待中的订阅者，之后的发布返回 `ChannelError::Closed`
    pub fn shutdown(&self) {
        tracing::info!("Shutting down message bus");
        self.shutdown_token.cancel();
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MessageBus {
    async fn publish(&self, topic: &str, record: Record) -> Result<(), ChannelError> {
        self.append(topic, record)
    }
}

/// A consumer group's cursor on one topic
pub struct Subscription {
    topic: String,
    group: String,
    log: Arc<TopicLog>,
    /// Next offset to read
    position: u64,
    shutdown_token: CancellationToken,
}

#[async_trait]
impl Subscriber for Subscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group(&self) -> &str {
        &self.group
    }

    /// Cancel safe: the cursor only moves once a record is returned.
    async fn recv(&mut self) -> Result<Record, ChannelError> {
        loop {
            let notified = self.log.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.log.get(self.position) {
                self.position += 1;
                return Ok(record);
            }

            if self.shutdown_token.is_cancelled() {
                return Err(ChannelError::Closed);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.shutdown_token.cancelled() => return Err(ChannelError::Closed),
            }
        }
    }

    fn commit(&mut self) {
        self.log.commit(&self.group, self.position);
    }

    fn rewind(&mut self) {
        self.position = self.log.start_offset(&self.group);
    }
}
