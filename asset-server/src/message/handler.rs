//! Message Handler - one long-lived consumption loop per subscription
//!
//! Records are handled strictly one at a time. Any [`ProcessResult`] commits
//! the offset. A processor `Err` means the record could not be settled (a
//! channel or store outage), so the cursor is rewound and the same record is
//! delivered again after a backoff. Cancellation is checked between records,
//! never in the middle of one.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::bus::{ChannelError, Subscriber};
use super::processor::{MessageProcessor, ProcessResult};
use shared::Record;

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub struct MessageHandler<S: Subscriber> {
    subscription: S,
    processor: Arc<dyn MessageProcessor>,
    shutdown_token: CancellationToken,
    retry_backoff: Duration,
}

impl<S: Subscriber> MessageHandler<S> {
    pub fn new(
        subscription: S,
        processor: Arc<dyn MessageProcessor>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            subscription,
            processor,
            shutdown_token,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Initial delay before an unsettled record is redelivered (doubles up to 5s)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Start processing messages
    ///
    /// This is a long-running task that should be spawned in the background.
    pub async fn run(mut self) {
        let processor = self.processor.name();
        tracing::info!(
            processor,
            topic = %self.subscription.topic(),
            group = %self.subscription.group(),
            "Message handler started"
        );

        let mut backoff = self.retry_backoff;
        loop {
            let received = tokio::select! {
                biased;

                _ = self.shutdown_token.cancelled() => {
                    tracing::info!(processor, "Message handler shutting down");
                    break;
                }

                received = self.subscription.recv() => received,
            };

            let record = match received {
                Ok(record) => record,
                Err(ChannelError::Closed) => {
                    tracing::info!(processor, "Message channel closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(processor, error = %e, "Failed to receive message");
                    continue;
                }
            };

            if self.handle(&record).await {
                self.subscription.commit();
                backoff = self.retry_backoff;
                continue;
            }

            // Leave the offset where it is and try the same record again
            self.subscription.rewind();
            tracing::warn!(
                processor,
                key = %record.key,
                id = %record.id,
                backoff_ms = backoff.as_millis() as u64,
                "Message not settled, redelivering"
            );
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!(processor, "Message handler shutting down");
                    break;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
        }

        tracing::info!(processor, "Message handler stopped");
    }

    /// Returns whether the record is settled and may be committed
    async fn handle(&self, record: &Record) -> bool {
        let processor = self.processor.name();
        match self.processor.process(record).await {
            Ok(result) => {
                match &result {
                    ProcessResult::Applied { .. } | ProcessResult::Deferred { .. } => {
                        tracing::info!(processor, key = %record.key, id = %record.id, result = %result, "Message processed");
                    }
                    ProcessResult::Skipped { .. } | ProcessResult::Retried { .. } => {
                        tracing::warn!(processor, key = %record.key, id = %record.id, result = %result, "Message processed");
                    }
                    ProcessResult::Failed { .. } | ProcessResult::DeadLettered { .. } => {
                        tracing::error!(processor, key = %record.key, id = %record.id, result = %result, "Message processed");
                    }
                }
                true
            }
            Err(e) => {
                tracing::error!(
                    processor,
                    key = %record.key,
                    id = %record.id,
                    error = %e,
                    "Failed to handle message"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBus, Publisher};
    use crate::utils::{AppError, AppResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails `bad` until it has been seen `failures` times
    struct Recorder {
        seen: Mutex<Vec<Vec<u8>>>,
        failures: usize,
    }

    impl Recorder {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                failures,
            })
        }
    }

    #[async_trait]
    impl MessageProcessor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn process(&self, record: &Record) -> AppResult<ProcessResult> {
            let mut seen = self.seen.lock();
            seen.push(record.payload.clone());
            if record.payload == b"bad" {
                let tries = seen.iter().filter(|p| p.as_slice() == b"bad").count();
                if tries <= self.failures {
                    return Err(AppError::transient("store unavailable"));
                }
            }
            Ok(ProcessResult::applied("ok"))
        }
    }

    async fn publish_all(bus: &MessageBus, payloads: &[&str]) {
        for payload in payloads {
            bus.publish("t", Record::new("k", payload.as_bytes().to_vec()))
                .await
                .unwrap();
        }
    }

    async fn wait_for_seen(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.seen.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_handler_processes_in_order_and_commits() {
        let bus = MessageBus::new();
        publish_all(&bus, &["a", "b", "c"]).await;

        let recorder = Recorder::new(0);
        let token = CancellationToken::new();
        let handler = MessageHandler::new(bus.subscribe("t", "g"), recorder.clone(), token.clone());
        let task = tokio::spawn(handler.run());

        wait_for_seen(&recorder, 3).await;
        token.cancel();
        task.await.unwrap();

        let seen = recorder.seen.lock().clone();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        bus.publish("t", Record::new("k", b"d".to_vec())).await.unwrap();
        let mut next = bus.subscribe("t", "g");
        assert_eq!(next.recv().await.unwrap().payload, b"d");
    }

    #[tokio::test]
    async fn test_failed_record_is_redelivered_until_settled() {
        let bus = MessageBus::new();
        publish_all(&bus, &["a", "bad", "c"]).await;

        let recorder = Recorder::new(2);
        let token = CancellationToken::new();
        let handler = MessageHandler::new(bus.subscribe("t", "g"), recorder.clone(), token.clone())
            .with_retry_backoff(Duration::from_millis(5));
        let task = tokio::spawn(handler.run());

        wait_for_seen(&recorder, 5).await;
        token.cancel();
        task.await.unwrap();

        // Nothing overtakes the failing record on its key
        let seen = recorder.seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                b"a".to_vec(),
                b"bad".to_vec(),
                b"bad".to_vec(),
                b"bad".to_vec(),
                b"c".to_vec()
            ]
        );

        bus.publish("t", Record::new("k", b"d".to_vec())).await.unwrap();
        let mut next = bus.subscribe("t", "g");
        assert_eq!(next.recv().await.unwrap().payload, b"d");
    }

    #[tokio::test]
    async fn test_unsettled_record_survives_handler_restart() {
        let bus = MessageBus::new();
        publish_all(&bus, &["a", "bad", "c"]).await;

        let recorder = Recorder::new(usize::MAX);
        let token = CancellationToken::new();
        let handler = MessageHandler::new(bus.subscribe("t", "g"), recorder.clone(), token.clone())
            .with_retry_backoff(Duration::from_millis(5));
        let task = tokio::spawn(handler.run());

        wait_for_seen(&recorder, 3).await;
        token.cancel();
        task.await.unwrap();
        assert!(!recorder.seen.lock().contains(&b"c".to_vec()));

        let mut next = bus.subscribe("t", "g");
        assert_eq!(next.recv().await.unwrap().payload, b"bad");
    }
}
