//! Shipping task: drains the entry queue and pushes one request per entry.
//!
//! Delivery is best effort. A failed or rejected push is logged and counted,
//! and the next entry is taken immediately; nothing is retried or requeued.

use crate::payload::PayloadBuilder;
use crate::transport::PushTransport;
use esptail_core::{LogEntry, LokiConfig};
use esptail_ingestion::QueueConsumer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, trace, warn};

/// Position of the shipper within one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipState {
    Idle,
    Dequeued,
    Formatting,
    Sending,
    Success,
    Failure,
}

/// Outcome counters, shared with whoever holds the `Arc`
#[derive(Debug, Default)]
pub struct ShipperStats {
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    truncated: AtomicU64,
}

impl ShipperStats {
    /// Pushes answered with a 2xx status
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Pushes answered with any other status
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Entries that could not be formatted or got no response
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Entries shipped with a shortened line
    pub fn truncated(&self) -> u64 {
        self.truncated.load(Ordering::Relaxed)
    }
}

/// Result of shipping a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipOutcome {
    Delivered { status: u16 },
    Rejected { status: u16 },
    Failed,
}

fn transition(state: &mut ShipState, next: ShipState) {
    trace!(from = ?*state, to = ?next, "Shipper state");
    *state = next;
}

pub struct Shipper<T> {
    consumer: QueueConsumer,
    config: watch::Receiver<Arc<LokiConfig>>,
    transport: T,
    builder: PayloadBuilder,
    stats: Arc<ShipperStats>,
    state: ShipState,
}

impl<T: PushTransport> Shipper<T> {
    pub fn new(
        consumer: QueueConsumer,
        config: watch::Receiver<Arc<LokiConfig>>,
        transport: T,
    ) -> Self {
        Self {
            consumer,
            config,
            transport,
            builder: PayloadBuilder::new(),
            stats: Arc::new(ShipperStats::default()),
            state: ShipState::Idle,
        }
    }

    pub fn stats(&self) -> Arc<ShipperStats> {
        self.stats.clone()
    }

    pub fn state(&self) -> ShipState {
        self.state
    }

    /// Ship entries until the queue is closed and drained
    pub async fn run(mut self) -> Arc<ShipperStats> {
        info!("Shipper started");

        while let Some(entry) = self.consumer.pop().await {
            transition(&mut self.state, ShipState::Dequeued);
            self.ship(&entry).await;
        }

        info!(
            delivered = self.stats.delivered(),
            rejected = self.stats.rejected(),
            failed = self.stats.failed(),
            "Shipper stopped, queue closed"
        );
        self.stats
    }

    /// Format and push one entry, waiting for the response
    pub async fn ship(&mut self, entry: &LogEntry) -> ShipOutcome {
        let config = self.config.borrow_and_update().clone();

        transition(&mut self.state, ShipState::Formatting);
        let payload = match self.builder.build(&config, entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to format entry, discarding");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                transition(&mut self.state, ShipState::Failure);
                transition(&mut self.state, ShipState::Idle);
                return ShipOutcome::Failed;
            }
        };
        if payload.truncated {
            self.stats.truncated.fetch_add(1, Ordering::Relaxed);
        }

        transition(&mut self.state, ShipState::Sending);
        let outcome = match self.transport.push(&config, payload.body).await {
            Ok(response) if response.is_success() => {
                info!(
                    status = response.status,
                    content_length = ?response.content_length,
                    "Entry delivered"
                );
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                transition(&mut self.state, ShipState::Success);
                ShipOutcome::Delivered {
                    status: response.status,
                }
            }
            Ok(response) => {
                warn!(
                    status = response.status,
                    content_length = ?response.content_length,
                    endpoint = %config.endpoint,
                    "Loki rejected entry"
                );
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                transition(&mut self.state, ShipState::Failure);
                ShipOutcome::Rejected {
                    status: response.status,
                }
            }
            Err(e) => {
                warn!(error = %e, endpoint = %config.endpoint, "Loki push failed");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                transition(&mut self.state, ShipState::Failure);
                ShipOutcome::Failed
            }
        };

        transition(&mut self.state, ShipState::Idle);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PushResponse;
    use chrono::Utc;
    use esptail_core::{ConfigHandle, OutputError};
    use esptail_ingestion::entry_queue;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_test::traced_test;

    /// Records every body; answers from a script, then with 204
    #[derive(Clone, Default)]
    struct RecordingTransport {
        bodies: Arc<Mutex<Vec<String>>>,
        script: Arc<Mutex<VecDeque<Option<u16>>>>,
    }

    impl RecordingTransport {
        fn scripted(responses: &[Option<u16>]) -> Self {
            let transport = Self::default();
            transport.script.lock().unwrap().extend(responses.iter().copied());
            transport
        }

        fn bodies(&self) -> Vec<String> {
            self.bodies.lock().unwrap().clone()
        }
    }

    impl PushTransport for RecordingTransport {
        async fn push(
            &self,
            _config: &LokiConfig,
            body: &[u8],
        ) -> Result<PushResponse, OutputError> {
            self.bodies
                .lock()
                .unwrap()
                .push(String::from_utf8(body.to_vec()).unwrap());
            match self.script.lock().unwrap().pop_front().unwrap_or(Some(204)) {
                Some(status) => Ok(PushResponse {
                    status,
                    content_length: Some(0),
                }),
                None => Err(OutputError::Network("connection refused".to_string())),
            }
        }
    }

    fn line_of(body: &str) -> String {
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        json["streams"][0]["values"][0][1].as_str().unwrap().to_string()
    }

    fn entry(line: &str) -> LogEntry {
        LogEntry::new(Utc::now(), line)
    }

    #[tokio::test]
    async fn test_run_ships_in_fifo_order() {
        let (producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(LokiConfig::default(), None);
        let transport = RecordingTransport::default();
        let shipper = Shipper::new(consumer, handle.subscribe(), transport.clone());

        for line in ["one", "two", "three"] {
            producer.try_push(entry(line));
        }
        drop(producer);

        let stats = tokio::time::timeout(Duration::from_secs(5), shipper.run())
            .await
            .unwrap();

        let lines: Vec<String> = transport.bodies().iter().map(|b| line_of(b)).collect();
        assert_eq!(lines, ["one", "two", "three"]);
        assert_eq!(stats.delivered(), 3);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn test_failed_push_does_not_block_next_entry() {
        let (producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(LokiConfig::default(), None);
        let transport = RecordingTransport::scripted(&[None]);
        let shipper = Shipper::new(consumer, handle.subscribe(), transport.clone());

        producer.try_push(entry("lost"));
        producer.try_push(entry("kept"));
        drop(producer);

        let stats = tokio::time::timeout(Duration::from_secs(5), shipper.run())
            .await
            .unwrap();

        assert_eq!(transport.bodies().len(), 2);
        assert_eq!(line_of(&transport.bodies()[1]), "kept");
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_counted_as_rejected() {
        let (_producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(LokiConfig::default(), None);
        let transport = RecordingTransport::scripted(&[Some(500)]);
        let mut shipper = Shipper::new(consumer, handle.subscribe(), transport);

        let outcome = shipper.ship(&entry("x")).await;

        assert_eq!(outcome, ShipOutcome::Rejected { status: 500 });
        assert_eq!(shipper.stats().rejected(), 1);
        assert_eq!(shipper.state(), ShipState::Idle);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_delivery_logs_status_and_length_at_info() {
        let (_producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(LokiConfig::default(), None);
        let mut shipper = Shipper::new(consumer, handle.subscribe(), RecordingTransport::default());

        shipper.ship(&entry("I (1) hello")).await;

        logs_assert(|lines: &[&str]| {
            match lines.iter().find(|line| line.contains("Entry delivered")) {
                Some(line)
                    if line.contains("INFO")
                        && line.contains("status=204")
                        && line.contains("content_length=Some(0)") =>
                {
                    Ok(())
                }
                other => Err(format!("delivery not logged at info: {:?}", other)),
            }
        });
    }

    #[tokio::test]
    async fn test_config_update_applies_to_next_shipment() {
        let (_producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(
            LokiConfig {
                emitter: "before".to_string(),
                ..Default::default()
            },
            None,
        );
        let transport = RecordingTransport::default();
        let mut shipper = Shipper::new(consumer, handle.subscribe(), transport.clone());

        shipper.ship(&entry("first")).await;
        handle
            .publish(LokiConfig {
                emitter: "after".to_string(),
                ..Default::default()
            })
            .unwrap();
        shipper.ship(&entry("second")).await;

        let bodies = transport.bodies();
        assert!(bodies[0].contains(r#""emitter":"before""#));
        assert!(bodies[1].contains(r#""emitter":"after""#));
    }

    #[tokio::test]
    async fn test_truncated_entry_is_counted() {
        let (_producer, consumer) = entry_queue(15, Duration::from_millis(10));
        let handle = ConfigHandle::new(LokiConfig::default(), None);
        let mut shipper = Shipper::new(consumer, handle.subscribe(), RecordingTransport::default());

        let long = "z".repeat(esptail_core::limits::MAX_LINE_LEN * 2);
        let outcome = shipper.ship(&entry(&long)).await;

        assert_eq!(outcome, ShipOutcome::Delivered { status: 204 });
        assert_eq!(shipper.stats().truncated(), 1);
    }
}
