//! Bounded FIFO between the ingestion and shipping tasks.
//!
//! The producer never waits: when the queue is full the new entry is dropped
//! and counted. The consumer waits in bounded slices so it can notice a
//! closed queue.

use esptail_core::LogEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tracing::trace;

/// Push counters, shared by clones of the producer's `Arc`
#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Queue was full; the entry was discarded
    Dropped,
    /// Consumer is gone
    Closed,
}

/// Reasons a bounded pop returned without an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    #[error("no entry within the wait interval")]
    Timeout,

    #[error("queue closed")]
    Closed,
}

/// Create the entry queue
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn entry_queue(capacity: usize, pop_wait: Duration) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(QueueStats::default());
    (QueueProducer { tx, stats }, QueueConsumer { rx, pop_wait })
}

/// Producer end, owned by the ingestion task
#[derive(Debug)]
pub struct QueueProducer {
    tx: mpsc::Sender<LogEntry>,
    stats: Arc<QueueStats>,
}

impl QueueProducer {
    /// Enqueue without waiting; a full queue drops the entry
    pub fn try_push(&self, entry: LogEntry) -> PushOutcome {
        match self.tx.try_send(entry) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Enqueued
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        self.stats.clone()
    }
}

/// Consumer end, owned by the shipping task
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::Receiver<LogEntry>,
    pop_wait: Duration,
}

impl QueueConsumer {
    /// Wait at most one `pop_wait` interval for the next entry
    pub async fn pop_timeout(&mut self) -> Result<LogEntry, PopError> {
        match timeout(self.pop_wait, self.rx.recv()).await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(PopError::Closed),
            Err(_) => Err(PopError::Timeout),
        }
    }

    /// Wait for the next entry, retrying the bounded wait indefinitely
    ///
    /// Returns `None` once the producer is gone and the queue is drained.
    pub async fn pop(&mut self) -> Option<LogEntry> {
        loop {
            match self.pop_timeout().await {
                Ok(entry) => return Some(entry),
                Err(PopError::Timeout) => trace!("Queue wait elapsed"),
                Err(PopError::Closed) => return None,
            }
        }
    }
}
