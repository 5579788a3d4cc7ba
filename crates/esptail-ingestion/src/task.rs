use crate::filter::filter;
use crate::framer::frame;
use crate::queue::{PushOutcome, QueueProducer};
use crate::source::{SerialEvent, SerialSource};
use esptail_core::limits::READ_BUFFER_SIZE;
use esptail_core::{Clock, IngestionError, LogEntry};
use esptail_pipeline::Pipeline;
use heapless::Vec as HeaplessVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters kept by the ingestion task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Data chunks read from the source
    pub chunks: u64,
    /// Non-empty lines framed
    pub lines: u64,
    pub enqueued: u64,
    /// Entries dropped because the queue was full
    pub dropped: u64,
    /// Chunks whose filtered output hit the buffer cap
    pub truncated_chunks: u64,
    /// Break, parity, and frame errors
    pub link_errors: u64,
    /// Input flushes after overflow or ring-full events
    pub resets: u64,
}

/// Filter, frame, label, and enqueue captured chunks
pub struct LineProcessor {
    clock: Arc<dyn Clock>,
    pipeline: Pipeline,
    producer: QueueProducer,
    filtered: HeaplessVec<u8, READ_BUFFER_SIZE>,
    stats: IngestionStats,
}

impl LineProcessor {
    pub fn new(clock: Arc<dyn Clock>, pipeline: Pipeline, producer: QueueProducer) -> Self {
        Self {
            clock,
            pipeline,
            producer,
            filtered: HeaplessVec::new(),
            stats: IngestionStats::default(),
        }
    }

    /// Process one raw chunk
    ///
    /// Lines are enqueued in the order they appear. Fails only when the
    /// shipping side has gone away.
    pub fn ingest(&mut self, raw: &[u8]) -> Result<(), IngestionError> {
        self.stats.chunks += 1;

        let report = filter(raw, &mut self.filtered);
        if report.truncated {
            self.stats.truncated_chunks += 1;
            warn!(
                raw = raw.len(),
                kept = report.written,
                "Filtered chunk exceeded buffer, tail discarded"
            );
        }
        if report.unterminated {
            debug!("Chunk ended inside an escape sequence");
        }

        for line in frame(&self.filtered) {
            self.stats.lines += 1;
            let received_at = self.clock.now();
            let entry = match self.pipeline.process(LogEntry::from_bytes(received_at, line)) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Labeling failed, shipping line unlabeled");
                    LogEntry::from_bytes(received_at, line)
                }
            };

            match self.producer.try_push(entry) {
                PushOutcome::Enqueued => self.stats.enqueued += 1,
                PushOutcome::Dropped => {
                    self.stats.dropped += 1;
                    debug!(dropped = self.stats.dropped, "Entry queue full, dropping line");
                }
                PushOutcome::Closed => return Err(IngestionError::ChannelClosed),
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }
}

/// Task draining serial events into the entry queue
pub struct IngestionTask<S> {
    source: S,
    processor: LineProcessor,
    read_buf: [u8; READ_BUFFER_SIZE],
}

impl<S: SerialSource> IngestionTask<S> {
    pub fn new(source: S, processor: LineProcessor) -> Self {
        Self {
            source,
            processor,
            read_buf: [0; READ_BUFFER_SIZE],
        }
    }

    /// Run until the source closes
    ///
    /// Driver and link errors are logged and survived; only a closed queue
    /// ends the task early.
    pub async fn run(mut self) -> Result<IngestionStats, IngestionError> {
        info!("Ingestion task started");

        while let Some(event) = self.source.next_event().await {
            self.handle_event(event)?;
        }

        let stats = *self.processor.stats();
        info!(
            chunks = stats.chunks,
            lines = stats.lines,
            enqueued = stats.enqueued,
            dropped = stats.dropped,
            "Serial source closed, ingestion stopped"
        );
        Ok(stats)
    }

    fn handle_event(&mut self, event: SerialEvent) -> Result<(), IngestionError> {
        match event {
            SerialEvent::Data { len } => {
                let n = self.source.read(len, &mut self.read_buf);
                debug!(announced = len, read = n, "Serial data");
                self.processor.ingest(&self.read_buf[..n])?;
            }
            SerialEvent::FifoOverflow => {
                warn!("Hardware FIFO overflow, flushing input");
                self.resynchronize();
            }
            SerialEvent::BufferFull => {
                warn!("Serial ring buffer full, flushing input");
                self.resynchronize();
            }
            SerialEvent::Break => {
                self.processor.stats.link_errors += 1;
                info!("Serial RX break");
            }
            SerialEvent::ParityError => {
                self.processor.stats.link_errors += 1;
                warn!("Serial parity error");
            }
            SerialEvent::FrameError => {
                self.processor.stats.link_errors += 1;
                warn!("Serial frame error");
            }
            SerialEvent::Unknown(code) => {
                info!(code, "Ignoring unknown serial event");
            }
        }
        Ok(())
    }

    fn resynchronize(&mut self) {
        self.processor.stats.resets += 1;
        self.source.flush_input();
        self.source.reset_events();
    }
}
