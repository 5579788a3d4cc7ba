//! Spawns the ingestion and shipping tasks around one entry queue.

use anyhow::Context;
use esptail_core::{Clock, Config, ConfigHandle, ConfigStore, EsptailError};
use esptail_ingestion::{
    entry_queue, IngestionStats, IngestionTask, LineProcessor, QueueStats, SerialSource,
};
use esptail_output::{PushTransport, Shipper, ShipperStats};
use esptail_pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Running pipeline: one ingestion task feeding one shipper
pub struct Agent {
    ingestion: JoinHandle<Result<IngestionStats, esptail_core::IngestionError>>,
    shipper: JoinHandle<Arc<ShipperStats>>,
    queue: Arc<QueueStats>,
}

/// Final counters of a finished agent
#[derive(Debug)]
pub struct AgentReport {
    pub ingestion: IngestionStats,
    pub shipper: Arc<ShipperStats>,
    pub queue: Arc<QueueStats>,
}

/// Start both tasks on the current runtime
///
/// The shipper follows `handle`, so a configuration published after this
/// call applies to the next entry shipped.
pub fn spawn<S, T>(
    config: &Config,
    source: S,
    transport: T,
    clock: Arc<dyn Clock>,
    handle: &ConfigHandle,
) -> Agent
where
    S: SerialSource + 'static,
    T: PushTransport + 'static,
{
    let (producer, consumer) = entry_queue(config.queue.capacity, config.queue.pop_wait());
    let queue = producer.stats();

    let pipeline = Pipeline::from_config(&config.modules);
    info!(
        modules = ?pipeline.module_names(),
        "Pipeline initialized with {} module(s)",
        pipeline.module_count()
    );

    let processor = LineProcessor::new(clock, pipeline, producer);
    let ingestion = tokio::spawn(IngestionTask::new(source, processor).run());
    let shipper = tokio::spawn(Shipper::new(consumer, handle.subscribe(), transport).run());

    info!(
        capacity = config.queue.capacity,
        endpoint = %handle.get().endpoint,
        "Agent started"
    );

    Agent {
        ingestion,
        shipper,
        queue,
    }
}

impl Agent {
    /// Wait until the source closes and every queued entry has been shipped
    pub async fn wait(self) -> anyhow::Result<AgentReport> {
        let ingestion = self
            .ingestion
            .await
            .context("ingestion task panicked")?
            .context("ingestion stopped")?;
        let shipper = self.shipper.await.context("shipper task panicked")?;

        Ok(AgentReport {
            ingestion,
            shipper,
            queue: self.queue,
        })
    }
}

/// Poll `clock` until it reports a synchronized time
///
/// Returns false if it is still unsynchronized after `retries` waits.
pub async fn wait_for_clock(clock: &dyn Clock, retries: u32, interval: Duration) -> bool {
    for attempt in 0..=retries {
        if clock.is_synchronized() {
            return true;
        }
        if attempt < retries {
            info!(attempt = attempt + 1, retries, "Waiting for clock synchronization");
            tokio::time::sleep(interval).await;
        }
    }
    clock.is_synchronized()
}

/// Re-read the store and publish its `[loki]` section
///
/// The file is already persisted, so the new value is not written back.
pub fn reload_loki(store: &ConfigStore, handle: &ConfigHandle) -> Result<(), EsptailError> {
    let config = store.load()?;
    handle.publish(config.loki)
}
