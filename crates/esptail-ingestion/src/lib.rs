//! esptail Ingestion
//!
//! Turns the raw byte stream of a serial console into labeled, timestamped
//! entries and hands them to the shipping side through a bounded queue.

pub mod filter;
pub mod framer;
pub mod queue;
pub mod source;
pub mod task;

pub use filter::{filter, FilterReport, FilterState};
pub use framer::{frame, Lines};
pub use queue::{entry_queue, PopError, PushOutcome, QueueConsumer, QueueProducer, QueueStats};
pub use source::reader::ReaderSource;
pub use source::uart::{simulated_uart, SimulatedUart, UartWriter};
pub use source::{SerialEvent, SerialSource};
pub use task::{IngestionStats, IngestionTask, LineProcessor};
