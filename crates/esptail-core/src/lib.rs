//! esptail Core
//!
//! Core types, traits, and configuration for the esptail serial log shipper.

pub mod clock;
pub mod config;
pub mod error;
pub mod limits;
pub mod log_entry;
pub mod store;
pub mod traits;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use config::{Config, LokiConfig};
pub use error::{EsptailError, IngestionError, OutputError, Result};
pub use log_entry::{Label, Labels, Level, LogEntry, LogLine};
pub use store::{ConfigHandle, ConfigStore};
pub use traits::Module;
