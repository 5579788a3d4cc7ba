use crate::error::Result;
use crate::log_entry::LogEntry;

/// Trait for processing modules in the esptail pipeline
///
/// Each module receives a freshly captured entry and may attach labels to it.
/// Modules are called sequentially, so later modules see labels added by
/// earlier ones.
pub trait Module: Send + Sync {
    /// Returns the name of the module (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Process a log entry and return the labeled result
    ///
    /// A module that finds nothing relevant returns the entry unchanged.
    fn process(&self, entry: LogEntry) -> Result<LogEntry>;

    /// Check if the module is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}
