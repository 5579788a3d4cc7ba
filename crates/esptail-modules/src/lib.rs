//! esptail Modules
//!
//! Processing modules that attach labels to captured console lines.

pub mod level;

// Re-export the core Module trait for convenience
pub use esptail_core::Module;

pub use level::{extract_level, LevelLabelModule, LEVEL_LABEL};
