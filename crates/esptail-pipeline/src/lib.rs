//! esptail Pipeline
//!
//! Routes captured entries through the labeling modules before they are queued.

pub mod pipeline;

pub use pipeline::Pipeline;
