//! esptail CLI
//!
//! Task wiring shared by the `esptail` binary and the end-to-end tests.

pub mod agent;

pub use agent::{reload_loki, spawn, wait_for_clock, Agent, AgentReport};
