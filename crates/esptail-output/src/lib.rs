//! esptail Output
//!
//! Formats queued entries as Loki push requests and delivers them over HTTP.

pub mod payload;
pub mod shipper;
pub mod transport;

pub use payload::{Payload, PayloadBuilder};
pub use shipper::{ShipOutcome, ShipState, Shipper, ShipperStats};
pub use transport::{HttpTransport, PushResponse, PushTransport};
