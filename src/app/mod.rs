//! Application boundary: port traits and the events that cross them.
//!
//! The measurement pipeline and the connection manager talk to hardware
//! and to the broker library only through the traits in [`ports`],
//! keeping them fully testable without real peripherals.

pub mod events;
pub mod ports;
