//! Telemetry publishers: periodic metrics and uptime.
//!
//! Both follow the same conditional-publish rule: check the broker once,
//! publish the whole batch if connected, otherwise log and drop it.

pub mod metrics;
pub mod topics;
pub mod uptime;

use core::fmt::{self, Write};

use log::warn;

/// Longest `Display` rendering of an `f64`: subnormals print in full
/// (`-0.000…5`, 327 bytes) and `f64::MAX` prints 309 digits.
pub(crate) const MAX_PAYLOAD_LEN: usize = 330;

/// Render a payload into a fixed-size buffer.
pub(crate) fn payload(args: fmt::Arguments<'_>) -> heapless::String<MAX_PAYLOAD_LEN> {
    let mut s = heapless::String::new();
    if s.write_fmt(args).is_err() {
        warn!("payload truncated to {} bytes: {:?}", s.len(), s.as_str());
    }
    s
}
