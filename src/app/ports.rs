//! Port traits: the hexagonal boundary between the pipeline and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PulseCounter / MetricsPublisher / ConnectionManager
//! ```
//!
//! Driven adapters (clock, WiFi, MQTT client) implement these traits.  The
//! pipeline consumes them via generics, so the measurement and reconnect
//! logic never touches ESP-IDF directly and runs unchanged against mocks.
//! The digital input itself is `embedded_hal::digital::InputPin`.

use core::fmt;

use crate::config::BrokerConfig;

use super::events::BrokerEvents;

// ───────────────────────────────────────────────────────────────
// Tick source (driven adapter: hardware timer → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond tick counter.
///
/// The value is free-running and wraps at `u32::MAX`.  Interval
/// consumers compare ticks as plain numbers: a tick numerically smaller
/// than its predecessor (a wrap, or a clock step backwards) yields a
/// non-positive interval, and that sample is discarded rather than
/// unwrapped.  Uptime accumulation and the debounce settle timer use
/// wrapping arithmetic.
pub trait TickSource {
    fn ticks_ms(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn ticks_ms(&self) -> u32 {
        (**self).ticks_ms()
    }
}

// ───────────────────────────────────────────────────────────────
// Network link (driven adapter: domain → WiFi)
// ───────────────────────────────────────────────────────────────

/// Network link that must be up before a broker handshake is attempted.
pub trait NetworkLink {
    type Error: fmt::Display;

    /// Associate with the configured network.  No-op when already up.
    fn connect(&mut self) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Broker client (driven adapter: domain → MQTT library)
// ───────────────────────────────────────────────────────────────

/// A single broker session as exposed by the external protocol library.
///
/// Lifecycle notifications (`connected`, `disconnected`, inbound message)
/// are not callbacks into the domain: the client pushes them onto the
/// [`BrokerEvents`] queue it was created with.
pub trait BrokerClient {
    type Error: fmt::Display;

    /// Start the protocol handshake.  Success is reported asynchronously
    /// by a `BrokerEvent::Connected` on the event queue.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Transmit one message (QoS 0, not retained).
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    fn disconnect(&mut self) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;
}

/// Builds a fresh [`BrokerClient`] for every connection attempt.
pub trait BrokerClientFactory {
    type Client: BrokerClient;

    fn create(&self, broker: &BrokerConfig, events: BrokerEvents) -> Self::Client;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driving side: publishers → connection manager)
// ───────────────────────────────────────────────────────────────

/// What the publishing tasks see of the connection manager.
///
/// `publish` is fire-and-forget: failures are absorbed and fed into the
/// reconnect loop, never returned to the caller.
pub trait BrokerPort {
    /// `true` only in the `Connected` state with `connected_ready` raised.
    fn is_connected(&self) -> bool;

    fn publish(&self, topic: &str, payload: &str);

    /// Successful (re)connections since boot; −1 before the first.
    fn reconnects(&self) -> i32;
}
