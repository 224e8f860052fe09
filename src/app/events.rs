//! Broker lifecycle events.
//!
//! The protocol client raises these from whatever context its network
//! activity runs in (on ESP-IDF, the MQTT client's own FreeRTOS task).
//! They are queued on an `embassy-sync` channel and applied by the
//! [`ConnectionManager`](crate::connection::ConnectionManager) on its own
//! task, so no readiness flag is ever mutated from a foreign context.
//!
//! ```text
//! ┌──────────────┐  BrokerEvent  ┌────────────────────┐
//! │ MQTT client  │──────────────▶│ ConnectionManager  │
//! │ (any task)   │               │ (executor task)    │
//! └──────────────┘               └────────────────────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Longest inbound topic kept for diagnostics; longer topics are truncated.
pub const MAX_TOPIC_LEN: usize = 64;

/// Channel depth for lifecycle events.
const EVENT_DEPTH: usize = 8;

/// Connection lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Handshake completed.
    Connected,
    /// Session dropped by the broker or the network.
    Disconnected,
    /// A transmission failed on the publishing side.
    TransportError,
    /// Inbound message.  Only observed for diagnostics.
    Message {
        topic: heapless::String<MAX_TOPIC_LEN>,
        len: usize,
    },
}

impl BrokerEvent {
    /// Build a `Message` event, truncating the topic if necessary.
    pub fn message(topic: &str, len: usize) -> Self {
        let mut t = heapless::String::new();
        for c in topic.chars() {
            if t.push(c).is_err() {
                break;
            }
        }
        Self::Message { topic: t, len }
    }
}

type EventChannel = Channel<CriticalSectionRawMutex, BrokerEvent, EVENT_DEPTH>;

/// Cloneable handle to the lifecycle event queue.
///
/// `Send + Sync`: a clone may be moved into a client callback that runs on
/// another thread.
#[derive(Clone)]
pub struct BrokerEvents {
    channel: Arc<EventChannel>,
}

impl Default for BrokerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerEvents {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Queue an event.  Drops it with a warning if the queue is full.
    pub fn emit(&self, event: BrokerEvent) {
        if let Err(e) = self.channel.try_send(event) {
            warn!("Broker event queue full, dropping {:?}", e);
        }
    }

    /// Wait for the next event.
    pub async fn next(&self) -> BrokerEvent {
        self.channel.receive().await
    }

    /// Take the next event without waiting.
    pub fn try_next(&self) -> Option<BrokerEvent> {
        self.channel.try_receive().ok()
    }

    /// Discard every queued event.  Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.try_next().is_some() {
            dropped += 1;
        }
        dropped
    }
}
