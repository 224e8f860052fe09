//! Mock broker and I/O adapters for integration tests.
//!
//! `MockFactory` hands out `MockClient`s that share one `MockBroker`
//! script: tests flip its failure switches mid-run and assert on the
//! recorded traffic without a network.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin};
use pulsenode::app::events::{BrokerEvent, BrokerEvents};
use pulsenode::app::ports::{
    BrokerClient, BrokerClientFactory, BrokerPort, NetworkLink, TickSource,
};
use pulsenode::config::{BrokerConfig, SystemConfig};

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError(pub &'static str);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ── Shared broker script ──────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub fail_connect: Cell<bool>,
    pub fail_publish: Cell<bool>,
    /// Emit `Connected` as soon as the handshake starts.
    pub silent: Cell<bool>,
    pub created: Cell<u32>,
    pub disconnects: Cell<u32>,
    pub published: RefCell<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn values(&self, topic: &str) -> Vec<f64> {
        self.published
            .borrow()
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| p.parse().ok())
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.published.borrow().iter().filter(|(t, _)| t == topic).count()
    }
}

pub struct MockFactory(pub Rc<MockBroker>);

impl BrokerClientFactory for MockFactory {
    type Client = MockClient;

    fn create(&self, _broker: &BrokerConfig, events: BrokerEvents) -> MockClient {
        self.0.created.set(self.0.created.get() + 1);
        MockClient {
            broker: self.0.clone(),
            events,
            connected: false,
        }
    }
}

pub struct MockClient {
    broker: Rc<MockBroker>,
    events: BrokerEvents,
    connected: bool,
}

impl BrokerClient for MockClient {
    type Error = MockError;

    fn connect(&mut self) -> Result<(), MockError> {
        if self.broker.fail_connect.get() {
            return Err(MockError("connection refused"));
        }
        self.connected = true;
        if !self.broker.silent.get() {
            self.events.emit(BrokerEvent::Connected);
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MockError> {
        if self.broker.fail_publish.get() {
            return Err(MockError("broken pipe"));
        }
        self.broker.published.borrow_mut().push((
            topic.to_owned(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), MockError> {
        self.connected = false;
        self.broker.disconnects.set(self.broker.disconnects.get() + 1);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── Network link ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub fail: bool,
    pub attempts: Rc<Cell<u32>>,
    up: bool,
}

#[allow(dead_code)]
impl MockLink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl NetworkLink for MockLink {
    type Error = MockError;

    fn connect(&mut self) -> Result<(), MockError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.fail {
            return Err(MockError("no access point"));
        }
        self.up = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.up
    }
}

// ── Recording broker port ─────────────────────────────────────

/// Stand-in for the connection manager as seen by publishers.
pub struct RecordingPort {
    pub connected: Cell<bool>,
    pub reconnects: Cell<i32>,
    pub published: RefCell<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl RecordingPort {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Cell::new(connected),
            reconnects: Cell::new(0),
            published: RefCell::new(Vec::new()),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.borrow().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl BrokerPort for RecordingPort {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn publish(&self, topic: &str, payload: &str) {
        self.published
            .borrow_mut()
            .push((topic.to_owned(), payload.to_owned()));
    }

    fn reconnects(&self) -> i32 {
        self.reconnects.get()
    }
}

// ── Clock and sensor ──────────────────────────────────────────

/// Clock advanced by hand.
#[derive(Default)]
pub struct ManualClock(pub Cell<u32>);

#[allow(dead_code)]
impl ManualClock {
    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl TickSource for ManualClock {
    fn ticks_ms(&self) -> u32 {
        self.0.get()
    }
}

/// Square wave derived from a tick source: the level toggles every
/// `half_period_ms`, giving `1000 / half_period_ms` edges per second.
pub struct SquareWave<'a, T> {
    pub clock: &'a T,
    pub half_period_ms: u32,
}

impl<T> ErrorType for SquareWave<'_, T> {
    type Error = Infallible;
}

impl<T: TickSource> InputPin for SquareWave<'_, T> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok((self.clock.ticks_ms() / self.half_period_ms) % 2 == 0)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

// ── Config ────────────────────────────────────────────────────

/// Minimal valid config with overrides.
pub fn config(overrides: &[(&str, &str)]) -> SystemConfig {
    let mut settings: Vec<(&str, &str)> = vec![
        ("mqtt_broker", "broker.test"),
        ("root_topic", "r"),
        ("sensor_pin", "4"),
        ("wifi_ssid", "TestNet"),
    ];
    settings.extend_from_slice(overrides);
    SystemConfig::from_settings(|key| {
        settings
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_owned())
    })
    .expect("test config must be valid")
}
