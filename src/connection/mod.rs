//! Self-healing broker connection.
//!
//! ```text
//!            connect()              BrokerEvent::Connected
//! Disconnected ─────────▶ Connecting ─────────────────────▶ Connected
//!      ▲                      │                                 │
//!      │   handshake / link   │     Disconnected event or       │
//!      └──────── failed ──────┘     publish transport error ────┘
//! ```
//!
//! Two level-triggered flags, `connected_ready` and `disconnected_ready`,
//! are the only coordination between the connection task and the
//! publishers.  They are never both raised; both are low while
//! `Connecting`.
//!
//! Lifecycle notifications from the protocol client arrive on a
//! [`BrokerEvents`] queue and are applied here, on the connection task,
//! by [`ConnectionManager::handle_event`].  The reconnect loop in
//! [`ConnectionManager::run`] backs off exponentially between attempts
//! and can be given a retry ceiling.

pub mod backoff;

use core::cell::{Cell, RefCell};

use log::{debug, error, info, warn};

use crate::app::events::{BrokerEvent, BrokerEvents};
use crate::app::ports::{BrokerClient, BrokerClientFactory, BrokerPort, NetworkLink};
use crate::config::{BrokerConfig, ReconnectConfig, SystemConfig};
use crate::error::CommsError;
use crate::supervisor::LoopState;

use backoff::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outcome of a single [`ConnectionManager::connect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAttempt {
    /// Already `Connected`; nothing was touched.
    AlreadyConnected,
    /// Handshake started; completion arrives as an event.
    Pending,
    /// Attempt failed; `disconnected_ready` is raised.
    Failed(CommsError),
}

pub struct ConnectionManager<F: BrokerClientFactory, L: NetworkLink> {
    broker: BrokerConfig,
    policy: ReconnectConfig,
    factory: F,
    link: RefCell<L>,
    client: RefCell<Option<F::Client>>,
    state: Cell<ConnectionState>,
    connected_ready: Cell<bool>,
    disconnected_ready: Cell<bool>,
    /// Set once the current attempt reaches `Connected`.
    session_up: Cell<bool>,
    reconnects: Cell<i32>,
    events: BrokerEvents,
}

impl<F: BrokerClientFactory, L: NetworkLink> ConnectionManager<F, L> {
    pub fn new(config: &SystemConfig, factory: F, link: L) -> Self {
        Self {
            broker: config.broker.clone(),
            policy: config.reconnect,
            factory,
            link: RefCell::new(link),
            client: RefCell::new(None),
            state: Cell::new(ConnectionState::Disconnected),
            connected_ready: Cell::new(false),
            disconnected_ready: Cell::new(false),
            session_up: Cell::new(false),
            reconnects: Cell::new(-1),
            events: BrokerEvents::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn connected_ready(&self) -> bool {
        self.connected_ready.get()
    }

    pub fn disconnected_ready(&self) -> bool {
        self.disconnected_ready.get()
    }

    /// The queue clients report lifecycle events on.
    pub fn events(&self) -> &BrokerEvents {
        &self.events
    }

    /// Make one connection attempt.
    ///
    /// Idempotent while `Connected`.  Otherwise discards stale events
    /// from the previous client, builds a new client, brings the network
    /// link up and starts the handshake.  Never waits for the handshake.
    pub fn connect(&self) -> ConnectAttempt {
        if self.state.get() == ConnectionState::Connected {
            debug!("Broker: already connected");
            return ConnectAttempt::AlreadyConnected;
        }

        info!("Broker: connecting to {}:{}", self.broker.host, self.broker.port);
        self.state.set(ConnectionState::Connecting);
        self.connected_ready.set(false);
        self.disconnected_ready.set(false);

        let stale = self.events.clear();
        if stale > 0 {
            debug!("Broker: dropped {} stale events", stale);
        }

        let mut client = self.factory.create(&self.broker, self.events.clone());

        if let Err(e) = self.link.borrow_mut().connect() {
            warn!("Broker: network link unavailable — {}", e);
            self.mark_disconnected();
            return ConnectAttempt::Failed(CommsError::LinkConnectFailed);
        }

        let result = client.connect();
        *self.client.borrow_mut() = Some(client);

        match result {
            Ok(()) => ConnectAttempt::Pending,
            Err(e) => {
                warn!("Failed to connect to broker: {}", e);
                self.mark_disconnected();
                ConnectAttempt::Failed(CommsError::HandshakeFailed)
            }
        }
    }

    /// Apply one lifecycle event to the state machine.
    pub fn handle_event(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => {
                if self.state.get() != ConnectionState::Connecting {
                    debug!("Broker: ignoring connected event in {:?}", self.state.get());
                    return;
                }
                self.reconnects.set(self.reconnects.get() + 1);
                self.state.set(ConnectionState::Connected);
                self.session_up.set(true);
                self.disconnected_ready.set(false);
                self.connected_ready.set(true);
                info!("Connected to broker (reconnects={})", self.reconnects.get());
            }
            BrokerEvent::Disconnected => {
                info!("Disconnected from broker");
                self.mark_disconnected();
            }
            BrokerEvent::TransportError => self.mark_disconnected(),
            BrokerEvent::Message { topic, len } => {
                info!("New message on topic {} ({} bytes)", topic, len);
            }
        }
    }

    /// Suspend until `disconnected_ready` is raised, applying events as
    /// they arrive.  Returns at once if it is already raised.
    pub async fn wait_for_disconnect(&self) {
        while !self.disconnected_ready.get() {
            let event = self.events.next().await;
            self.handle_event(event);
        }
    }

    /// Best-effort teardown.  Errors are logged; the client is always dropped.
    pub fn disconnect(&self) {
        let client = self.client.borrow_mut().take();
        if let Some(mut client) = client {
            if let Err(e) = client.disconnect() {
                warn!("Failed to disconnect broker: {}", e);
            }
        }
        if self.state.get() != ConnectionState::Disconnected {
            self.state.set(ConnectionState::Disconnected);
            self.connected_ready.set(false);
        }
    }

    /// Reconnect loop.
    ///
    /// Attempt, wait for the session to end, tear down, back off, repeat.
    /// Returns `Err(RetriesExhausted)` when the configured ceiling of
    /// consecutive failed attempts is reached, `Ok` when the running flag
    /// clears.
    pub async fn run(&self, state: &LoopState<'_>) -> Result<(), CommsError> {
        let mut backoff = Backoff::new(&self.policy);

        while state.is_running() {
            self.session_up.set(false);
            if let ConnectAttempt::Failed(e) = self.connect() {
                debug!("Broker: attempt failed ({})", e);
            }

            self.wait_for_disconnect().await;
            if !state.is_running() {
                break;
            }

            warn!("Broker disconnected, reconnecting...");
            self.disconnect();

            if self.session_up.get() {
                backoff.reset();
            }
            let Some(delay) = backoff.next_delay() else {
                error!("Broker: giving up after {} consecutive failures", backoff.failures());
                return Err(CommsError::RetriesExhausted);
            };
            info!("Broker: retry {} in {:?}", backoff.failures(), delay);
            async_io_mini::Timer::after(delay).await;
        }

        self.disconnect();
        Ok(())
    }

    fn mark_disconnected(&self) {
        self.state.set(ConnectionState::Disconnected);
        self.connected_ready.set(false);
        self.disconnected_ready.set(true);
    }
}

impl<F: BrokerClientFactory, L: NetworkLink> BrokerPort for ConnectionManager<F, L> {
    fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected && self.connected_ready.get()
    }

    /// Fire-and-forget publish.
    ///
    /// A transport error raises `disconnected_ready` and wakes the
    /// reconnect loop; it is never returned to the caller.
    fn publish(&self, topic: &str, payload: &str) {
        if self.disconnected_ready.get() {
            info!("Failed to send message to {}: broker is not connected", topic);
            return;
        }

        let result = {
            let mut guard = self.client.borrow_mut();
            match guard.as_mut() {
                Some(client) if self.connected_ready.get() => client.publish(topic, payload.as_bytes()),
                _ => {
                    info!("Failed to send message to {}: broker is not connected", topic);
                    return;
                }
            }
        };

        if let Err(e) = result {
            warn!("Failed to send message to {}: {}", topic, e);
            self.mark_disconnected();
            self.events.emit(BrokerEvent::TransportError);
        }
    }

    fn reconnects(&self) -> i32 {
        self.reconnects.get()
    }
}
