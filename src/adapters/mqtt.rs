//! MQTT broker adapter.
//!
//! Implements [`BrokerClientFactory`] / [`BrokerClient`] on top of the
//! ESP-IDF MQTT client.  The ESP-IDF client runs its own FreeRTOS task and
//! invokes our callback there; the callback only translates the payload
//! into a [`BrokerEvent`] and pushes it onto the queue, where the
//! connection task picks it up.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: an in-process simulation that reports
//!   `Connected` as soon as the handshake starts.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::app::events::{BrokerEvent, BrokerEvents};
use crate::app::ports::{BrokerClient, BrokerClientFactory};
use crate::config::BrokerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttError {
    NotConnected,
    #[cfg(target_os = "espidf")]
    Esp(esp_idf_svc::sys::EspError),
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "MQTT session not established"),
            #[cfg(target_os = "espidf")]
            Self::Esp(e) => write!(f, "ESP-IDF MQTT error: {e}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Factory
// ───────────────────────────────────────────────────────────────

/// Builds one [`EspBrokerClient`] per connection attempt.
pub struct EspBrokerFactory {
    client_id: String,
}

impl EspBrokerFactory {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl BrokerClientFactory for EspBrokerFactory {
    type Client = EspBrokerClient;

    fn create(&self, broker: &BrokerConfig, events: BrokerEvents) -> EspBrokerClient {
        EspBrokerClient {
            url: broker.url(),
            client_id: self.client_id.clone(),
            username: broker.username.clone(),
            password: broker.password.clone(),
            events,
            connected: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            inner: None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Client
// ───────────────────────────────────────────────────────────────

pub struct EspBrokerClient {
    url: String,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
    events: BrokerEvents,
    /// Written from the MQTT task callback, read from ours.
    connected: Arc<AtomicBool>,
    #[cfg(target_os = "espidf")]
    inner: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
}

impl EspBrokerClient {
    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), MqttError> {
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            ..Default::default()
        };

        let events = self.events.clone();
        let connected = self.connected.clone();
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    connected.store(true, Ordering::Release);
                    events.emit(BrokerEvent::Connected);
                }
                EventPayload::Disconnected => {
                    connected.store(false, Ordering::Release);
                    events.emit(BrokerEvent::Disconnected);
                }
                EventPayload::Received { topic, data, .. } => {
                    events.emit(BrokerEvent::message(topic.unwrap_or(""), data.len()));
                }
                EventPayload::Error(e) => {
                    log::warn!("MQTT(espidf): client error {:?}", e);
                }
                _ => {}
            }
        })
        .map_err(MqttError::Esp)?;

        self.inner = Some(client);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        use esp_idf_svc::mqtt::client::QoS;

        let client = self.inner.as_mut().ok_or(MqttError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(MqttError::Esp)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), MqttError> {
        info!(
            "MQTT(sim): session '{}' to {} (user={:?}, password set={})",
            self.client_id,
            self.url,
            self.username,
            self.password.is_some()
        );
        self.connected.store(true, Ordering::Release);
        self.events.emit(BrokerEvent::Connected);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(MqttError::NotConnected);
        }
        debug!("MQTT(sim): {} <- {} bytes", topic, payload.len());
        Ok(())
    }
}

impl BrokerClient for EspBrokerClient {
    type Error = MqttError;

    fn connect(&mut self) -> Result<(), MqttError> {
        info!("MQTT: connecting to {}", self.url);
        self.platform_connect()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        self.platform_publish(topic, payload)
    }

    /// Dropping the ESP-IDF client stops its task and closes the socket.
    fn disconnect(&mut self) -> Result<(), MqttError> {
        #[cfg(target_os = "espidf")]
        drop(self.inner.take());
        self.connected.store(false, Ordering::Release);
        debug!("MQTT: session to {} closed", self.url);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
