//! System configuration parameters
//!
//! All tunable parameters for the PulseNode.  Populated once at startup
//! from a key/value settings source (build-time environment on target, a
//! map in tests), converted to typed fields and validated before any task
//! starts.  A missing required setting is fatal.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensors::stats::MAX_RING_CAPACITY;

/// Broker endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or IP address.
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerConfig {
    /// `mqtt://host:port` URL as expected by the ESP-IDF client.
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

/// WiFi station credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: String,
}

/// Broker reconnect backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry (milliseconds).
    pub initial_backoff_ms: u32,
    /// Upper bound on the retry delay (milliseconds).
    pub max_backoff_ms: u32,
    /// Consecutive failed attempts before giving up.  0 = never give up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 60_000,
            max_attempts: 0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Broker ---
    pub broker: BrokerConfig,
    /// Prefix for every published topic (e.g. `home/water`).
    pub root_topic: String,

    // --- Sensor ---
    /// Human-readable counter name used in logs.
    pub counter_name: String,
    /// GPIO number of the pulse input.
    pub sensor_pin: i32,
    /// Pulses (edges) per measured unit.
    pub pulses_per_unit: f64,
    /// Debounce stabilisation interval (milliseconds).
    pub debounce_ms: u32,
    /// Number of inter-edge intervals kept for the deviation statistic.
    pub ring_buffer_len: usize,
    /// Scale applied to the published cumulative total.
    pub total_value_multiplier: f64,

    // --- Timing ---
    /// Metrics report interval (seconds).
    pub report_interval_secs: u32,
    /// Uptime report interval (seconds).
    pub uptime_interval_secs: u32,

    // --- Connectivity ---
    pub network: NetworkConfig,
    pub reconnect: ReconnectConfig,
}

impl SystemConfig {
    /// Build the configuration from a settings lookup.
    ///
    /// `lookup` maps a setting key to its raw string value.  Optional
    /// settings fall back to defaults; required ones yield
    /// [`ConfigError::Missing`].  The result is validated before return.
    pub fn from_settings<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings(lookup);
        let defaults = ReconnectConfig::default();

        let config = Self {
            broker: BrokerConfig {
                host: settings.required("mqtt_broker")?,
                port: settings.parse_or("mqtt_port", 1883)?,
                username: settings.optional("mqtt_user"),
                password: settings.optional("mqtt_pwd"),
            },
            root_topic: settings.required("root_topic")?,
            counter_name: settings
                .optional("counter_name")
                .unwrap_or_else(|| "Counter".into()),
            sensor_pin: settings.parse_required("sensor_pin")?,
            pulses_per_unit: settings.parse_or("pulses_per_unit", 1.0)?,
            debounce_ms: settings.parse_or("debounce_time_ms", 5)?,
            ring_buffer_len: settings.parse_or("ring_buffer_length", 32)?,
            total_value_multiplier: settings.parse_or("total_value_multiplier", 1.0)?,
            report_interval_secs: settings.parse_or("report_interval", 60)?,
            uptime_interval_secs: settings.parse_or("uptime_interval", 10)?,
            network: NetworkConfig {
                ssid: settings
                    .optional("wifi_ssid")
                    .or_else(|| settings.optional("CIRCUITPY_WIFI_SSID"))
                    .ok_or(ConfigError::Missing("wifi_ssid"))?,
                password: settings
                    .optional("wifi_password")
                    .or_else(|| settings.optional("CIRCUITPY_WIFI_PASSWORD"))
                    .unwrap_or_default(),
            },
            reconnect: ReconnectConfig {
                initial_backoff_ms: settings
                    .parse_or("reconnect_initial_ms", defaults.initial_backoff_ms)?,
                max_backoff_ms: settings.parse_or("reconnect_max_ms", defaults.max_backoff_ms)?,
                max_attempts: settings.parse_or("reconnect_max_attempts", defaults.max_attempts)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_broker must not be empty"));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be non-zero"));
        }
        if self.root_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("root_topic must not be empty"));
        }
        if !(self.pulses_per_unit.is_finite() && self.pulses_per_unit > 0.0) {
            return Err(ConfigError::ValidationFailed("pulses_per_unit must be > 0"));
        }
        if !self.total_value_multiplier.is_finite() {
            return Err(ConfigError::ValidationFailed(
                "total_value_multiplier must be finite",
            ));
        }
        if self.ring_buffer_len == 0 || self.ring_buffer_len > MAX_RING_CAPACITY {
            return Err(ConfigError::ValidationFailed(
                "ring_buffer_length must be 1..=MAX_RING_CAPACITY",
            ));
        }
        if self.report_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("report_interval must be > 0"));
        }
        if self.uptime_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("uptime_interval must be > 0"));
        }
        if self.reconnect.initial_backoff_ms > self.reconnect.max_backoff_ms {
            return Err(ConfigError::ValidationFailed(
                "reconnect_initial_ms must not exceed reconnect_max_ms",
            ));
        }
        Ok(())
    }
}

/// Typed accessors over a raw key/value lookup.
struct Settings<F>(F);

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_required<T: FromStr>(&self, key: &'static str) -> Result<T, ConfigError> {
        self.required(key)?
            .parse()
            .map_err(|_| ConfigError::Invalid(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        }
    }
}
