//! PulseNode Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SystemClock      WifiAdapter      EspBrokerFactory            │
//! │  (TickSource)     (NetworkLink)    (BrokerClientFactory)       │
//! │  PinDriver (embedded_hal InputPin)                             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  PulseCounter · MetricsPublisher · UptimeReporter      │    │
//! │  │  ConnectionManager (reconnect loop)                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TaskSupervisor (LocalExecutor, cooperative shutdown)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result, anyhow};
use esp_idf_hal::gpio::{AnyIOPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info};

use pulsenode::adapters::device_id;
use pulsenode::adapters::mqtt::EspBrokerFactory;
use pulsenode::adapters::time::SystemClock;
use pulsenode::adapters::wifi::WifiAdapter;
use pulsenode::config::SystemConfig;
use pulsenode::connection::ConnectionManager;
use pulsenode::sensors::pulse::PulseCounter;
use pulsenode::sensors::stats::StatsRingBuffer;
use pulsenode::supervisor::TaskSupervisor;

// ── Settings ──────────────────────────────────────────────────
//
// Values are baked in at build time (see build.rs).  Unknown keys and
// unset variables both read as "not provided".

fn setting(key: &str) -> Option<String> {
    let raw = match key {
        "mqtt_broker" => option_env!("MQTT_BROKER"),
        "mqtt_port" => option_env!("MQTT_PORT"),
        "mqtt_user" => option_env!("MQTT_USER"),
        "mqtt_pwd" => option_env!("MQTT_PWD"),
        "root_topic" => option_env!("ROOT_TOPIC"),
        "counter_name" => option_env!("COUNTER_NAME"),
        "sensor_pin" => option_env!("SENSOR_PIN"),
        "pulses_per_unit" => option_env!("PULSES_PER_UNIT"),
        "report_interval" => option_env!("REPORT_INTERVAL"),
        "uptime_interval" => option_env!("UPTIME_INTERVAL"),
        "ring_buffer_length" => option_env!("RING_BUFFER_LENGTH"),
        "debounce_time_ms" => option_env!("DEBOUNCE_TIME_MS"),
        "total_value_multiplier" => option_env!("TOTAL_VALUE_MULTIPLIER"),
        "wifi_ssid" => option_env!("WIFI_SSID"),
        "wifi_password" => option_env!("WIFI_PASSWORD"),
        "CIRCUITPY_WIFI_SSID" => option_env!("CIRCUITPY_WIFI_SSID"),
        "CIRCUITPY_WIFI_PASSWORD" => option_env!("CIRCUITPY_WIFI_PASSWORD"),
        "reconnect_initial_ms" => option_env!("RECONNECT_INITIAL_MS"),
        "reconnect_max_ms" => option_env!("RECONNECT_MAX_MS"),
        "reconnect_max_attempts" => option_env!("RECONNECT_MAX_ATTEMPTS"),
        _ => None,
    };
    raw.map(str::to_owned)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PulseNode v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration (fatal if incomplete) ────────────────
    let config = SystemConfig::from_settings(setting).context("loading settings")?;
    info!(
        "Config: counter '{}' on GPIO{} → {} via {}",
        config.counter_name,
        config.sensor_pin,
        config.root_topic,
        config.broker.url()
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let driver = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    let mut wifi = WifiAdapter::new(driver);
    wifi.set_credentials(&config.network.ssid, &config.network.password)
        .context("WiFi credentials")?;

    // SAFETY: the sensor GPIO is configured only here and no other
    // driver in this firmware claims it.
    let sensor_pin = unsafe { AnyIOPin::new(config.sensor_pin) };
    let mut sensor = PinDriver::input(sensor_pin)?;
    sensor.set_pull(Pull::Up)?;

    // ── 4. Pipeline ───────────────────────────────────────────
    let clock = SystemClock::new();
    let client_id = device_id::client_id(&device_id::read_mac());
    info!("Device: MQTT client id {}", client_id);

    let connection =
        ConnectionManager::new(&config, EspBrokerFactory::new(client_id.as_str()), wifi);
    let intervals = StatsRingBuffer::new(config.ring_buffer_len)
        .ok_or_else(|| anyhow!("ring_buffer_length {} out of range", config.ring_buffer_len))?;
    let counter = PulseCounter::new(config.counter_name.clone(), intervals);
    let supervisor = TaskSupervisor::new(&config, &connection);

    // ── 5. Run until the broker gives up for good ─────────────
    if let Err(e) = futures_lite::future::block_on(supervisor.run(&counter, sensor, &clock)) {
        error!("Supervisor exited: {} — restarting", e);
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    info!("Supervisor stopped");
    Ok(())
}
