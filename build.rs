fn main() {
    // Settings are baked in through `option_env!`; rebuild when they change.
    for key in [
        "MQTT_BROKER",
        "MQTT_PORT",
        "MQTT_USER",
        "MQTT_PWD",
        "ROOT_TOPIC",
        "COUNTER_NAME",
        "SENSOR_PIN",
        "PULSES_PER_UNIT",
        "REPORT_INTERVAL",
        "UPTIME_INTERVAL",
        "RING_BUFFER_LENGTH",
        "DEBOUNCE_TIME_MS",
        "TOTAL_VALUE_MULTIPLIER",
        "WIFI_SSID",
        "WIFI_PASSWORD",
        "CIRCUITPY_WIFI_SSID",
        "CIRCUITPY_WIFI_PASSWORD",
        "RECONNECT_INITIAL_MS",
        "RECONNECT_MAX_MS",
        "RECONNECT_MAX_ATTEMPTS",
    ] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
