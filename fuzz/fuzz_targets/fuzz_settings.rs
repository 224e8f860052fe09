//! Fuzz target: `SystemConfig::from_settings`
//!
//! Interprets the input as `key=value` lines and feeds them to the settings
//! loader.  Invariants checked:
//! - No panics under any byte sequence
//! - Any configuration that loads also passes `validate()`
//! - Loaded values stay within the ranges the tasks rely on
//!
//! cargo fuzz run fuzz_settings

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use pulsenode::config::SystemConfig;
use pulsenode::sensors::stats::MAX_RING_CAPACITY;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut settings: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        if let Some((k, v)) = line.split_once('=') {
            settings.insert(k.trim(), v.trim());
        }
    }

    let Ok(config) = SystemConfig::from_settings(|k| settings.get(k).map(|v| (*v).to_string()))
    else {
        return;
    };

    assert!(config.validate().is_ok(), "loaded config failed validation");
    assert!(config.pulses_per_unit > 0.0 && config.pulses_per_unit.is_finite());
    assert!(config.ring_buffer_len >= 1 && config.ring_buffer_len <= MAX_RING_CAPACITY);
    assert!(config.report_interval_secs > 0);
    assert!(config.uptime_interval_secs > 0);
    assert!(!config.root_topic.is_empty());
});
