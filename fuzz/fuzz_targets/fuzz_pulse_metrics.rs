//! Fuzz target: `PulseCounter` → `MetricsPublisher::sample`
//!
//! Drives the counter with arbitrary edge timestamps interleaved with
//! metrics samples at arbitrary ticks (including backwards jumps).
//! Invariants checked:
//! - No panics under any byte sequence
//! - The counter counts every edge
//! - Rates are never negative and are zero when no time elapsed
//! - The cumulative total never decreases
//! - The interval deviation is finite and non-negative
//!
//! cargo fuzz run fuzz_pulse_metrics

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use pulsenode::config::SystemConfig;
use pulsenode::sensors::pulse::PulseCounter;
use pulsenode::sensors::stats::StatsRingBuffer;
use pulsenode::telemetry::metrics::MetricsPublisher;
use pulsenode::telemetry::topics::Topics;

fn config(ring_len: usize) -> SystemConfig {
    let ring = ring_len.to_string();
    let m: HashMap<&str, &str> = [
        ("mqtt_broker", "fuzz.local"),
        ("root_topic", "fuzz"),
        ("sensor_pin", "4"),
        ("wifi_ssid", "fuzz"),
        ("pulses_per_unit", "7.5"),
        ("ring_buffer_length", ring.as_str()),
    ]
    .into_iter()
    .collect();
    SystemConfig::from_settings(|k| m.get(k).map(|v| (*v).to_string())).unwrap()
}

fuzz_target!(|data: &[u8]| {
    let Some((&ring_byte, ops)) = data.split_first() else {
        return;
    };

    let cfg = config(usize::from(ring_byte % 64) + 1);
    let counter = PulseCounter::new("fuzz", StatsRingBuffer::new(cfg.ring_buffer_len).unwrap());
    let topics = Topics::new(&cfg.root_topic);
    let mut metrics = MetricsPublisher::new(&counter, &topics, &cfg, 0);

    let mut edges = 0u32;
    let mut last_sample_ms = 0u32;
    let mut last_total = 0.0f64;

    // Each op is 5 bytes: tag + little-endian tick.
    for chunk in ops.chunks_exact(5) {
        let now_ms = u32::from_le_bytes(chunk[1..5].try_into().unwrap());

        if chunk[0] & 1 == 0 {
            counter.record_edge(now_ms);
            edges = edges.wrapping_add(1);
            assert_eq!(counter.total_count(), edges);
            continue;
        }

        let report = metrics.sample(now_ms, 0);
        assert!(report.pulses_per_sec >= 0.0);
        assert!(report.units_per_min >= 0.0);
        if i64::from(now_ms) <= i64::from(last_sample_ms) {
            assert_eq!(report.pulses_per_sec, 0.0);
        }
        assert!(report.total_units >= last_total);
        assert!(report.std_dev.is_finite() && report.std_dev >= 0.0);

        last_sample_ms = now_ms;
        last_total = report.total_units;
    }
});
