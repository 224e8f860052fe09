//! Periodic rate metrics.
//!
//! Each tick snapshots the pulse counter, derives rates from the pulse
//! delta and the elapsed ticks since the previous tick, and publishes the
//! batch if and only if the broker is connected at that moment.
//! Telemetry is lossy by design: an unsent batch is gone.
//!
//! | Topic         | Value                                   |
//! |---------------|-----------------------------------------|
//! | `/pulses`     | pulses per second                       |
//! | `/value`      | units per minute                        |
//! | `/total`      | cumulative units × total multiplier     |
//! | `/dev`        | std deviation of inter-edge ticks       |
//! | `/reconnects` | broker reconnect counter                |

use core::time::Duration;

use log::{debug, info};

use crate::app::ports::{BrokerPort, TickSource};
use crate::config::SystemConfig;
use crate::sensors::pulse::PulseCounter;
use crate::supervisor::LoopState;

use super::payload;
use super::topics::Topics;

/// One tick's worth of derived metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsReport {
    /// Edges counted since the previous tick.
    pub pulses: u32,
    pub pulses_per_sec: f64,
    pub pulses_per_min: f64,
    pub units_per_min: f64,
    /// Cumulative units, multiplier applied.
    pub total_units: f64,
    pub std_dev: f32,
    pub reconnects: i32,
}

pub struct MetricsPublisher<'a> {
    counter: &'a PulseCounter,
    topics: &'a Topics,
    pulses_per_unit: f64,
    total_multiplier: f64,
    prev_count: u32,
    prev_ms: u32,
    total_units: f64,
    last_latency_ms: u32,
}

impl<'a> MetricsPublisher<'a> {
    /// Create a publisher whose first interval starts at `now_ms`.
    pub fn new(
        counter: &'a PulseCounter,
        topics: &'a Topics,
        config: &SystemConfig,
        now_ms: u32,
    ) -> Self {
        Self {
            counter,
            topics,
            pulses_per_unit: config.pulses_per_unit,
            total_multiplier: config.total_value_multiplier,
            prev_count: counter.total_count(),
            prev_ms: now_ms,
            total_units: 0.0,
            last_latency_ms: 0,
        }
    }

    /// Snapshot the counter and derive this interval's metrics.
    ///
    /// The snapshot always advances.  When the elapsed time is zero or
    /// negative (clock anomaly, tick wrap) rates are reported as zero and
    /// the interval's pulses do not contribute to the total.
    pub fn sample(&mut self, now_ms: u32, reconnects: i32) -> MetricsReport {
        let count = self.counter.total_count();
        let pulses = count.wrapping_sub(self.prev_count);
        self.prev_count = count;

        let elapsed_ms = i64::from(now_ms) - i64::from(self.prev_ms);
        self.prev_ms = now_ms;

        let mut report = MetricsReport {
            pulses,
            pulses_per_sec: 0.0,
            pulses_per_min: 0.0,
            units_per_min: 0.0,
            total_units: 0.0,
            std_dev: self.counter.interval_std_dev(),
            reconnects,
        };

        if elapsed_ms > 0 {
            let elapsed_secs = elapsed_ms as f64 / 1000.0;
            report.pulses_per_sec = f64::from(pulses) / elapsed_secs;
            report.pulses_per_min = report.pulses_per_sec * 60.0;
            report.units_per_min = report.pulses_per_min / self.pulses_per_unit;
            self.total_units += f64::from(pulses) / self.pulses_per_unit;
        } else {
            debug!(
                "{}: non-positive interval ({} ms), skipping rates",
                self.counter.name(),
                elapsed_ms
            );
        }

        report.total_units = self.total_units * self.total_multiplier;
        report
    }

    /// Sample, publish and record the processing latency.
    pub fn report<T: TickSource>(&mut self, broker: &dyn BrokerPort, clock: &T) -> MetricsReport {
        let started_ms = clock.ticks_ms();
        let report = self.sample(started_ms, broker.reconnects());

        debug!(
            "{}: total={} pulses={} ppm={:.2} units/min={:.3} total={:.3} dev={:.2} latency={}ms",
            self.counter.name(),
            self.counter.total_count(),
            report.pulses,
            report.pulses_per_min,
            report.units_per_min,
            report.total_units,
            report.std_dev,
            self.last_latency_ms,
        );

        self.publish(&report, broker);
        self.last_latency_ms = clock.ticks_ms().wrapping_sub(started_ms);
        report
    }

    /// Publish a batch.  Returns `false` if it was skipped.
    fn publish(&self, report: &MetricsReport, broker: &dyn BrokerPort) -> bool {
        if !broker.is_connected() {
            info!(
                "Unable to send {} values: broker not connected",
                self.counter.name()
            );
            return false;
        }

        let t = self.topics;
        broker.publish(&t.pulses, &payload(format_args!("{}", report.pulses_per_sec)));
        broker.publish(&t.value, &payload(format_args!("{}", report.units_per_min)));
        broker.publish(&t.total, &payload(format_args!("{}", report.total_units)));
        broker.publish(&t.dev, &payload(format_args!("{}", report.std_dev)));
        broker.publish(&t.reconnects, &payload(format_args!("{}", report.reconnects)));
        debug!("{} values sent", self.counter.name());
        true
    }

    /// Wall time spent in the last [`report`](Self::report), in ms.
    pub fn last_latency_ms(&self) -> u32 {
        self.last_latency_ms
    }

    /// Periodic metrics task.  Sleeps `interval` between reports.
    pub async fn run<T: TickSource>(mut self, state: &LoopState<'_>, clock: &T, interval: Duration) {
        info!("Entering value loop for {}", self.counter.name());
        while state.is_running() {
            async_io_mini::Timer::after(interval).await;
            if !state.is_running() {
                break;
            }
            self.report(state.broker(), clock);
        }
        info!("Exiting value loop for {}", self.counter.name());
    }
}
