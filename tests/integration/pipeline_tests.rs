//! Publishers against a recording broker, and the full supervisor run.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use futures_lite::future;
use pulsenode::adapters::time::SystemClock;
use pulsenode::app::ports::TickSource;
use pulsenode::connection::ConnectionManager;
use pulsenode::sensors::pulse::PulseCounter;
use pulsenode::sensors::stats::StatsRingBuffer;
use pulsenode::supervisor::TaskSupervisor;
use pulsenode::telemetry::metrics::MetricsPublisher;
use pulsenode::telemetry::topics::Topics;
use pulsenode::telemetry::uptime::UptimeReporter;

use crate::mock_broker::{
    ManualClock, MockBroker, MockFactory, MockLink, RecordingPort, SquareWave, config,
};

fn counter() -> PulseCounter {
    PulseCounter::new("water", StatsRingBuffer::new(8).unwrap())
}

/// Run `f` on its own thread and fail if it has not returned by `limit`.
fn within<T, F>(limit: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(limit) {
        Ok(v) => v,
        Err(RecvTimeoutError::Timeout) => panic!("still running after {limit:?}"),
        Err(RecvTimeoutError::Disconnected) => match worker.join() {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(()) => unreachable!("worker exited without a result"),
        },
    }
}

#[test]
fn metrics_batch_goes_out_in_topic_order() {
    let cfg = config(&[("pulses_per_unit", "2")]);
    let topics = Topics::new(&cfg.root_topic);
    let counter = counter();
    let clock = ManualClock::default();
    let port = RecordingPort::new(true);
    port.reconnects.set(3);
    let mut metrics = MetricsPublisher::new(&counter, &topics, &cfg, clock.ticks_ms());

    for _ in 0..10 {
        clock.advance(100);
        counter.record_edge(clock.ticks_ms());
    }
    let report = metrics.report(&port, &clock);

    assert_eq!(
        port.topics(),
        ["r/pulses", "r/value", "r/total", "r/dev", "r/reconnects"]
    );
    assert_eq!(report.reconnects, 3);
    assert!((report.units_per_min - 300.0).abs() < 0.1);
    assert!((report.total_units - 5.0).abs() < 1e-6);
    assert_eq!(metrics.last_latency_ms(), 0);

    let published = port.published.borrow();
    assert_eq!(published[0].1.parse::<f32>().unwrap(), 10.0);
    assert_eq!(published[4].1, "3");
}

#[test]
fn metrics_skip_whole_batch_when_disconnected() {
    let cfg = config(&[]);
    let topics = Topics::new(&cfg.root_topic);
    let counter = counter();
    let clock = ManualClock::default();
    let port = RecordingPort::new(false);
    let mut metrics = MetricsPublisher::new(&counter, &topics, &cfg, 0);

    counter.record_edge(10);
    clock.advance(1_000);
    let report = metrics.report(&port, &clock);

    assert!(port.published.borrow().is_empty());
    // The interval is still consumed.
    assert_eq!(report.pulses, 1);
    clock.advance(1_000);
    assert_eq!(metrics.report(&port, &clock).pulses, 0);
}

#[test]
fn two_ten_edge_intervals_publish_ten_units() {
    let cfg = config(&[("pulses_per_unit", "2")]);
    let topics = Topics::new(&cfg.root_topic);
    let counter = counter();
    let clock = ManualClock::default();
    let port = RecordingPort::new(true);
    let mut metrics = MetricsPublisher::new(&counter, &topics, &cfg, clock.ticks_ms());

    for _ in 0..2 {
        for _ in 0..10 {
            clock.advance(100);
            counter.record_edge(clock.ticks_ms());
        }
        metrics.report(&port, &clock);
    }

    let totals: Vec<String> = port
        .published
        .borrow()
        .iter()
        .filter(|(t, _)| t == "r/total")
        .map(|(_, v)| v.clone())
        .collect();
    assert_eq!(totals, ["5", "10"]);
}

#[test]
fn tiny_divisor_publishes_full_magnitude() {
    let cfg = config(&[("pulses_per_unit", "1e-30")]);
    let topics = Topics::new(&cfg.root_topic);
    let counter = counter();
    let clock = ManualClock::default();
    let port = RecordingPort::new(true);
    let mut metrics = MetricsPublisher::new(&counter, &topics, &cfg, 0);

    for _ in 0..10 {
        clock.advance(100);
        counter.record_edge(clock.ticks_ms());
    }
    let report = metrics.report(&port, &clock);

    let published = port.published.borrow();
    let value: f64 = published[1].1.parse().unwrap();
    assert_eq!(published[1].0, "r/value");
    assert_eq!(value, report.units_per_min);
    assert!(value > 1e32, "units/min {value}");
}

#[test]
fn uptime_publishes_seconds_and_text() {
    let topics = Topics::new("r");
    let port = RecordingPort::new(true);
    let mut uptime = UptimeReporter::new(&topics, 0);

    assert!(uptime.report(3_725_000, &port));
    let published = port.published.borrow();
    assert_eq!(published[0], ("r/uptime/seconds".into(), "3725".into()));
    assert_eq!(published[1], ("r/uptime/str".into(), "1:02:05".into()));
}

#[test]
fn uptime_keeps_counting_while_disconnected() {
    let topics = Topics::new("r");
    let port = RecordingPort::new(false);
    let mut uptime = UptimeReporter::new(&topics, 0);

    assert!(!uptime.report(10_000, &port));
    assert!(port.published.borrow().is_empty());
    port.connected.set(true);
    assert!(uptime.report(20_000, &port));
    assert_eq!(port.published.borrow()[0].1, "20");
}

struct RunSummary {
    ok: bool,
    created: u32,
    disconnects: u32,
    values: Vec<f64>,
    totals: Vec<f64>,
    reconnects: Vec<f64>,
    uptime_reports: usize,
    edges: u32,
}

/// Full pipeline against a 10 edges/s square wave, stopped from outside
/// the supervisor after `run_for`.
fn run_square_wave(run_for: Duration) -> RunSummary {
    let broker = MockBroker::new();
    let cfg = config(&[
        ("pulses_per_unit", "2"),
        ("report_interval", "1"),
        ("uptime_interval", "1"),
        ("debounce_time_ms", "5"),
    ]);
    let mgr = ConnectionManager::new(&cfg, MockFactory(broker.clone()), MockLink::default());
    let clock = SystemClock::new();
    let pin = SquareWave {
        clock: &clock,
        half_period_ms: 100,
    };
    let counter = PulseCounter::new(
        cfg.counter_name.clone(),
        StatsRingBuffer::new(cfg.ring_buffer_len).unwrap(),
    );
    let supervisor = TaskSupervisor::new(&cfg, &mgr);

    let (result, ()) = future::block_on(future::zip(
        supervisor.run(&counter, pin, &clock),
        async {
            async_io_mini::Timer::after(run_for).await;
            supervisor.stop();
        },
    ));

    RunSummary {
        ok: result.is_ok(),
        created: broker.created.get(),
        disconnects: broker.disconnects.get(),
        values: broker.values("r/value"),
        totals: broker.values("r/total"),
        reconnects: broker.values("r/reconnects"),
        uptime_reports: broker.count("r/uptime/seconds"),
        edges: counter.total_count(),
    }
}

#[test]
fn supervisor_returns_soon_after_external_stop() {
    let started = std::time::Instant::now();
    let run = within(Duration::from_secs(5), || run_square_wave(Duration::from_millis(300)));
    assert!(run.ok);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(run.disconnects, 1);
    assert!(run.edges >= 1);
}

#[test]
fn supervisor_counts_square_wave_end_to_end() {
    let run = within(Duration::from_secs(15), || run_square_wave(Duration::from_millis(2_500)));

    assert!(run.ok);
    assert_eq!(run.created, 1);
    assert_eq!(run.disconnects, 1);

    assert_eq!(run.values.len(), 2, "one batch per report interval");
    for v in &run.values {
        assert!((240.0..=360.0).contains(v), "units/min {v}");
    }
    assert!((8.0..=12.0).contains(&run.totals[1]), "total {}", run.totals[1]);
    assert_eq!(run.reconnects, [0.0, 0.0]);
    assert!(run.uptime_reports >= 2);
    assert!(run.edges >= 20);
}
