//! Task supervision.
//!
//! All periodic work runs as cooperative tasks on one
//! `edge_executor::LocalExecutor` driven by `futures_lite::future::block_on`:
//!
//! ```text
//! ┌───────────────────────── block_on ─────────────────────────┐
//! │  LocalExecutor<'_, 8>                                      │
//! │   ├─ poll_edges       (yield per sample)                   │
//! │   ├─ metrics.run      (sleep report_interval, publish)     │
//! │   ├─ uptime.run       (publish, sleep uptime_interval)     │
//! │   └─ connection.run   (connect, wait, back off)            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The supervisor ticks the executor itself, a batch at a time, and yields
//! between batches so futures running beside [`TaskSupervisor::run`] (a
//! caller's stop trigger, for instance) still get polled.
//!
//! Shutdown is cooperative: [`LoopState::stop`] clears the running flag,
//! each loop exits at its next check, and tasks still suspended when the
//! executor returns are dropped with it.

use core::cell::Cell;
use core::time::Duration;

use embedded_hal::digital::InputPin;
use futures_lite::FutureExt;
use futures_lite::future::yield_now;
use log::{error, info};

use crate::app::ports::{BrokerClientFactory, BrokerPort, NetworkLink, TickSource};
use crate::config::SystemConfig;
use crate::connection::ConnectionManager;
use crate::error::{CommsError, Result};
use crate::sensors::debounce::Debouncer;
use crate::sensors::pulse::{poll_edges, PulseCounter};
use crate::telemetry::metrics::MetricsPublisher;
use crate::telemetry::topics::Topics;
use crate::telemetry::uptime::UptimeReporter;

const STOP_POLL: Duration = Duration::from_millis(100);
/// Task polls per pass before the caller's future gets a turn.
const TICK_BATCH: usize = 16;

/// Shared run state observed by every task.
pub struct LoopState<'a> {
    running: Cell<bool>,
    broker: &'a dyn BrokerPort,
}

impl<'a> LoopState<'a> {
    pub fn new(broker: &'a dyn BrokerPort) -> Self {
        Self {
            running: Cell::new(true),
            broker,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn stop(&self) {
        self.running.set(false);
    }

    pub fn broker(&self) -> &'a dyn BrokerPort {
        self.broker
    }
}

pub struct TaskSupervisor<'a, F: BrokerClientFactory, L: NetworkLink> {
    config: &'a SystemConfig,
    connection: &'a ConnectionManager<F, L>,
    state: LoopState<'a>,
}

impl<'a, F: BrokerClientFactory, L: NetworkLink> TaskSupervisor<'a, F, L> {
    pub fn new(config: &'a SystemConfig, connection: &'a ConnectionManager<F, L>) -> Self {
        Self {
            config,
            connection,
            state: LoopState::new(connection),
        }
    }

    pub fn state(&self) -> &LoopState<'a> {
        &self.state
    }

    pub fn stop(&self) {
        info!("Supervisor: stop requested");
        self.state.stop();
    }

    /// Run every task until the running flag clears.
    ///
    /// Returns the connection task's error if it gave up, after the
    /// remaining tasks have been stopped and the broker torn down.
    pub async fn run<P, C>(&self, counter: &PulseCounter, pin: P, clock: &C) -> Result<()>
    where
        P: InputPin,
        C: TickSource,
    {
        let cfg = self.config;
        let topics = Topics::new(&cfg.root_topic);
        let debouncer = Debouncer::new(pin, clock, cfg.debounce_ms);
        let now = clock.ticks_ms();
        let metrics = MetricsPublisher::new(counter, &topics, cfg, now);
        let uptime = UptimeReporter::new(&topics, now);
        let failure: Cell<Option<CommsError>> = Cell::new(None);

        let state = &self.state;
        let connection = self.connection;
        let failure_ref = &failure;

        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

        executor
            .spawn(async move {
                if let Err(e) = connection.run(state).await {
                    error!("Supervisor: connection task failed: {}", e);
                    failure_ref.set(Some(e));
                    state.stop();
                }
            })
            .detach();
        executor.spawn(poll_edges(counter, debouncer, state)).detach();
        executor
            .spawn(metrics.run(
                state,
                clock,
                Duration::from_secs(u64::from(cfg.report_interval_secs)),
            ))
            .detach();
        executor
            .spawn(uptime.run(
                state,
                clock,
                Duration::from_secs(u64::from(cfg.uptime_interval_secs)),
            ))
            .detach();

        info!(
            "Supervisor: started {} on {} (report={}s uptime={}s)",
            counter.name(),
            cfg.root_topic,
            cfg.report_interval_secs,
            cfg.uptime_interval_secs
        );

        // Ticked in bounded batches: the edge poller is always runnable, so
        // `executor.run` would never hand control back to the caller.
        while state.is_running() {
            let mut ran = 0;
            while ran < TICK_BATCH && executor.try_tick() {
                ran += 1;
            }
            if ran == 0 {
                executor
                    .tick()
                    .or(async {
                        async_io_mini::Timer::after(STOP_POLL).await;
                    })
                    .await;
            } else {
                yield_now().await;
            }
        }

        drop(executor);
        self.connection.disconnect();
        info!("Supervisor: all tasks stopped");

        match failure.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
