//! Debounced pulse counter.
//!
//! Counts both rising and falling edges of the sensor output (doubling
//! the resolution of single-edge counting) and records the tick interval
//! between consecutive edges into a [`StatsRingBuffer`].
//!
//! ## Sharing
//!
//! The counter is written by the edge-polling task and read by the
//! metrics task.  Both run on the same single-threaded executor and a task
//! keeps control between suspension points, so `Cell`/`RefCell` are
//! sufficient.  Neither is `Sync`: moving the pipeline onto a
//! multi-threaded executor will not compile until these become atomics
//! or a channel handoff.

use core::cell::{Cell, RefCell};

use embedded_hal::digital::InputPin;
use futures_lite::future::yield_now;
use log::info;

use crate::app::ports::TickSource;
use crate::supervisor::LoopState;

use super::debounce::Debouncer;
use super::stats::StatsRingBuffer;

pub struct PulseCounter {
    name: String,
    /// Total edges since boot.  Wraps at `u32::MAX`.
    total: Cell<u32>,
    /// Tick of the previous edge (0 before the first).
    last_edge_ms: Cell<u32>,
    intervals: RefCell<StatsRingBuffer>,
}

impl PulseCounter {
    pub fn new(name: impl Into<String>, intervals: StatsRingBuffer) -> Self {
        Self {
            name: name.into(),
            total: Cell::new(0),
            last_edge_ms: Cell::new(0),
            intervals: RefCell::new(intervals),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count one edge observed at `now_ms`.
    ///
    /// Returns the interval that was recorded, or `None` when the interval
    /// was discarded: a tick smaller than the previous one (timer wrap or
    /// clock step) is not unwrapped, and a zero interval carries no
    /// information.
    pub fn record_edge(&self, now_ms: u32) -> Option<u32> {
        self.total.set(self.total.get().wrapping_add(1));

        let delta = i64::from(now_ms) - i64::from(self.last_edge_ms.get());
        self.last_edge_ms.set(now_ms);

        if delta <= 0 {
            return None;
        }
        let delta = delta as u32;
        self.intervals.borrow_mut().append(delta as f32);
        Some(delta)
    }

    pub fn total_count(&self) -> u32 {
        self.total.get()
    }

    /// Population standard deviation of the recorded intervals (ticks).
    pub fn interval_std_dev(&self) -> f32 {
        self.intervals.borrow().standard_deviation()
    }

    /// Mean recorded interval (ticks), cold-start zeros included.
    pub fn interval_average(&self) -> f32 {
        self.intervals.borrow().average()
    }
}

/// Edge-polling task.
///
/// Samples the debounced input as fast as the scheduler allows, yielding
/// once per iteration.  Exits when the shared running flag clears.
pub async fn poll_edges<P, T>(
    counter: &PulseCounter,
    mut debouncer: Debouncer<P, T>,
    state: &LoopState<'_>,
) where
    P: InputPin,
    T: TickSource,
{
    info!("Entering poller for {}", counter.name());
    while state.is_running() {
        if let Some(event) = debouncer.update() {
            counter.record_edge(event.at_ms);
        }
        yield_now().await;
    }
    info!("Exiting poller for {}", counter.name());
}
