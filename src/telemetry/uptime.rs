//! Uptime reporting.
//!
//! Accumulates elapsed ticks with wrapping arithmetic, so uptime keeps
//! counting across a rollover of the 32-bit millisecond tick as long as
//! reports are less than ~49 days apart.

use core::fmt::Write;
use core::time::Duration;

use log::{info, warn};

use crate::app::ports::{BrokerPort, TickSource};
use crate::supervisor::LoopState;

use super::payload;
use super::topics::Topics;

/// Format seconds like a Python `timedelta`: `H:MM:SS` or `N day(s), H:MM:SS`.
pub fn format_uptime(total_secs: u64) -> heapless::String<32> {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut s = heapless::String::new();
    let res = match days {
        0 => write!(s, "{hours}:{minutes:02}:{seconds:02}"),
        1 => write!(s, "1 day, {hours}:{minutes:02}:{seconds:02}"),
        d => write!(s, "{d} days, {hours}:{minutes:02}:{seconds:02}"),
    };
    if res.is_err() {
        warn!("uptime string truncated");
    }
    s
}

pub struct UptimeReporter<'a> {
    topics: &'a Topics,
    last_ms: u32,
    uptime_ms: u64,
}

impl<'a> UptimeReporter<'a> {
    /// Start counting from `now_ms`.
    pub fn new(topics: &'a Topics, now_ms: u32) -> Self {
        Self {
            topics,
            last_ms: now_ms,
            uptime_ms: 0,
        }
    }

    /// Advance to `now_ms` and return whole seconds since start.
    pub fn advance(&mut self, now_ms: u32) -> u64 {
        self.uptime_ms += u64::from(now_ms.wrapping_sub(self.last_ms));
        self.last_ms = now_ms;
        self.uptime_secs()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime_ms / 1_000
    }

    /// Advance and publish if the broker is connected.  Returns `true` if sent.
    pub fn report(&mut self, now_ms: u32, broker: &dyn BrokerPort) -> bool {
        let secs = self.advance(now_ms);
        let text = format_uptime(secs);
        info!("Publishing uptime {}", text);

        if !broker.is_connected() {
            info!("Unable to send uptime: broker not connected");
            return false;
        }
        broker.publish(&self.topics.uptime_seconds, &payload(format_args!("{secs}")));
        broker.publish(&self.topics.uptime_str, &text);
        true
    }

    /// Periodic uptime task.
    pub async fn run<T: TickSource>(mut self, state: &LoopState<'_>, clock: &T, interval: Duration) {
        while state.is_running() {
            self.report(clock.ticks_ms(), state.broker());
            async_io_mini::Timer::after(interval).await;
        }
        info!("Exiting uptime loop");
    }
}
