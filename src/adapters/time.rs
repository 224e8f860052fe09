//! System tick adapter.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer, truncated to a wrapping `u32` of ms.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side simulation.

use crate::app::ports::TickSource;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl TickSource for SystemClock {
    /// Milliseconds since boot, wrapping at `u32::MAX` (~49.7 days).
    #[cfg(target_os = "espidf")]
    fn ticks_ms(&self) -> u32 {
        let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() } as u64;
        (us / 1_000) as u32
    }

    /// Milliseconds since construction, wrapping at `u32::MAX`.
    #[cfg(not(target_os = "espidf"))]
    fn ticks_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
