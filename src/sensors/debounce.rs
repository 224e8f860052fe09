//! Time-based debouncer for a digital input.
//!
//! ## Algorithm
//!
//! The raw level is sampled on every [`Debouncer::update`].  Any change of
//! the raw level restarts the stabilisation timer; once the raw level has
//! held for at least the configured interval and differs from the last
//! debounced level, a single [`Edge`] is reported.
//!
//! ```text
//! raw      ‾‾|_|‾|____________________|‾|_|‾‾‾‾‾‾‾‾‾‾‾‾
//! debounced ‾‾‾‾‾‾‾‾‾‾|__________________________|‾‾‾‾‾‾‾
//!                     ▲ Falling                   ▲ Rising
//! ```
//!
//! Tick arithmetic is wrapping, so a timer rollover during a bounce only
//! delays the edge by one interval at most.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::TickSource;

/// Direction of a debounced transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// A debounced transition and the tick at which it was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub edge: Edge,
    pub at_ms: u32,
}

pub struct Debouncer<P, T> {
    pin: P,
    clock: T,
    interval_ms: u32,
    /// Last confirmed level.
    stable: bool,
    /// Last raw level seen.
    raw: bool,
    /// Tick of the most recent raw change.
    last_bounce_ms: u32,
}

impl<P: InputPin, T: TickSource> Debouncer<P, T> {
    /// Wrap `pin`, seeding both levels from its current state.
    pub fn new(mut pin: P, clock: T, interval_ms: u32) -> Self {
        let level = match pin.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!("Debouncer: initial pin read failed ({:?}), assuming low", e);
                false
            }
        };
        let now = clock.ticks_ms();
        Self {
            pin,
            clock,
            interval_ms,
            stable: level,
            raw: level,
            last_bounce_ms: now,
        }
    }

    /// Sample the pin once.  Returns an event when a transition is confirmed.
    ///
    /// A failed pin read is logged and treated as "no change".
    pub fn update(&mut self) -> Option<EdgeEvent> {
        let now = self.clock.ticks_ms();
        let level = match self.pin.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!("Debouncer: pin read failed ({:?})", e);
                return None;
            }
        };

        if level != self.raw {
            self.raw = level;
            self.last_bounce_ms = now;
            return None;
        }

        if level != self.stable && now.wrapping_sub(self.last_bounce_ms) >= self.interval_ms {
            self.stable = level;
            let edge = if level { Edge::Rising } else { Edge::Falling };
            return Some(EdgeEvent { edge, at_ms: now });
        }

        None
    }

    /// Current debounced level.
    pub fn level(&self) -> bool {
        self.stable
    }
}
