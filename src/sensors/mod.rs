//! Sensor subsystem: pulse input debouncing, edge counting and
//! interval statistics.
//!
//! ```text
//! InputPin ──▶ Debouncer ──▶ PulseCounter ──▶ StatsRingBuffer
//!                              (count)         (inter-edge ticks)
//! ```

pub mod debounce;
pub mod pulse;
pub mod stats;
