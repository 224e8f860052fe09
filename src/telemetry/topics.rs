//! Broker topic names.

/// Fully-qualified topics, built once from the configured root prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Instantaneous pulses per second.
    pub pulses: String,
    /// Units per minute.
    pub value: String,
    /// Cumulative total units.
    pub total: String,
    /// Standard deviation of inter-edge intervals.
    pub dev: String,
    /// Reconnect counter.
    pub reconnects: String,
    pub uptime_seconds: String,
    pub uptime_str: String,
}

impl Topics {
    pub fn new(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            pulses: format!("{root}/pulses"),
            value: format!("{root}/value"),
            total: format!("{root}/total"),
            dev: format!("{root}/dev"),
            reconnects: format!("{root}/reconnects"),
            uptime_seconds: format!("{root}/uptime/seconds"),
            uptime_str: format!("{root}/uptime/str"),
        }
    }
}
