/// Monotonic counters exported by the push pipeline. Counters only ever
/// increase within a process lifetime; `start_cycle` does not reset them, so
/// multi-cycle tests can assert across cycles.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushTelemetry {
    pub sensor_read_failures_total: u64,
    pub http_attempts_total: u64,
    pub http_failures_total: u64,
    pub redirects_followed_total: u64,
    pub interval_overrides_total: u64,
    pub mqtt_attempts_total: u64,
    pub mqtt_failures_total: u64,
    pub publishes_acked_total: u64,
    pub watchdog_forced_total: u64,
    pub cycles_completed_total: u64,
}

impl PushTelemetry {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }
}
