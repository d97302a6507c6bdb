use std::time::Instant;

/// Monotonic time source injected into the cycle so tests stay deterministic.
pub trait MonotonicClock {
    /// Returns the current monotonic timestamp in milliseconds.
    fn now_ms(&mut self) -> u64;
}

/// System clock implementation backed by `Instant`.
#[derive(Debug, Clone)]
pub struct SystemMonotonicClock {
    start: Instant,
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl SystemMonotonicClock {
    /// Creates a clock anchored at construction time.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
