/// Independent absolute deadline guaranteeing the device never stays awake
/// indefinitely on a stuck network stage. Armed once at cycle start; never
/// disarmed (deep sleep ends the awake period, so re-arming is moot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchdog {
    duration_ms: u64,
    deadline_ms: Option<u64>,
}

impl Watchdog {
    /// Creates an unarmed watchdog with the given duration.
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            deadline_ms: None,
        }
    }

    /// Arms the deadline relative to `now_ms`. Re-arming at the start of a
    /// later cycle replaces the previous deadline.
    pub fn arm(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(self.duration_ms));
    }

    /// True once the deadline has passed. Unarmed watchdogs never expire.
    pub fn expired(&self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) => now_ms >= deadline,
            None => false,
        }
    }

    /// Returns the armed deadline, if any.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }
}
