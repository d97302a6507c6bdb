use serde_json::json;
use std::collections::VecDeque;
use std::fmt;

/// Severity levels for cycle diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the canonical uppercase representation.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation policy sized for a device-local diagnostic buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: usize,
    pub max_segments: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 64 << 10,
            max_segments: 4,
        }
    }
}

/// Accumulated log lines for a rotated segment.
#[derive(Debug, Default, Clone)]
pub struct LogSegment {
    lines: Vec<String>,
    bytes_written: usize,
}

impl LogSegment {
    /// Lines contained within the segment.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Total bytes recorded before rotation.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

/// JSON-line diagnostic log with deterministic rotation semantics. Records
/// carry the push state active at emit time so a cycle can be replayed from
/// the log alone.
#[derive(Debug, Clone)]
pub struct CycleLog {
    policy: LogRotationPolicy,
    current_level: LogLevel,
    rotated: VecDeque<LogSegment>,
    active: LogSegment,
}

impl Default for CycleLog {
    fn default() -> Self {
        Self::new(LogRotationPolicy::default())
    }
}

impl CycleLog {
    /// Creates a log anchored to the provided rotation policy.
    pub fn new(policy: LogRotationPolicy) -> Self {
        Self {
            policy,
            current_level: LogLevel::Info,
            rotated: VecDeque::new(),
            active: LogSegment::default(),
        }
    }

    /// Returns the current severity threshold.
    pub fn level(&self) -> LogLevel {
        self.current_level
    }

    /// Applies a dynamic log-level override.
    pub fn set_level(&mut self, level: LogLevel) {
        self.current_level = level;
    }

    /// Emits a JSON-line record. Records below the current threshold are
    /// dropped.
    pub fn log(&mut self, ts_ms: u64, level: LogLevel, module: &str, state: &str, message: &str) {
        if level < self.current_level {
            return;
        }
        let line = json!({
            "ts": ts_ms,
            "level": level.as_str(),
            "module": module,
            "state": state,
            "message": message,
        })
        .to_string();
        self.rotate_if_needed(line.len());
        self.active.bytes_written = self.active.bytes_written.saturating_add(line.len());
        self.active.lines.push(line);
    }

    /// Returns rotated segments followed by the active one.
    pub fn segments(&self) -> impl Iterator<Item = &LogSegment> {
        self.rotated.iter().chain(std::iter::once(&self.active))
    }

    /// Returns every retained line in emit order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.segments()
            .flat_map(|segment| segment.lines().iter().map(String::as_str))
    }

    fn rotate_if_needed(&mut self, next_line_len: usize) {
        if self.active.bytes_written + next_line_len <= self.policy.max_bytes {
            return;
        }
        if !self.active.lines.is_empty() {
            self.rotated.push_back(std::mem::take(&mut self.active));
            while self.rotated.len() > self.policy.max_segments {
                self.rotated.pop_front();
            }
        }
        self.active = LogSegment::default();
    }
}
