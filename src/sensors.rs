use serde::{Deserialize, Serialize};
use std::fmt;

/// Stringified sensor readings captured once per cycle before any
/// transmission, so every endpoint and topic reports the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature: String,
    pub humidity: String,
    pub pressure: String,
    pub battery: String,
    pub rssi: String,
}

impl Default for SensorSnapshot {
    /// Zeroed snapshot sent best-effort when every read attempt failed.
    fn default() -> Self {
        Self {
            temperature: "0".to_string(),
            humidity: "0".to_string(),
            pressure: "0".to_string(),
            battery: "0".to_string(),
            rssi: "0".to_string(),
        }
    }
}

/// Error reported by a sensor provider when at least one value failed.
#[derive(Debug, Clone)]
pub struct SensorReadError {
    message: String,
}

impl SensorReadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SensorReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SensorReadError {}

/// Seam for the external sensor acquisition subsystem. The attempt hint
/// carries the current retry count so a provider may vary its strategy.
pub trait SensorProvider {
    fn read(&mut self, attempt_hint: u32) -> Result<SensorSnapshot, SensorReadError>;
}
