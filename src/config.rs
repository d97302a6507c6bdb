use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Lowest sensor interval a remote override may select.
pub const INTERVAL_MIN_SECS: u32 = 30;
/// Highest sensor interval a remote override may select (6 h).
pub const INTERVAL_MAX_SECS: u32 = 21_600;

fn default_interval() -> u32 {
    300
}

fn default_mqtt_port() -> u16 {
    1883
}

/// HTTP delivery mode. The two named services use fixed-field templates; the
/// custom mode substitutes placeholders into a user-supplied URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpEndpoint {
    #[default]
    Disabled,
    Thingspeak,
    AdafruitIo,
    Custom,
}

/// HTTP delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub endpoint: HttpEndpoint,
    /// API key for the named ingestion services.
    #[serde(default)]
    pub api_key: String,
    /// Feed group, used by the Adafruit-IO endpoint only.
    #[serde(default)]
    pub group: String,
    /// URL template with `%t` `%h` `%p` `%v` `%r` placeholders (custom mode).
    #[serde(default)]
    pub url_template: String,
}

impl HttpConfig {
    /// True when HTTP delivery participates in the cycle.
    pub fn enabled(&self) -> bool {
        self.endpoint != HttpEndpoint::Disabled
    }
}

/// MQTT security mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MqttMode {
    #[default]
    Disabled,
    Plain,
    Tls,
}

/// MQTT delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub mode: MqttMode,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Base topic; readings publish under `<base>/<sub-topic>`.
    #[serde(default)]
    pub base_topic: String,
    /// Retain flag applied to every published reading.
    #[serde(default)]
    pub retain: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            mode: MqttMode::Disabled,
            host: String::new(),
            port: default_mqtt_port(),
            username: String::new(),
            password: String::new(),
            base_topic: String::new(),
            retain: false,
        }
    }
}

impl MqttConfig {
    /// True when MQTT delivery participates in the cycle.
    pub fn enabled(&self) -> bool {
        self.mode != MqttMode::Disabled
    }
}

/// Persisted node configuration, read before the cycle starts. The sensor
/// interval is the only field writable mid-cycle (HTTP interval override).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hardware identifier the MQTT client id derives from.
    pub hardware_id: String,
    /// Deep-sleep interval between cycles, seconds.
    #[serde(default = "default_interval")]
    pub sensor_interval_secs: u32,
    /// Set until the node has been configured once; Finish holds the device
    /// awake instead of sleeping so it can be reconfigured.
    #[serde(default)]
    pub first_boot: bool,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

/// Errors surfaced while loading or validating node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("hardware_id must not be empty")]
    MissingHardwareId,
    #[error("sensor interval {0}s outside [{INTERVAL_MIN_SECS}, {INTERVAL_MAX_SECS}]")]
    IntervalOutOfRange(u32),
    #[error("{endpoint} endpoint requires a non-empty {field}")]
    MissingEndpointField {
        endpoint: &'static str,
        field: &'static str,
    },
    #[error("mqtt host must not be empty when mqtt is enabled")]
    MissingMqttHost,
    #[error("mqtt base_topic must not be empty when mqtt is enabled")]
    MissingMqttTopic,
}

/// Owns the validated configuration for one cycle and applies the remote
/// interval override.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: NodeConfig,
}

impl ConfigStore {
    /// Validates and wraps a node configuration.
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self { config })
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = serde_json::from_str(raw)?;
        Self::new(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// True when at least one transport is enabled.
    pub fn push_required(&self) -> bool {
        self.config.http.enabled() || self.config.mqtt.enabled()
    }

    /// Returns the deep-sleep interval in seconds.
    pub fn sensor_interval_secs(&self) -> u32 {
        self.config.sensor_interval_secs
    }

    /// Applies a remote interval override. Values outside the permitted range
    /// leave the interval unchanged; returns true when the override took
    /// effect.
    pub fn apply_interval_override(&mut self, secs: u32) -> bool {
        if !(INTERVAL_MIN_SECS..=INTERVAL_MAX_SECS).contains(&secs) {
            return false;
        }
        self.config.sensor_interval_secs = secs;
        true
    }
}

fn validate(config: &NodeConfig) -> Result<(), ConfigError> {
    if config.hardware_id.trim().is_empty() {
        return Err(ConfigError::MissingHardwareId);
    }
    if !(INTERVAL_MIN_SECS..=INTERVAL_MAX_SECS).contains(&config.sensor_interval_secs) {
        return Err(ConfigError::IntervalOutOfRange(config.sensor_interval_secs));
    }
    match config.http.endpoint {
        HttpEndpoint::Disabled => {}
        HttpEndpoint::Thingspeak => {
            if config.http.api_key.trim().is_empty() {
                return Err(ConfigError::MissingEndpointField {
                    endpoint: "thingspeak",
                    field: "api_key",
                });
            }
        }
        HttpEndpoint::AdafruitIo => {
            if config.http.api_key.trim().is_empty() {
                return Err(ConfigError::MissingEndpointField {
                    endpoint: "adafruit_io",
                    field: "api_key",
                });
            }
            if config.http.group.trim().is_empty() {
                return Err(ConfigError::MissingEndpointField {
                    endpoint: "adafruit_io",
                    field: "group",
                });
            }
        }
        HttpEndpoint::Custom => {
            if config.http.url_template.trim().is_empty() {
                return Err(ConfigError::MissingEndpointField {
                    endpoint: "custom",
                    field: "url_template",
                });
            }
        }
    }
    if config.mqtt.enabled() {
        if config.mqtt.host.trim().is_empty() {
            return Err(ConfigError::MissingMqttHost);
        }
        if config.mqtt.base_topic.trim().is_empty() {
            return Err(ConfigError::MissingMqttTopic);
        }
    }
    Ok(())
}
