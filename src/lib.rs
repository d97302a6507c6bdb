//! Wake-cycle push engine for battery-powered sensor nodes.
//!
//! One wake period: read sensors, wait for network attach, push the readings
//! over HTTP and/or MQTT with bounded retries, then sleep. The core is a
//! deterministic, sans-IO state machine; real transports plug in behind
//! trait seams.

pub mod app;
pub mod clock;
pub mod config;
pub mod device;
pub mod http_stage;
pub mod logging;
pub mod mqtt_stage;
pub mod sensors;
pub mod sequencer;
pub mod telemetry;
pub mod transport;
pub mod watchdog;

pub use clock::{MonotonicClock, SystemMonotonicClock};
pub use config::{
    ConfigError, ConfigStore, HttpConfig, HttpEndpoint, MqttConfig, MqttMode, NodeConfig,
    INTERVAL_MAX_SECS, INTERVAL_MIN_SECS,
};
pub use device::{
    Attachment, NetworkStatus, NodePorts, PowerControl, StatusIndicator, StatusSignal,
};
pub use http_stage::{
    build_request, classify_response, scan_header, substitute_placeholders, HttpDisposition,
    HttpRequest, HttpResponse, HttpTransport, HttpTransportError, INTERVAL_OVERRIDE_HEADER,
    LOCATION_HEADER, TRANSPORT_FAILURE_STATUS,
};
pub use logging::{CycleLog, LogLevel, LogRotationPolicy, LogSegment};
pub use mqtt_stage::{
    derive_client_id, normalize_topic, reading_for, MqttBegin, MqttLink, MqttLinkError,
    MqttSession, MqttSessionSettings, MqttStage, MQTT_KEEP_ALIVE_SECS, SUB_TOPICS,
};
pub use sensors::{SensorProvider, SensorReadError, SensorSnapshot};
pub use sequencer::{
    transition, PendingOp, PushCycle, PushEvent, PushSequencer, PushState, Transition,
    PUSH_CHECK_INTERVAL_MS, PUSH_ERROR_DELAY_TICKS, PUSH_REDIRECT_MAX, PUSH_RETRIES_MAX,
    PUSH_WATCHDOG_MS, SENSOR_READ_TOLERANCE,
};
pub use telemetry::PushTelemetry;
pub use transport::{ReqwestHttpTransport, RumqttcMqttLink};
pub use watchdog::Watchdog;
