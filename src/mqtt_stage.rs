use crate::config::{MqttConfig, MqttMode};
use crate::sensors::SensorSnapshot;
use sha2::{Digest, Sha256};
use std::fmt;

/// Keep-alive negotiated with the broker, seconds.
pub const MQTT_KEEP_ALIVE_SECS: u16 = 120;

/// Sub-topics published under the configured base topic, in publish order.
pub const SUB_TOPICS: [&str; 5] = ["temperature", "humidity", "pressure", "battery", "rssi"];

/// Connection parameters handed to the external MQTT protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSessionSettings {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u16,
}

impl MqttSessionSettings {
    /// Builds settings for one session from the node configuration.
    pub fn from_config(config: &MqttConfig, hardware_id: &str) -> Self {
        Self {
            client_id: derive_client_id(hardware_id),
            host: config.host.clone(),
            port: config.port,
            tls: config.mode == MqttMode::Tls,
            username: config.username.clone(),
            password: config.password.clone(),
            keep_alive_secs: MQTT_KEEP_ALIVE_SECS,
        }
    }
}

/// Error reported by the MQTT protocol engine.
#[derive(Debug, Clone)]
pub struct MqttLinkError {
    message: String,
}

impl MqttLinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MqttLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MqttLinkError {}

/// Seam for the external MQTT protocol engine. Connect is asynchronous: a
/// successful call means the handshake was initiated, and completion arrives
/// later as a connected/timeout event. Publishes are QoS 0.
pub trait MqttLink {
    fn connect(&mut self, settings: &MqttSessionSettings) -> Result<(), MqttLinkError>;
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttLinkError>;
    fn disconnect(&mut self);
}

/// Derives a stable client identifier from the hardware identifier. The
/// six-character suffix is the leading bytes of a SHA-256 digest, so the same
/// hardware always presents the same identity to the broker.
pub fn derive_client_id(hardware_id: &str) -> String {
    let digest = Sha256::digest(hardware_id.as_bytes());
    format!("sentra-{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2])
}

/// Joins the base topic and sub-topic with exactly one separator, regardless
/// of whether the configured base already ends with one.
pub fn normalize_topic(base: &str, sub: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    format!("{trimmed}/{sub}")
}

/// Returns the snapshot value published under the given sub-topic.
pub fn reading_for<'a>(snapshot: &'a SensorSnapshot, sub: &str) -> &'a str {
    match sub {
        "temperature" => &snapshot.temperature,
        "humidity" => &snapshot.humidity,
        "pressure" => &snapshot.pressure,
        "battery" => &snapshot.battery,
        _ => &snapshot.rssi,
    }
}

/// Outcome of initiating an MQTT push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttBegin {
    /// MQTT delivery is disabled; nothing to do.
    Skipped,
    /// Connect initiated; completion arrives as an event.
    Submitted,
    /// The engine rejected the connect synchronously.
    Rejected,
}

/// Live session marker. Owns the engine handle from connect until disconnect;
/// exactly one teardown on both success and failure paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSession {
    client_id: String,
    outstanding: usize,
}

impl MqttSession {
    /// Client identifier presented to the broker.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publishes not yet acknowledged by the engine.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

/// Drives connect → publish N topics → disconnect for one cycle.
#[derive(Debug, Default)]
pub struct MqttStage {
    session: Option<MqttSession>,
}

impl MqttStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a session handle is live.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Returns the live session, if any.
    pub fn session(&self) -> Option<&MqttSession> {
        self.session.as_ref()
    }

    /// Initiates a push attempt: derives the client identity and asks the
    /// engine to connect. Returns `Skipped` when MQTT delivery is disabled.
    pub fn begin(
        &mut self,
        link: &mut dyn MqttLink,
        config: &MqttConfig,
        hardware_id: &str,
    ) -> MqttBegin {
        if !config.enabled() {
            return MqttBegin::Skipped;
        }
        let settings = MqttSessionSettings::from_config(config, hardware_id);
        match link.connect(&settings) {
            Ok(()) => {
                self.session = Some(MqttSession {
                    client_id: settings.client_id,
                    outstanding: 0,
                });
                MqttBegin::Submitted
            }
            Err(_) => MqttBegin::Rejected,
        }
    }

    /// Connected: publish every reading under the base topic. A publish the
    /// engine rejects tears the session down and surfaces the error so the
    /// sequencer can arm the standard backoff.
    pub fn on_connected(
        &mut self,
        link: &mut dyn MqttLink,
        config: &MqttConfig,
        snapshot: &SensorSnapshot,
    ) -> Result<(), MqttLinkError> {
        if self.session.is_none() {
            return Ok(());
        }
        let mut queued = 0;
        for sub in SUB_TOPICS {
            let topic = normalize_topic(&config.base_topic, sub);
            if let Err(err) = link.publish(&topic, reading_for(snapshot, sub), config.retain) {
                self.teardown(link);
                return Err(err);
            }
            queued += 1;
        }
        if let Some(session) = self.session.as_mut() {
            session.outstanding = queued;
        }
        Ok(())
    }

    /// One publish completed. Returns true once the outbound queue is empty
    /// and the cycle may advance; the caller is expected to tear down.
    pub fn on_publish_acked(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => {
                session.outstanding = session.outstanding.saturating_sub(1);
                session.outstanding == 0
            }
            None => false,
        }
    }

    /// Disconnects and releases the session. Idempotent: a second call is a
    /// no-op, so success and failure paths cannot double-release.
    pub fn teardown(&mut self, link: &mut dyn MqttLink) {
        if self.session.take().is_some() {
            link.disconnect();
        }
    }

    /// Drops the session marker without disconnecting. Watchdog-forced sleep
    /// path only: the in-flight session is abandoned, not torn down.
    pub fn abandon(&mut self) {
        self.session = None;
    }
}
