use crate::mqtt_stage::{MqttLink, MqttLinkError, MqttSessionSettings};
use crate::sequencer::PushEvent;
use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS, Transport};
use std::time::Duration;

/// MQTT adapter wrapping the `rumqttc` synchronous client behind the core's
/// link seam. One live client per session; engine notifications translate
/// into sequencer events through `poll_event`.
pub struct RumqttcMqttLink {
    session: Option<LinkSession>,
}

struct LinkSession {
    client: Client,
    connection: Connection,
}

impl Default for RumqttcMqttLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RumqttcMqttLink {
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Polls the engine and translates the next notification into a
    /// sequencer event. Publishes are QoS 0, so the outgoing-publish
    /// notification stands in for the engine's per-message completion.
    pub fn poll_event(&mut self, wait: Duration) -> Option<PushEvent> {
        let session = self.session.as_mut()?;
        match session.connection.recv_timeout(wait) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => Some(PushEvent::MqttConnected),
            Ok(Ok(Event::Outgoing(Outgoing::Publish(_)))) => Some(PushEvent::MqttPublishAcked),
            Ok(Ok(_)) => None,
            Ok(Err(_)) => Some(PushEvent::MqttTimeout),
            Err(_) => None,
        }
    }
}

impl MqttLink for RumqttcMqttLink {
    fn connect(&mut self, settings: &MqttSessionSettings) -> Result<(), MqttLinkError> {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(settings.keep_alive_secs)));
        options.set_clean_session(true);
        if !settings.username.is_empty() {
            options.set_credentials(settings.username.clone(), settings.password.clone());
        }
        if settings.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        let (client, connection) = Client::new(options, 10);
        self.session = Some(LinkSession { client, connection });
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttLinkError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MqttLinkError::new("no live session"))?;
        session
            .client
            .publish(topic, QoS::AtMostOnce, retain, payload.as_bytes())
            .map_err(|err| MqttLinkError::new(format!("publish failed: {err}")))
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.client.disconnect();
        }
    }
}
