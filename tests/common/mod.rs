#![allow(dead_code)]

use sentra::{
    Attachment, ConfigStore, HttpConfig, HttpEndpoint, HttpRequest, HttpTransport,
    HttpTransportError, MqttConfig, MqttLink, MqttLinkError, MqttMode, MqttSessionSettings,
    NetworkStatus, NodeConfig, NodePorts, PowerControl, PushSequencer, PushState, SensorProvider,
    SensorReadError, SensorSnapshot, StatusIndicator, StatusSignal, PUSH_CHECK_INTERVAL_MS,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Fixture snapshot shared by the harness stubs.
pub fn snapshot() -> SensorSnapshot {
    SensorSnapshot {
        temperature: "21.5".to_string(),
        humidity: "48".to_string(),
        pressure: "1013".to_string(),
        battery: "3.01".to_string(),
        rssi: "-67".to_string(),
    }
}

pub fn base_config() -> NodeConfig {
    NodeConfig {
        hardware_id: "wx-node-7".to_string(),
        sensor_interval_secs: 300,
        first_boot: false,
        http: HttpConfig::default(),
        mqtt: MqttConfig::default(),
    }
}

pub fn custom_http_config() -> NodeConfig {
    let mut config = base_config();
    config.http.endpoint = HttpEndpoint::Custom;
    config.http.url_template = "https://ingest.example/push?t=%t&h=%h&p=%p&v=%v&r=%r".to_string();
    config
}

pub fn mqtt_only_config() -> NodeConfig {
    let mut config = base_config();
    config.mqtt.mode = MqttMode::Plain;
    config.mqtt.host = "broker.example".to_string();
    config.mqtt.base_topic = "weather".to_string();
    config
}

/// Everything the stub ports record, shared with the test through `Rc`s.
pub struct Harness {
    /// Remaining sensor read failures before reads succeed.
    pub sensor_failures: Rc<Cell<u32>>,
    /// Attempt hints passed to each sensor read.
    pub sensor_calls: Rc<RefCell<Vec<u32>>>,
    pub attached: Rc<Cell<bool>>,
    pub http_requests: Rc<RefCell<Vec<HttpRequest>>>,
    /// When set, the HTTP stub rejects submissions synchronously.
    pub http_reject: Rc<Cell<bool>>,
    pub mqtt: Rc<RefCell<MqttRecorder>>,
    pub signals: Rc<RefCell<Vec<StatusSignal>>>,
    pub sleeps: Rc<RefCell<Vec<u32>>>,
}

#[derive(Default)]
pub struct MqttRecorder {
    pub connects: Vec<MqttSessionSettings>,
    pub publishes: Vec<(String, String, bool)>,
    pub disconnects: u32,
    pub reject_connect: bool,
    pub reject_publish: bool,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            sensor_failures: Rc::new(Cell::new(0)),
            sensor_calls: Rc::new(RefCell::new(Vec::new())),
            attached: Rc::new(Cell::new(true)),
            http_requests: Rc::new(RefCell::new(Vec::new())),
            http_reject: Rc::new(Cell::new(false)),
            mqtt: Rc::new(RefCell::new(MqttRecorder::default())),
            signals: Rc::new(RefCell::new(Vec::new())),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sequencer(&self, config: NodeConfig) -> PushSequencer {
        let store = ConfigStore::new(config).expect("harness config must validate");
        PushSequencer::new(store, self.ports())
    }

    pub fn ports(&self) -> NodePorts {
        NodePorts {
            sensors: Box::new(StubSensors {
                failures: Rc::clone(&self.sensor_failures),
                calls: Rc::clone(&self.sensor_calls),
            }),
            network: Box::new(StubNetwork {
                attached: Rc::clone(&self.attached),
            }),
            http: Box::new(StubHttp {
                requests: Rc::clone(&self.http_requests),
                reject: Rc::clone(&self.http_reject),
            }),
            mqtt: Box::new(StubMqtt {
                recorder: Rc::clone(&self.mqtt),
            }),
            status: Box::new(StubStatus {
                signals: Rc::clone(&self.signals),
            }),
            power: Box::new(StubPower {
                sleeps: Rc::clone(&self.sleeps),
            }),
        }
    }

    pub fn http_request_count(&self) -> usize {
        self.http_requests.borrow().len()
    }

    pub fn last_http_url(&self) -> Option<String> {
        self.http_requests
            .borrow()
            .last()
            .map(|request| request.url.clone())
    }
}

/// Advances the cycle by `n` ticks at the poll interval.
pub fn tick_n(sequencer: &mut PushSequencer, now: &mut u64, n: u32) {
    for _ in 0..n {
        *now += PUSH_CHECK_INTERVAL_MS;
        sequencer.tick(*now);
    }
}

/// Ticks until the sequencer reaches `target`, bounded by `max_ticks`.
/// Returns false when the bound ran out first.
pub fn run_to_state(
    sequencer: &mut PushSequencer,
    now: &mut u64,
    target: PushState,
    max_ticks: u32,
) -> bool {
    for _ in 0..max_ticks {
        if sequencer.state() == target {
            return true;
        }
        *now += PUSH_CHECK_INTERVAL_MS;
        sequencer.tick(*now);
    }
    sequencer.state() == target
}

struct StubSensors {
    failures: Rc<Cell<u32>>,
    calls: Rc<RefCell<Vec<u32>>>,
}

impl SensorProvider for StubSensors {
    fn read(&mut self, attempt_hint: u32) -> Result<SensorSnapshot, SensorReadError> {
        self.calls.borrow_mut().push(attempt_hint);
        let remaining = self.failures.get();
        if remaining > 0 {
            self.failures.set(remaining.saturating_sub(1));
            return Err(SensorReadError::new("probe offline"));
        }
        Ok(snapshot())
    }
}

struct StubNetwork {
    attached: Rc<Cell<bool>>,
}

impl NetworkStatus for StubNetwork {
    fn attachment(&mut self) -> Attachment {
        if self.attached.get() {
            Attachment::AddressHeld
        } else {
            Attachment::Associating
        }
    }
}

struct StubHttp {
    requests: Rc<RefCell<Vec<HttpRequest>>>,
    reject: Rc<Cell<bool>>,
}

impl HttpTransport for StubHttp {
    fn submit(&mut self, request: HttpRequest) -> Result<(), HttpTransportError> {
        if self.reject.get() {
            return Err(HttpTransportError::new("transport saturated"));
        }
        self.requests.borrow_mut().push(request);
        Ok(())
    }
}

struct StubMqtt {
    recorder: Rc<RefCell<MqttRecorder>>,
}

impl MqttLink for StubMqtt {
    fn connect(&mut self, settings: &MqttSessionSettings) -> Result<(), MqttLinkError> {
        let mut recorder = self.recorder.borrow_mut();
        if recorder.reject_connect {
            return Err(MqttLinkError::new("engine rejected connect"));
        }
        recorder.connects.push(settings.clone());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttLinkError> {
        let mut recorder = self.recorder.borrow_mut();
        if recorder.reject_publish {
            return Err(MqttLinkError::new("publish queue full"));
        }
        recorder
            .publishes
            .push((topic.to_string(), payload.to_string(), retain));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.recorder.borrow_mut().disconnects += 1;
    }
}

struct StubStatus {
    signals: Rc<RefCell<Vec<StatusSignal>>>,
}

impl StatusIndicator for StubStatus {
    fn set(&mut self, signal: StatusSignal) {
        self.signals.borrow_mut().push(signal);
    }
}

struct StubPower {
    sleeps: Rc<RefCell<Vec<u32>>>,
}

impl PowerControl for StubPower {
    fn sleep(&mut self, seconds: u32) {
        self.sleeps.borrow_mut().push(seconds);
    }
}
