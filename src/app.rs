use crate::clock::{MonotonicClock, SystemMonotonicClock};
use crate::config::ConfigStore;
use crate::device::{
    Attachment, NetworkStatus, NodePorts, PowerControl, StatusIndicator, StatusSignal,
};
use crate::http_stage::{HttpRequest, HttpTransport, HttpTransportError};
use crate::mqtt_stage::{MqttLink, MqttLinkError, MqttSessionSettings};
use crate::sensors::{SensorProvider, SensorReadError, SensorSnapshot};
use crate::sequencer::{PushEvent, PushSequencer, PUSH_CHECK_INTERVAL_MS};
use crate::transport::{ReqwestHttpTransport, RumqttcMqttLink};
use anyhow::{Context, Result};
use std::cell::{Cell, RefCell};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

/// Runs one wake cycle on the host: load configuration, assemble the real
/// adapters, and drive the cooperative poll loop until the sequencer goes
/// idle. Deep sleep halts a device; here the requested sleep ends the
/// process instead.
pub fn run() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| "sentra.json".to_string());
    let snapshot_path = env::args()
        .nth(2)
        .unwrap_or_else(|| "snapshot.json".to_string());
    let store = ConfigStore::from_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;

    let http = Rc::new(RefCell::new(
        ReqwestHttpTransport::new().context("building http transport")?,
    ));
    let mqtt = Rc::new(RefCell::new(RumqttcMqttLink::new()));
    let sleep_request = Rc::new(Cell::new(None));

    let ports = NodePorts {
        sensors: Box::new(JsonFileProbe::new(snapshot_path)),
        network: Box::new(HostNetwork),
        http: Box::new(SharedHttp(Rc::clone(&http))),
        mqtt: Box::new(SharedMqtt(Rc::clone(&mqtt))),
        status: Box::new(HeadlessIndicator),
        power: Box::new(HostPower {
            requested: Rc::clone(&sleep_request),
        }),
    };

    let mut clock = SystemMonotonicClock::new();
    let mut sequencer = PushSequencer::new(store, ports);
    sequencer.start_cycle(clock.now_ms());

    while !sequencer.is_idle() {
        sequencer.tick(clock.now_ms());
        loop {
            let completion = http.borrow_mut().take_completion();
            let Some(response) = completion else {
                break;
            };
            let now = clock.now_ms();
            sequencer.handle_event(now, PushEvent::HttpResponse(response));
        }
        let notification = mqtt.borrow_mut().poll_event(Duration::from_millis(10));
        if let Some(event) = notification {
            let now = clock.now_ms();
            sequencer.handle_event(now, event);
        }
        thread::sleep(Duration::from_millis(PUSH_CHECK_INTERVAL_MS));
    }

    for line in sequencer.log().lines() {
        println!("{line}");
    }
    if let Some(seconds) = sleep_request.get() {
        eprintln!("sleep {seconds}s requested, exiting");
    }
    Ok(())
}

/// Reads the sensor snapshot from a JSON file. A missing or malformed file
/// reports a read failure, and the cycle falls back to best-effort readings
/// after the usual tolerance.
struct JsonFileProbe {
    path: PathBuf,
}

impl JsonFileProbe {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorProvider for JsonFileProbe {
    fn read(&mut self, _attempt_hint: u32) -> Result<SensorSnapshot, SensorReadError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|err| SensorReadError::new(format!("{}: {err}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|err| SensorReadError::new(format!("{}: {err}", self.path.display())))
    }
}

/// The host network stack is attached by the time the process runs.
struct HostNetwork;

impl NetworkStatus for HostNetwork {
    fn attachment(&mut self) -> Attachment {
        Attachment::AddressHeld
    }
}

/// No LED on a host; signals are dropped.
struct HeadlessIndicator;

impl StatusIndicator for HeadlessIndicator {
    fn set(&mut self, _signal: StatusSignal) {}
}

/// Records the sleep request so the loop can exit once the cycle completes.
struct HostPower {
    requested: Rc<Cell<Option<u32>>>,
}

impl PowerControl for HostPower {
    fn sleep(&mut self, seconds: u32) {
        self.requested.set(Some(seconds));
    }
}

/// Port wrapper sharing the HTTP adapter between the sequencer and the
/// completion-draining loop.
struct SharedHttp(Rc<RefCell<ReqwestHttpTransport>>);

impl HttpTransport for SharedHttp {
    fn submit(&mut self, request: HttpRequest) -> Result<(), HttpTransportError> {
        self.0.borrow_mut().submit(request)
    }
}

/// Port wrapper sharing the MQTT adapter between the sequencer and the
/// notification-polling loop.
struct SharedMqtt(Rc<RefCell<RumqttcMqttLink>>);

impl MqttLink for SharedMqtt {
    fn connect(&mut self, settings: &MqttSessionSettings) -> Result<(), MqttLinkError> {
        self.0.borrow_mut().connect(settings)
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), MqttLinkError> {
        self.0.borrow_mut().publish(topic, payload, retain)
    }

    fn disconnect(&mut self) {
        self.0.borrow_mut().disconnect();
    }
}
