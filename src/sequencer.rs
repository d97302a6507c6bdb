use crate::config::ConfigStore;
use crate::device::{Attachment, NodePorts, StatusSignal};
use crate::http_stage::{self, HttpDisposition, HttpRequest, HttpResponse};
use crate::logging::{CycleLog, LogLevel};
use crate::mqtt_stage::{MqttBegin, MqttStage};
use crate::sensors::SensorSnapshot;
use crate::telemetry::PushTelemetry;
use crate::watchdog::Watchdog;

/// Poll tick period driven by the host loop.
pub const PUSH_CHECK_INTERVAL_MS: u64 = 100;
/// Push attempts per transport before the transport is abandoned.
pub const PUSH_RETRIES_MAX: u32 = 3;
/// Ticks waited between failed attempts.
pub const PUSH_ERROR_DELAY_TICKS: u32 = 20;
/// Redirects followed per fresh send attempt.
pub const PUSH_REDIRECT_MAX: u32 = 3;
/// Watchdog deadline; the device sleeps no matter what once this passes.
pub const PUSH_WATCHDOG_MS: u64 = 30_000;
/// Consecutive sensor read failures tolerated before advancing best-effort.
pub const SENSOR_READ_TOLERANCE: u32 = 5;

/// Push-cycle states in progression order. Progress is forward-only except
/// the two backoff→send retry loops and the terminal reset to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PushState {
    Idle,
    Init,
    ReadSensors,
    AwaitNetwork,
    HttpSetup,
    HttpSend,
    HttpBackoff,
    MqttSetup,
    MqttSend,
    MqttBackoff,
    Finish,
}

impl Default for PushState {
    fn default() -> Self {
        PushState::Idle
    }
}

impl PushState {
    /// Canonical label used in log records.
    pub fn as_str(self) -> &'static str {
        match self {
            PushState::Idle => "idle",
            PushState::Init => "init",
            PushState::ReadSensors => "read_sensors",
            PushState::AwaitNetwork => "await_network",
            PushState::HttpSetup => "http_setup",
            PushState::HttpSend => "http_send",
            PushState::HttpBackoff => "http_backoff",
            PushState::MqttSetup => "mqtt_setup",
            PushState::MqttSend => "mqtt_send",
            PushState::MqttBackoff => "mqtt_backoff",
            PushState::Finish => "finish",
        }
    }
}

/// Named transitions out of a state. "Abandon transport" is distinct from
/// "advance normally" so giving up on HTTP or MQTT is explicit rather than a
/// numeric state skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Remain in the current state.
    Hold,
    /// Move to the next state in progression order.
    Advance,
    /// Backoff elapsed; re-enter the transport's send state.
    RetryTransport,
    /// Give up on the current transport and move to the next stage.
    AbandonTransport,
    /// Jump directly to `Finish` (nothing to push).
    FinishCycle,
    /// Terminal reset once the cycle has completed.
    Reset,
}

/// Applies a named transition to a state. States not named by a transition
/// are unchanged, so a stray event can never move the cycle backwards.
pub fn transition(state: PushState, kind: Transition) -> PushState {
    match kind {
        Transition::Hold => state,
        Transition::Advance => match state {
            PushState::Idle => PushState::Idle,
            PushState::Init => PushState::ReadSensors,
            PushState::ReadSensors => PushState::AwaitNetwork,
            PushState::AwaitNetwork => PushState::HttpSetup,
            PushState::HttpSetup => PushState::HttpSend,
            PushState::HttpSend => PushState::HttpBackoff,
            PushState::HttpBackoff => PushState::MqttSetup,
            PushState::MqttSetup => PushState::MqttSend,
            PushState::MqttSend => PushState::MqttBackoff,
            PushState::MqttBackoff => PushState::Finish,
            PushState::Finish => PushState::Finish,
        },
        Transition::RetryTransport => match state {
            PushState::HttpBackoff => PushState::HttpSend,
            PushState::MqttBackoff => PushState::MqttSend,
            other => other,
        },
        Transition::AbandonTransport => match state {
            PushState::HttpSend | PushState::HttpBackoff => PushState::MqttSetup,
            PushState::MqttSend | PushState::MqttBackoff => PushState::Finish,
            other => other,
        },
        Transition::FinishCycle => PushState::Finish,
        Transition::Reset => PushState::Idle,
    }
}

/// Marker held while a transport operation is in flight so a tick never
/// double-invokes a stage before its completion event arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    HttpExchange,
    MqttSession,
}

/// State owned by one wake cycle. Created at cycle start, reset at cycle
/// end; mutated only by the sequencer and its event handlers.
#[derive(Debug, Clone, Default)]
pub struct PushCycle {
    state: PushState,
    retry_count: u32,
    error_delay_ticks: u32,
    redirects_remaining: u32,
    pending: Option<PendingOp>,
    snapshot: Option<SensorSnapshot>,
}

impl PushCycle {
    pub fn state(&self) -> PushState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn error_delay_ticks(&self) -> u32 {
        self.error_delay_ticks
    }

    pub fn redirects_remaining(&self) -> u32 {
        self.redirects_remaining
    }

    pub fn pending(&self) -> Option<PendingOp> {
        self.pending
    }

    /// Snapshot captured this cycle, if a read succeeded.
    pub fn snapshot(&self) -> Option<&SensorSnapshot> {
        self.snapshot.as_ref()
    }

    fn effective_snapshot(&self) -> SensorSnapshot {
        self.snapshot.clone().unwrap_or_default()
    }
}

/// Asynchronous completions fed back into the sequencer by the host loop.
/// Events are serialized with ticks; a completion that no longer matches the
/// pending operation is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    HttpResponse(HttpResponse),
    MqttConnected,
    MqttPublishAcked,
    MqttTimeout,
}

/// Drives one wake cycle: read sensors, wait for attach, push over HTTP and
/// MQTT with bounded retries, sleep. Owns the cycle state, the watchdog, and
/// the collaborator ports; holds no ambient globals, so independent
/// instances coexist in tests.
pub struct PushSequencer {
    cycle: PushCycle,
    config: ConfigStore,
    watchdog: Watchdog,
    telemetry: PushTelemetry,
    log: CycleLog,
    mqtt_stage: MqttStage,
    ports: NodePorts,
}

impl PushSequencer {
    /// Creates a sequencer with the default watchdog deadline.
    pub fn new(config: ConfigStore, ports: NodePorts) -> Self {
        Self {
            cycle: PushCycle::default(),
            config,
            watchdog: Watchdog::new(PUSH_WATCHDOG_MS),
            telemetry: PushTelemetry::new(),
            log: CycleLog::default(),
            mqtt_stage: MqttStage::new(),
            ports,
        }
    }

    /// Replaces the watchdog (shorter deadlines in tests).
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn state(&self) -> PushState {
        self.cycle.state()
    }

    pub fn is_idle(&self) -> bool {
        self.cycle.state() == PushState::Idle
    }

    pub fn cycle(&self) -> &PushCycle {
        &self.cycle
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn telemetry(&self) -> &PushTelemetry {
        &self.telemetry
    }

    pub fn log(&self) -> &CycleLog {
        &self.log
    }

    /// True while the MQTT stage owns a live session handle.
    pub fn has_mqtt_session(&self) -> bool {
        self.mqtt_stage.has_session()
    }

    /// Starts a fresh cycle: resets the cycle state, arms the watchdog, and
    /// signals cycle start. Counters in telemetry persist across cycles.
    pub fn start_cycle(&mut self, now_ms: u64) {
        self.cycle = PushCycle {
            state: PushState::Init,
            ..PushCycle::default()
        };
        self.mqtt_stage = MqttStage::new();
        self.watchdog.arm(now_ms);
        self.ports.status.set(StatusSignal::Flash1);
        self.emit(now_ms, LogLevel::Info, "sequencer", "push cycle start");
    }

    /// Evaluates the current state exactly once and performs at most one
    /// transition. The host loop keeps ticking while the state is not
    /// `Idle`; `Idle` halts re-arming, terminating the cooperative loop.
    pub fn tick(&mut self, now_ms: u64) -> PushState {
        if self.cycle.state != PushState::Idle && self.watchdog.expired(now_ms) {
            self.force_sleep(now_ms);
            return self.cycle.state;
        }
        match self.cycle.state {
            PushState::Idle => {}
            PushState::Init => self.tick_init(now_ms),
            PushState::ReadSensors => self.tick_read_sensors(now_ms),
            PushState::AwaitNetwork => self.tick_await_network(),
            PushState::HttpSetup => {
                self.cycle.retry_count = 0;
                self.apply(Transition::Advance);
            }
            PushState::HttpSend => self.tick_http_send(now_ms),
            PushState::HttpBackoff => self.tick_backoff(),
            PushState::MqttSetup => {
                self.cycle.retry_count = 0;
                self.apply(Transition::Advance);
            }
            PushState::MqttSend => self.tick_mqtt_send(now_ms),
            PushState::MqttBackoff => self.tick_backoff(),
            PushState::Finish => self.tick_finish(now_ms),
        }
        self.cycle.state
    }

    /// Applies an asynchronous completion. Completions are serialized with
    /// ticks by the single-threaded host loop and never race a tick's own
    /// transition.
    pub fn handle_event(&mut self, now_ms: u64, event: PushEvent) {
        if self.cycle.state != PushState::Idle && self.watchdog.expired(now_ms) {
            self.force_sleep(now_ms);
            return;
        }
        match event {
            PushEvent::HttpResponse(response) => self.on_http_response(now_ms, response),
            PushEvent::MqttConnected => self.on_mqtt_connected(now_ms),
            PushEvent::MqttPublishAcked => self.on_mqtt_publish_acked(now_ms),
            PushEvent::MqttTimeout => self.on_mqtt_timeout(now_ms),
        }
    }

    fn tick_init(&mut self, now_ms: u64) {
        if !self.config.push_required() {
            self.emit(now_ms, LogLevel::Info, "sequencer", "no transport enabled");
            self.apply(Transition::FinishCycle);
            return;
        }
        self.ports.status.set(StatusSignal::Flash1);
        self.cycle.retry_count = 0;
        self.apply(Transition::Advance);
    }

    fn tick_read_sensors(&mut self, now_ms: u64) {
        match self.ports.sensors.read(self.cycle.retry_count) {
            Ok(snapshot) => {
                self.cycle.snapshot = Some(snapshot);
                self.apply(Transition::Advance);
            }
            Err(err) => {
                self.telemetry.sensor_read_failures_total += 1;
                self.cycle.retry_count += 1;
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "sensors",
                    &format!("sensor read failed: {err}"),
                );
                if self.cycle.retry_count >= SENSOR_READ_TOLERANCE {
                    self.emit(
                        now_ms,
                        LogLevel::Warn,
                        "sensors",
                        "read tolerance exhausted, sending best-effort readings",
                    );
                    self.apply(Transition::Advance);
                }
            }
        }
    }

    fn tick_await_network(&mut self) {
        if self.ports.network.attachment() == Attachment::AddressHeld {
            self.apply(Transition::Advance);
        }
    }

    fn tick_http_send(&mut self, now_ms: u64) {
        self.ports.status.set(StatusSignal::Flash2);
        self.cycle.redirects_remaining = PUSH_REDIRECT_MAX;
        let snapshot = self.cycle.effective_snapshot();
        let Some(request) = http_stage::build_request(&self.config.config().http, &snapshot)
        else {
            self.emit(now_ms, LogLevel::Info, "http", "http disabled, skipping");
            self.apply(Transition::AbandonTransport);
            return;
        };
        self.telemetry.http_attempts_total += 1;
        match self.ports.http.submit(request) {
            Ok(()) if self.cycle.retry_count < PUSH_RETRIES_MAX - 1 => {
                self.emit(now_ms, LogLevel::Info, "http", "push submitted");
                self.cycle.pending = Some(PendingOp::HttpExchange);
                self.apply(Transition::Advance);
            }
            Ok(()) => {
                // Final attempt: the response, if any, will be ignored.
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "http",
                    "retries exhausted, abandoning http",
                );
                self.cycle.pending = None;
                self.apply(Transition::AbandonTransport);
            }
            Err(err) => {
                self.telemetry.http_failures_total += 1;
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "http",
                    &format!("transport rejected request: {err}"),
                );
                self.apply(Transition::AbandonTransport);
            }
        }
    }

    fn tick_mqtt_send(&mut self, now_ms: u64) {
        self.ports.status.set(StatusSignal::Flash2);
        let mqtt_config = self.config.config().mqtt.clone();
        let hardware_id = self.config.config().hardware_id.clone();
        match self
            .mqtt_stage
            .begin(self.ports.mqtt.as_mut(), &mqtt_config, &hardware_id)
        {
            MqttBegin::Skipped => {
                self.emit(now_ms, LogLevel::Info, "mqtt", "mqtt disabled, skipping");
                self.apply(Transition::AbandonTransport);
            }
            MqttBegin::Submitted if self.cycle.retry_count < PUSH_RETRIES_MAX - 1 => {
                self.telemetry.mqtt_attempts_total += 1;
                self.emit(now_ms, LogLevel::Info, "mqtt", "connect initiated");
                self.cycle.pending = Some(PendingOp::MqttSession);
                self.apply(Transition::Advance);
            }
            MqttBegin::Submitted => {
                self.telemetry.mqtt_attempts_total += 1;
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "mqtt",
                    "retries exhausted, abandoning mqtt",
                );
                self.mqtt_stage.abandon();
                self.cycle.pending = None;
                self.apply(Transition::AbandonTransport);
            }
            MqttBegin::Rejected => {
                self.telemetry.mqtt_failures_total += 1;
                self.emit(now_ms, LogLevel::Warn, "mqtt", "connect rejected");
                self.apply(Transition::AbandonTransport);
            }
        }
    }

    fn tick_backoff(&mut self) {
        if self.cycle.error_delay_ticks == 0 {
            // Not armed: the pending completion drives the transition.
            return;
        }
        self.ports.status.set(StatusSignal::Flash3);
        self.cycle.error_delay_ticks -= 1;
        if self.cycle.error_delay_ticks == 0 {
            self.apply(Transition::RetryTransport);
        }
    }

    fn tick_finish(&mut self, now_ms: u64) {
        self.ports.status.set(StatusSignal::Off);
        self.emit(now_ms, LogLevel::Info, "sequencer", "push cycle complete");
        self.telemetry.cycles_completed_total += 1;
        if self.config.config().first_boot {
            self.ports.status.set(StatusSignal::Flash4);
            self.emit(
                now_ms,
                LogLevel::Info,
                "sequencer",
                "first boot, holding awake for reconfiguration",
            );
        } else {
            let seconds = self.config.sensor_interval_secs();
            self.emit(
                now_ms,
                LogLevel::Info,
                "sequencer",
                &format!("sleeping {seconds}s"),
            );
            self.ports.power.sleep(seconds);
        }
        self.apply(Transition::Reset);
    }

    fn on_http_response(&mut self, now_ms: u64, response: HttpResponse) {
        if self.cycle.pending != Some(PendingOp::HttpExchange)
            || self.cycle.state != PushState::HttpBackoff
        {
            self.emit(now_ms, LogLevel::Debug, "http", "stale response ignored");
            return;
        }
        self.cycle.pending = None;
        match http_stage::classify_response(&response) {
            HttpDisposition::Delivered { interval_override } => {
                if let Some(seconds) = interval_override {
                    if self.config.apply_interval_override(seconds) {
                        self.telemetry.interval_overrides_total += 1;
                        self.emit(
                            now_ms,
                            LogLevel::Info,
                            "http",
                            &format!("interval override applied: {seconds}s"),
                        );
                    } else {
                        self.emit(
                            now_ms,
                            LogLevel::Warn,
                            "http",
                            &format!("interval override {seconds}s out of range, ignored"),
                        );
                    }
                }
                self.emit(now_ms, LogLevel::Info, "http", "push delivered");
                self.apply(Transition::Advance);
            }
            HttpDisposition::Redirected { location } => {
                if self.cycle.redirects_remaining == 0 {
                    self.emit(now_ms, LogLevel::Warn, "http", "too many redirects");
                    self.apply(Transition::Advance);
                    return;
                }
                self.cycle.redirects_remaining -= 1;
                match location {
                    Some(url) => {
                        self.telemetry.redirects_followed_total += 1;
                        match self.ports.http.submit(HttpRequest::get(url)) {
                            Ok(()) => {
                                self.cycle.pending = Some(PendingOp::HttpExchange);
                            }
                            Err(err) => {
                                self.emit(
                                    now_ms,
                                    LogLevel::Warn,
                                    "http",
                                    &format!("redirect resubmission failed: {err}"),
                                );
                                self.arm_http_backoff();
                            }
                        }
                    }
                    None => {
                        self.emit(now_ms, LogLevel::Warn, "http", "redirect without location");
                        self.arm_http_backoff();
                    }
                }
            }
            HttpDisposition::Failed { status } => {
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "http",
                    &format!("push failed (status {status})"),
                );
                self.arm_http_backoff();
            }
        }
    }

    fn on_mqtt_connected(&mut self, now_ms: u64) {
        if self.cycle.pending != Some(PendingOp::MqttSession)
            || self.cycle.state != PushState::MqttBackoff
        {
            self.emit(now_ms, LogLevel::Debug, "mqtt", "stale connect ignored");
            return;
        }
        let mqtt_config = self.config.config().mqtt.clone();
        let snapshot = self.cycle.effective_snapshot();
        match self
            .mqtt_stage
            .on_connected(self.ports.mqtt.as_mut(), &mqtt_config, &snapshot)
        {
            Ok(()) => {
                self.emit(now_ms, LogLevel::Info, "mqtt", "connected, readings queued");
            }
            Err(err) => {
                self.cycle.pending = None;
                self.telemetry.mqtt_failures_total += 1;
                self.emit(
                    now_ms,
                    LogLevel::Warn,
                    "mqtt",
                    &format!("publish rejected: {err}"),
                );
                self.arm_mqtt_backoff();
            }
        }
    }

    fn on_mqtt_publish_acked(&mut self, now_ms: u64) {
        if self.cycle.pending != Some(PendingOp::MqttSession)
            || self.cycle.state != PushState::MqttBackoff
        {
            self.emit(now_ms, LogLevel::Debug, "mqtt", "stale ack ignored");
            return;
        }
        self.telemetry.publishes_acked_total += 1;
        if self.mqtt_stage.on_publish_acked() {
            self.mqtt_stage.teardown(self.ports.mqtt.as_mut());
            self.cycle.pending = None;
            self.emit(now_ms, LogLevel::Info, "mqtt", "all readings published");
            self.apply(Transition::Advance);
        }
    }

    fn on_mqtt_timeout(&mut self, now_ms: u64) {
        if self.cycle.pending != Some(PendingOp::MqttSession) {
            self.emit(now_ms, LogLevel::Debug, "mqtt", "stale timeout ignored");
            return;
        }
        self.mqtt_stage.teardown(self.ports.mqtt.as_mut());
        self.cycle.pending = None;
        self.telemetry.mqtt_failures_total += 1;
        self.emit(now_ms, LogLevel::Warn, "mqtt", "push failed");
        self.arm_mqtt_backoff();
    }

    fn arm_http_backoff(&mut self) {
        self.telemetry.http_failures_total += 1;
        self.cycle.error_delay_ticks = PUSH_ERROR_DELAY_TICKS;
        self.cycle.retry_count += 1;
    }

    fn arm_mqtt_backoff(&mut self) {
        self.cycle.error_delay_ticks = PUSH_ERROR_DELAY_TICKS;
        self.cycle.retry_count += 1;
    }

    /// Watchdog path: force the sleep transition regardless of state. An
    /// in-flight MQTT session is abandoned, not torn down.
    fn force_sleep(&mut self, now_ms: u64) {
        self.telemetry.watchdog_forced_total += 1;
        self.emit(
            now_ms,
            LogLevel::Warn,
            "watchdog",
            "deadline reached, forcing sleep",
        );
        self.mqtt_stage.abandon();
        self.cycle.pending = None;
        self.ports.status.set(StatusSignal::Off);
        self.ports.power.sleep(self.config.sensor_interval_secs());
        self.cycle.state = PushState::Idle;
    }

    fn apply(&mut self, kind: Transition) {
        self.cycle.state = transition(self.cycle.state, kind);
    }

    fn emit(&mut self, now_ms: u64, level: LogLevel, module: &str, message: &str) {
        let state = self.cycle.state.as_str();
        self.log.log(now_ms, level, module, state, message);
    }
}
