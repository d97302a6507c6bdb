mod common;

use common::{custom_http_config, mqtt_only_config, tick_n, Harness};
use sentra::{HttpResponse, PushEvent, PushState, Watchdog, PUSH_WATCHDOG_MS};

#[test]
fn deadline_math_is_absolute() {
    let mut watchdog = Watchdog::new(1_000);
    assert!(!watchdog.expired(u64::MAX));
    watchdog.arm(5);
    assert_eq!(watchdog.deadline_ms(), Some(1_005));
    assert!(!watchdog.expired(1_004));
    assert!(watchdog.expired(1_005));
}

#[test]
fn forces_sleep_when_stuck_waiting_for_network() {
    let harness = Harness::new();
    harness.attached.set(false);
    let mut sequencer = harness.sequencer(custom_http_config());
    let mut now = 0u64;

    sequencer.start_cycle(now);
    // The attach poll never succeeds; only the watchdog ends the cycle.
    tick_n(&mut sequencer, &mut now, 400);
    assert!(sequencer.is_idle());
    assert!(now >= PUSH_WATCHDOG_MS);
    assert_eq!(harness.sleeps.borrow().as_slice(), &[300]);
    assert_eq!(sequencer.telemetry().watchdog_forced_total, 1);
    assert_eq!(harness.http_request_count(), 0);
}

#[test]
fn shortened_deadline_applies_through_builder() {
    let harness = Harness::new();
    harness.attached.set(false);
    let store = sentra::ConfigStore::new(custom_http_config()).expect("config must validate");
    let mut sequencer =
        sentra::PushSequencer::new(store, harness.ports()).with_watchdog(Watchdog::new(500));
    let mut now = 0u64;

    sequencer.start_cycle(now);
    tick_n(&mut sequencer, &mut now, 6);
    assert!(sequencer.is_idle());
    assert_eq!(sequencer.telemetry().watchdog_forced_total, 1);
}

#[test]
fn abandons_in_flight_mqtt_session_without_teardown() {
    let harness = Harness::new();
    let mut sequencer = harness.sequencer(mqtt_only_config());
    let mut now = 0u64;

    sequencer.start_cycle(now);
    tick_n(&mut sequencer, &mut now, 7);
    sequencer.handle_event(now, PushEvent::MqttConnected);
    assert!(sequencer.has_mqtt_session());

    // Deadline passes with publishes still outstanding: the session is
    // abandoned, never disconnected.
    now = PUSH_WATCHDOG_MS + 100;
    sequencer.tick(now);
    assert!(sequencer.is_idle());
    assert!(!sequencer.has_mqtt_session());
    assert_eq!(harness.mqtt.borrow().disconnects, 0);
    assert_eq!(harness.sleeps.borrow().as_slice(), &[300]);
}

#[test]
fn expired_deadline_preempts_event_handling() {
    let harness = Harness::new();
    let mut sequencer = harness.sequencer(custom_http_config());
    let mut now = 0u64;

    sequencer.start_cycle(now);
    tick_n(&mut sequencer, &mut now, 5);
    assert_eq!(sequencer.state(), PushState::HttpBackoff);

    let response = HttpResponse {
        status: 200,
        body: String::new(),
        header_block: "X-Interval-Override: 45\r\n".to_string(),
    };
    sequencer.handle_event(PUSH_WATCHDOG_MS + 100, PushEvent::HttpResponse(response));
    assert!(sequencer.is_idle());
    assert_eq!(sequencer.telemetry().watchdog_forced_total, 1);
    // The late response was never processed.
    assert_eq!(sequencer.config().sensor_interval_secs(), 300);
    assert_eq!(sequencer.telemetry().cycles_completed_total, 0);
}
