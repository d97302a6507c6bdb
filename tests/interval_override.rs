mod common;

use common::{custom_http_config, tick_n, Harness};
use sentra::{HttpResponse, PushEvent, PushState};

fn response_with_header(header_block: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: String::new(),
        header_block: header_block.to_string(),
    }
}

fn drive_to_response(harness: &Harness) -> (sentra::PushSequencer, u64) {
    let mut sequencer = harness.sequencer(custom_http_config());
    let mut now = 0u64;
    sequencer.start_cycle(now);
    tick_n(&mut sequencer, &mut now, 5);
    assert_eq!(sequencer.state(), PushState::HttpBackoff);
    (sequencer, now)
}

#[test]
fn override_within_range_updates_the_interval() {
    let harness = Harness::new();
    let (mut sequencer, mut now) = drive_to_response(&harness);
    sequencer.handle_event(
        now,
        PushEvent::HttpResponse(response_with_header("X-Interval-Override: 45\r\n")),
    );
    assert_eq!(sequencer.config().sensor_interval_secs(), 45);
    assert_eq!(sequencer.telemetry().interval_overrides_total, 1);

    // The cycle then sleeps for the overridden interval.
    tick_n(&mut sequencer, &mut now, 4);
    assert!(sequencer.is_idle());
    assert_eq!(harness.sleeps.borrow().as_slice(), &[45]);
}

#[test]
fn override_below_minimum_is_ignored() {
    let harness = Harness::new();
    let (mut sequencer, now) = drive_to_response(&harness);
    sequencer.handle_event(
        now,
        PushEvent::HttpResponse(response_with_header("X-Interval-Override: 20\r\n")),
    );
    assert_eq!(sequencer.config().sensor_interval_secs(), 300);
    assert_eq!(sequencer.telemetry().interval_overrides_total, 0);
    assert_eq!(sequencer.state(), PushState::MqttSetup);
}

#[test]
fn override_above_maximum_is_ignored() {
    let harness = Harness::new();
    let (mut sequencer, now) = drive_to_response(&harness);
    sequencer.handle_event(
        now,
        PushEvent::HttpResponse(response_with_header("X-Interval-Override: 99999\r\n")),
    );
    assert_eq!(sequencer.config().sensor_interval_secs(), 300);
    assert_eq!(sequencer.state(), PushState::MqttSetup);
}

#[test]
fn non_numeric_override_is_ignored() {
    let harness = Harness::new();
    let (mut sequencer, now) = drive_to_response(&harness);
    sequencer.handle_event(
        now,
        PushEvent::HttpResponse(response_with_header("X-Interval-Override: soon\r\n")),
    );
    assert_eq!(sequencer.config().sensor_interval_secs(), 300);
    assert_eq!(sequencer.state(), PushState::MqttSetup);
}

#[test]
fn header_name_matches_case_insensitively() {
    // Transports that lowercase header names still trigger the override.
    let harness = Harness::new();
    let (mut sequencer, now) = drive_to_response(&harness);
    sequencer.handle_event(
        now,
        PushEvent::HttpResponse(response_with_header("x-interval-override: 120\r\n")),
    );
    assert_eq!(sequencer.config().sensor_interval_secs(), 120);
}
