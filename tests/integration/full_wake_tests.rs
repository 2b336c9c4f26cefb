//! Full-wake flushing: batched delivery, retry after failures, battery
//! telemetry and the bounded waits that keep every cycle ending in sleep.

use core::time::Duration;

use roomsense::adapters::device_id::KNOWN_DEVICES;
use roomsense::app::events::AppEvent;
use roomsense::config::NodeConfig;
use roomsense::error::{Error, SensorReadError};
use roomsense::power::{Decision, EscalationReason};

use super::mock_hw::{Bench, WALL_ORIGIN, door, motion, power_on, timer};

fn capacity(n: u16) -> NodeConfig {
    NodeConfig {
        buffer_capacity: n,
        ..NodeConfig::default()
    }
}

fn millis(secs: u64) -> u64 {
    (WALL_ORIGIN + Duration::from_secs(secs)).as_millis() as u64
}

// ── Buffer overflow ───────────────────────────────────────────

#[test]
fn fourth_motion_at_capacity_three_flushes_all_in_order() {
    let mut bench = Bench::new(capacity(3));
    bench.wake(power_on(), 0);

    for (i, t) in [10, 20, 30].into_iter().enumerate() {
        let cycle = bench.wake(motion(), t);
        assert!(!cycle.is_escalated(), "motion {} must sleep", i + 1);
        assert_eq!(bench.retained().events.len(), i + 1);
    }
    assert!(bench.retained().events.is_full());

    let cycle = bench.wake(motion(), 40);
    let Decision::Escalated(e) = &cycle.decision else {
        panic!("fourth motion must escalate");
    };
    assert_eq!(e.reason, EscalationReason::BufferFull);
    assert_eq!(cycle.report.unwrap().delivered, 4);
    assert!(bench.retained().events.is_empty());

    let body = bench.published().pop().unwrap();
    let values = body["sensors"][0]["values"].as_array().unwrap();
    let stamps: Vec<u64> = values.iter().map(|v| v["timestamp"].as_u64().unwrap()).collect();
    assert_eq!(stamps, vec![millis(10), millis(20), millis(30), millis(40)]);
    assert!(values.iter().all(|v| v["roomID"] == "livingroom"));
    assert!(values.iter().all(|v| v.get("clockSynced").is_none()));
}

// ── Connectivity loss ─────────────────────────────────────────

#[test]
fn sustained_outage_escalates_every_cycle_until_flushed() {
    let mut bench = Bench::new(capacity(3));
    bench.wake(power_on(), 0);
    bench.offline();
    for t in [10, 20, 30] {
        bench.wake(motion(), t);
    }

    for t in [40, 50] {
        let cycle = bench.wake(motion(), t);
        assert!(cycle.is_escalated());
        let report = cycle.report.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.retained, 3);
        assert!(report.faults.contains(&Error::ConnectTimedOut));
        assert!(report.faults.contains(&Error::BufferFull));
    }
    assert_eq!(bench.sink.count(|e| matches!(e, AppEvent::EventDropped(_))), 2);
    // The network was torn down each time; the node still slept.
    assert_eq!(bench.sleep.sim().suspended.len(), 6);

    bench.online();
    let cycle = bench.wake(motion(), 60);
    assert_eq!(cycle.report.unwrap().delivered, 4);
    assert!(bench.retained().events.is_empty());
}

#[test]
fn unacknowledged_publish_keeps_buffer_for_next_escalation() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.wake(power_on(), 0);
    bench.wake(motion(), 10);
    bench.wake(motion(), 20);

    bench.mqtt.sim_mut().acks = false;
    let cycle = bench.wake(door(), 30);
    let report = cycle.report.unwrap();
    assert_eq!(report.delivered, 0);
    assert!(report.faults.contains(&Error::PublishFailed));
    // Buffered motions stay, the fresh door event joins them.
    assert_eq!(bench.retained().events.len(), 3);

    bench.mqtt.sim_mut().acks = true;
    let cycle = bench.wake(door(), 40);
    assert_eq!(cycle.report.unwrap().delivered, 4);
    assert!(bench.retained().events.is_empty());
}

#[test]
fn no_sntp_sync_still_delivers_unsynced_events() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.seed_retained();
    bench.wake(motion(), 5);

    bench.sntp_available = false;
    let report = bench.wake(door(), 20).report.unwrap();
    assert!(!report.anchor_established);
    assert!(report.faults.contains(&Error::ConnectTimedOut));
    assert_eq!(report.delivered, 2);
    assert!(!bench.retained().clock.is_established());

    let body = bench.published().pop().unwrap();
    for group in 0..2 {
        let value = &body["sensors"][group]["values"][0];
        assert_eq!(value["timestamp"], 0);
        assert_eq!(value["clockSynced"], false);
    }
}

#[test]
fn events_before_first_anchor_are_flagged_in_payload() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.seed_retained();
    bench.wake(motion(), 5);
    let cycle = bench.wake(door(), 20);
    assert!(cycle.report.unwrap().anchor_established);

    let body = bench.published().pop().unwrap();
    assert_eq!(body["sensors"][0]["values"][0]["clockSynced"], false);
    // The door event is recorded in the minimal wake, still before the anchor.
    assert_eq!(body["sensors"][1]["values"][0]["clockSynced"], false);

    // From now on events carry derived wall time.
    bench.wake(door(), 40);
    let body = bench.published().pop().unwrap();
    assert_eq!(body["sensors"][0]["values"][0]["timestamp"], millis(40));
    assert!(body["sensors"][0]["values"][0].get("clockSynced").is_none());
}

// ── Battery telemetry ─────────────────────────────────────────

#[test]
fn gauge_failure_retries_until_a_reading_is_published() {
    let config = NodeConfig {
        battery_report_interval_secs: 180,
        ..NodeConfig::default()
    };
    let mut bench = Bench::new(config);
    bench.wake(power_on(), 0);

    bench.gauge.result = Err(SensorReadError::Crc);
    let cycle = bench.wake(timer(), 200);
    let report = cycle.report.unwrap();
    assert!(!report.battery_reported);
    assert!(report.faults.contains(&Error::SensorRead(SensorReadError::Crc)));
    assert_eq!(bench.retained().last_battery_report_marker, Duration::ZERO);

    // Still due on the next timer wake.
    assert!(bench.wake(timer(), 260).is_escalated());

    bench.gauge.result = Ok(roomsense::app::ports::BatteryReading {
        millivolts: 3_650,
        soc_percent: 40,
    });
    assert!(bench.wake(timer(), 320).report.unwrap().battery_reported);
    assert_eq!(bench.retained().last_battery_report_marker, Duration::from_secs(320));
    assert!(!bench.wake(timer(), 400).is_escalated());

    let body = bench.published().pop().unwrap();
    assert_eq!(body["sensors"][0]["name"], "battery");
    assert_eq!(body["sensors"][0]["values"][0]["soc"], 40);
    assert_eq!(body["sensors"][0]["values"][0]["timestamp"], millis(320));
}

#[test]
fn node_without_gauge_never_reports_battery() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.identity = KNOWN_DEVICES[2].1;
    let cycle = bench.wake(power_on(), 0);
    assert!(!cycle.report.unwrap().battery_reported);
    assert_eq!(bench.gauge.reads, 0);
    assert!(bench.topics().is_empty());

    // Long past any interval: only the timer keep-alive.
    assert!(!bench.wake(timer(), 10_000).is_escalated());
}

// ── Bounded waits ─────────────────────────────────────────────

#[test]
fn waits_for_held_sources_before_arming() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.wake(power_on(), 0);
    bench.sleep.sim_mut().active_polls = 3;
    bench.wake(door(), 30);
    assert_eq!(bench.sleep.sim().delays, vec![Duration::from_secs(1); 3]);
    assert_eq!(bench.sink.count(|e| matches!(e, AppEvent::SourcesStillActive { .. })), 0);
}

#[test]
fn stuck_source_wait_is_bounded() {
    let mut bench = Bench::new(NodeConfig::default());
    bench.wake(power_on(), 0);
    bench.sleep.sim_mut().active_polls = u32::MAX;
    bench.wake(door(), 30);
    assert_eq!(bench.sleep.sim().delays.len(), 30);
    assert_eq!(bench.sink.count(|e| matches!(e, AppEvent::SourcesStillActive { .. })), 1);
    assert_eq!(bench.sleep.sim().suspended.len(), 2);
}
