//! Broker payload encoding.
//!
//! One JSON document per publish, grouped by sensor:
//!
//! ```text
//! {"sensors":[
//!   {"name":"PIR","values":[{"timestamp":1700000000000,"roomID":"livingroom"}, ...]},
//!   {"name":"MagneticSwitch","values":[...]}
//! ]}
//! ```
//!
//! Groups appear in order of their first event; values keep arrival
//! order within a group.  Timestamps are Unix milliseconds.

use core::time::Duration;

use serde::Serialize;

use crate::config::DeviceIdentity;
use crate::error::Error;
use crate::power::buffer::{EventSource, SensorEvent};

use super::ports::BatteryReading;

#[derive(Serialize)]
struct Envelope<V> {
    sensors: Vec<SensorGroup<V>>,
}

#[derive(Serialize)]
struct SensorGroup<V> {
    name: &'static str,
    values: Vec<V>,
}

#[derive(Serialize)]
struct EventValue<'a> {
    timestamp: u64,
    #[serde(rename = "roomID")]
    room_id: &'a str,
    #[serde(rename = "clockSynced", skip_serializing_if = "is_true")]
    clock_synced: bool,
}

#[derive(Serialize)]
struct BatteryValue {
    timestamp: u64,
    voltage: f32,
    soc: u8,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(b: &bool) -> bool {
    *b
}

fn millis(t: Duration) -> u64 {
    t.as_millis() as u64
}

/// Encode a batch of sensor events.  `events` must be non-empty to be useful
/// but an empty slice encodes to `{"sensors":[]}`.
pub fn events(events: &[SensorEvent], identity: &DeviceIdentity) -> Result<Vec<u8>, Error> {
    let mut groups: Vec<(EventSource, SensorGroup<EventValue<'_>>)> = Vec::new();
    for event in events {
        let room_id = match event.source {
            EventSource::Motion => identity.room_id,
            EventSource::DoorContact => identity.door_id,
        };
        let value = EventValue {
            timestamp: millis(event.timestamp),
            room_id,
            clock_synced: event.clock_synced,
        };
        match groups.iter_mut().find(|(s, _)| *s == event.source) {
            Some((_, group)) => group.values.push(value),
            None => groups.push((
                event.source,
                SensorGroup {
                    name: event.source.sensor_name(),
                    values: vec![value],
                },
            )),
        }
    }
    let envelope = Envelope {
        sensors: groups.into_iter().map(|(_, g)| g).collect(),
    };
    serde_json::to_vec(&envelope).map_err(|_| Error::PublishFailed)
}

/// Encode one battery sample taken at `timestamp`.
pub fn battery(reading: &BatteryReading, timestamp: Duration) -> Result<Vec<u8>, Error> {
    let envelope = Envelope {
        sensors: vec![SensorGroup {
            name: "battery",
            values: vec![BatteryValue {
                timestamp: millis(timestamp),
                voltage: reading.volts(),
                soc: reading.soc_percent,
            }],
        }],
    };
    serde_json::to_vec(&envelope).map_err(|_| Error::PublishFailed)
}
