//! Node configuration parameters
//!
//! All tunable parameters for a RoomSense node.
//! Values can be overridden via NVS (non-volatile storage).  Secrets
//! (Wi-Fi passphrase, broker token) are kept out of this struct and
//! live in the encrypted `auth` namespace instead.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pins;
use crate::power::buffer::DeviceId;
use crate::power::wake::SourceMasks;

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Sleep cycle ---
    /// Periodic keep-alive timer wake (seconds)
    pub wake_interval_secs: u32,
    /// Wakes closer than this to the previous one are bounces (seconds)
    pub debounce_window_secs: u32,
    /// Short delay before re-sleeping after a bounce (milliseconds)
    pub settle_delay_ms: u32,

    // --- Reporting ---
    /// Battery telemetry interval (seconds)
    pub battery_report_interval_secs: u32,
    /// Number of motion events held in RTC memory before escalation
    pub buffer_capacity: u16,

    // --- Full wake ---
    /// Upper bound on each network / time / broker bring-up step (seconds)
    pub connect_timeout_secs: u32,
    /// Upper bound on waiting for the sensors to de-assert (seconds)
    pub source_idle_timeout_secs: u32,

    // --- Wake sources ---
    /// RTC GPIO wired to the PIR sensor
    pub motion_pin: u8,
    /// RTC GPIO wired to the door reed switch
    pub door_pin: u8,

    // --- Network ---
    pub wifi_ssid: heapless::String<32>,
    pub sntp_server: heapless::String<64>,
    pub broker_host: heapless::String<64>,
    pub broker_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Sleep cycle
            wake_interval_secs: 60,
            debounce_window_secs: 3,
            settle_delay_ms: 1000,

            // Reporting
            battery_report_interval_secs: 120,
            buffer_capacity: 10,

            // Full wake
            connect_timeout_secs: 10,
            source_idle_timeout_secs: 30,

            // Wake sources
            motion_pin: pins::PIR_GPIO,
            door_pin: pins::DOOR_CONTACT_GPIO,

            // Network
            wifi_ssid: fixed_str("roomsense"),
            sntp_server: fixed_str("pool.ntp.org"),
            broker_host: fixed_str("mqtt.local"),
            broker_port: 1883,
        }
    }
}

impl NodeConfig {
    pub fn wake_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.wake_interval_secs))
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.debounce_window_secs))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.settle_delay_ms))
    }

    pub fn battery_report_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.battery_report_interval_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }

    pub fn source_idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.source_idle_timeout_secs))
    }

    /// EXT1 status bits for each configured wake source.
    pub fn source_masks(&self) -> SourceMasks {
        SourceMasks {
            motion: pins::wake_mask(self.motion_pin),
            door: pins::wake_mask(self.door_pin),
        }
    }
}

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

/// Per-board identity, resolved once at full boot from the factory MAC.
/// Immutable for the rest of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: &'static str,
    pub device_id: DeviceId,
    /// Room tag reported with motion events.
    pub room_id: &'static str,
    /// Room tag reported with door events.
    pub door_id: &'static str,
    /// MQTT topic all payloads are published to.
    pub topic: &'static str,
    /// Whether an LC709203F gauge is fitted.
    pub supports_battery: bool,
}

impl DeviceIdentity {
    /// Identity for boards missing from the provisioning table.
    pub const fn fallback() -> Self {
        Self {
            name: "unknown",
            device_id: DeviceId(0),
            room_id: "unknown",
            door_id: "unknowndoor",
            topic: "unknown/topic",
            supports_battery: true,
        }
    }
}

/// Build a fixed-capacity string, truncating on overflow.
fn fixed_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
