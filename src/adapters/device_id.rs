//! Device identity derived from the ESP32 factory MAC address.
//!
//! Each deployed board is listed in a static provisioning table keyed by
//! its station MAC.  The match yields the room, topic and whether a fuel
//! gauge is fitted; unknown boards fall back to
//! [`DeviceIdentity::fallback`] so they still report somewhere.

use core::fmt::Write;

use crate::config::DeviceIdentity;
use crate::power::buffer::DeviceId;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Provisioned boards.
pub const KNOWN_DEVICES: [(MacAddress, DeviceIdentity); 3] = [
    (
        [0xEC, 0x62, 0x60, 0xBC, 0xE8, 0x50],
        DeviceIdentity {
            name: "living room",
            device_id: DeviceId(4),
            room_id: "livingroom",
            door_id: "livingroomdoor",
            topic: "1/4/data",
            supports_battery: true,
        },
    ),
    (
        [0xEC, 0x62, 0x60, 0xBC, 0xE8, 0x18],
        DeviceIdentity {
            name: "kitchen",
            device_id: DeviceId(5),
            room_id: "kitchen",
            door_id: "kitchendoor",
            topic: "1/5/data",
            supports_battery: true,
        },
    ),
    (
        [0x94, 0x3C, 0xC6, 0xD1, 0x42, 0x2C],
        DeviceIdentity {
            name: "bathroom",
            device_id: DeviceId(3),
            room_id: "bathroom",
            door_id: "bathroomdoor",
            topic: "1/3/data",
            // Mains-powered, no gauge fitted.
            supports_battery: false,
        },
    ),
];

/// Read the station MAC from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        );
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Look the board up in the provisioning table.
pub fn resolve(mac: &MacAddress) -> DeviceIdentity {
    KNOWN_DEVICES
        .iter()
        .find(|(known, _)| known == mac)
        .map_or_else(DeviceIdentity::fallback, |(_, identity)| *identity)
}

/// `aa:bb:cc:dd:ee:ff`, for logs and the MQTT client id.
pub fn mac_string(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::new();
    for (i, b) in mac.iter().enumerate() {
        let sep = if i == 0 { "" } else { ":" };
        let _ = write!(s, "{sep}{b:02x}");
    }
    s
}

/// Broker client id: `roomsense-ddeeff` (last 3 MAC bytes).
pub fn client_id(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::new();
    let _ = write!(name, "roomsense-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
