//! GPIO / peripheral pin assignments for the RoomSense sensor board (ESP32).
//!
//! Single source of truth for the board defaults.  The external wake
//! sources can be re-mapped per deployment through [`NodeConfig`]
//! (`motion_pin`, `door_pin`); everything else is fixed by the board.
//!
//! [`NodeConfig`]: crate::config::NodeConfig

// ---------------------------------------------------------------------------
// External wake sources (RTC domain, EXT1 "any high")
// ---------------------------------------------------------------------------

/// PIR motion sensor output, active HIGH with external pull-down.
pub const PIR_GPIO: u8 = 27;
/// Magnetic reed switch on the door, HIGH while the door is open.
pub const DOOR_CONTACT_GPIO: u8 = 33;

/// GPIOs that are routed to the RTC IO mux on the ESP32 and can
/// therefore act as EXT1 wake sources during deep sleep.
pub const RTC_CAPABLE_GPIOS: [u8; 18] = [
    0, 2, 4, 12, 13, 14, 15, 25, 26, 27, 32, 33, 34, 35, 36, 37, 38, 39,
];

/// Returns `true` if `gpio` can be used as a deep-sleep wake source.
pub fn is_rtc_capable(gpio: u8) -> bool {
    RTC_CAPABLE_GPIOS.contains(&gpio)
}

/// EXT1 status / enable mask bit for a GPIO.
pub const fn wake_mask(gpio: u8) -> u64 {
    1u64 << gpio
}

// ---------------------------------------------------------------------------
// I²C bus (LC709203F fuel gauge)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// The LC709203F tolerates up to 400 kHz; 100 kHz keeps the bus robust
/// on the long flex cable to the battery pack.
pub const I2C_BAUD_HZ: u32 = 100_000;
