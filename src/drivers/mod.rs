//! Low-level peripheral drivers: RTC wake inputs and deep-sleep entry.

pub mod deep_sleep;
pub mod rtc_gpio;
