//! RTC GPIO setup for the wake sources.
//!
//! The motion and door pins are routed to the RTC IO mux as inputs with
//! the internal pull-down enabled, so they stay defined while the digital
//! domain is powered off and EXT1 can sample them.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcGpioError {
    NotRtcCapable(u8),
    ConfigFailed { gpio: u8, rc: i32 },
}

impl core::fmt::Display for RtcGpioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotRtcCapable(gpio) => write!(f, "GPIO{} cannot wake from deep sleep", gpio),
            Self::ConfigFailed { gpio, rc } => write!(f, "RTC GPIO{} config failed (rc={})", gpio, rc),
        }
    }
}

// ── Setup ─────────────────────────────────────────────────────

/// Configure every pin in `gpios` as a pulled-down RTC input.
pub fn configure_wake_inputs(gpios: impl IntoIterator<Item = u8>) -> Result<usize, RtcGpioError> {
    let mut configured = 0;
    for gpio in gpios {
        if !pins::is_rtc_capable(gpio) {
            return Err(RtcGpioError::NotRtcCapable(gpio));
        }
        configure_one(gpio)?;
        configured += 1;
    }
    log::debug!("rtc_gpio: {} wake inputs configured", configured);
    Ok(configured)
}

#[cfg(target_os = "espidf")]
fn configure_one(gpio: u8) -> Result<(), RtcGpioError> {
    let num = gpio_num_t::from(gpio);
    let check = |rc: esp_err_t| {
        if rc == ESP_OK {
            Ok(())
        } else {
            Err(RtcGpioError::ConfigFailed { gpio, rc })
        }
    };
    // SAFETY: plain register configuration on a validated RTC pin.
    unsafe {
        check(rtc_gpio_init(num))?;
        check(rtc_gpio_set_direction(num, rtc_gpio_mode_t_RTC_GPIO_MODE_INPUT_ONLY))?;
        check(rtc_gpio_pulldown_en(num))?;
        check(rtc_gpio_pullup_dis(num))?;
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn configure_one(_gpio: u8) -> Result<(), RtcGpioError> {
    Ok(())
}

/// Current level of an RTC input.
#[cfg(target_os = "espidf")]
pub fn is_high(gpio: u8) -> bool {
    // SAFETY: read-only register access.
    unsafe { rtc_gpio_get_level(gpio_num_t::from(gpio)) != 0 }
}

/// GPIO numbers whose bit is set in `mask`.
pub fn gpios_in(mask: u64) -> impl Iterator<Item = u8> {
    (0u8..64).filter(move |bit| mask & (1u64 << bit) != 0)
}
