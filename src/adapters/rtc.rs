//! RTC domain adapter: low-power clock, wake reason and retained memory.
//!
//! Implements [`LowPowerClock`] and [`RetainedMemory`], and reads the
//! hardware wake reason into a [`WakeReading`] for the classifier.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_rtc_get_time_us`, `esp_reset_reason`,
//!   `esp_sleep_get_wakeup_cause` and a `.rtc.data` static that survives
//!   deep sleep.
//! - **all other targets**: a scriptable simulation for host-side tests.

use core::time::Duration;

use log::debug;

use crate::app::ports::{LowPowerClock, RetainedMemory};
use crate::power::state::RetainedImage;
use crate::power::wake::{HardwareCause, ResetKind, WakeReading};

// ───────────────────────────────────────────────────────────────
// Retained image in RTC slow memory
// ───────────────────────────────────────────────────────────────

/// Lives in RTC slow memory.  Initialised from flash on power-on, left
/// untouched across deep sleep.
#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc.data")]
static mut RETAINED: RetainedImage = RetainedImage::cold();

// ───────────────────────────────────────────────────────────────
// RtcAdapter
// ───────────────────────────────────────────────────────────────

pub struct RtcAdapter {
    #[cfg(not(target_os = "espidf"))]
    sim: SimRtc,
}

/// Host-side stand-in for the RTC domain.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimRtc {
    pub now: Duration,
    pub reading: Option<WakeReading>,
    pub retained: Option<RetainedImage>,
}

impl Default for RtcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim: SimRtc::default(),
        }
    }

    /// Raw wake reason for this boot.
    #[cfg(target_os = "espidf")]
    pub fn reading(&self) -> WakeReading {
        use esp_idf_svc::sys;

        let reset = match unsafe { sys::esp_reset_reason() } {
            sys::esp_reset_reason_t_ESP_RST_POWERON => ResetKind::PowerOn,
            sys::esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetKind::DeepSleep,
            _ => ResetKind::Other,
        };
        let cause = match unsafe { sys::esp_sleep_get_wakeup_cause() } {
            sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => HardwareCause::Undefined,
            sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => HardwareCause::Timer,
            sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1 => HardwareCause::ExternalLevel,
            other => HardwareCause::Other(other),
        };
        let external_status = if cause == HardwareCause::ExternalLevel {
            unsafe { sys::esp_sleep_get_ext1_wakeup_status() }
        } else {
            0
        };
        let reading = WakeReading {
            reset,
            cause,
            external_status,
        };
        debug!("RTC: {:?}", reading);
        reading
    }

    /// Raw wake reason for this boot.  Defaults to a power-on reset.
    #[cfg(not(target_os = "espidf"))]
    pub fn reading(&self) -> WakeReading {
        let reading = self.sim.reading.unwrap_or(WakeReading {
            reset: ResetKind::PowerOn,
            cause: HardwareCause::Undefined,
            external_status: 0,
        });
        debug!("RTC(sim): {:?}", reading);
        reading
    }

    /// Simulation handle for tests.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimRtc {
        &mut self.sim
    }
}

// ───────────────────────────────────────────────────────────────
// LowPowerClock
// ───────────────────────────────────────────────────────────────

impl LowPowerClock for RtcAdapter {
    /// The RTC timer keeps counting through deep sleep.
    #[cfg(target_os = "espidf")]
    fn now(&self) -> Duration {
        Duration::from_micros(unsafe { esp_idf_svc::sys::esp_rtc_get_time_us() })
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> Duration {
        self.sim.now
    }
}

// ───────────────────────────────────────────────────────────────
// RetainedMemory
// ───────────────────────────────────────────────────────────────

impl RetainedMemory for RtcAdapter {
    #[cfg(target_os = "espidf")]
    fn load(&self) -> Option<RetainedImage> {
        // Single-threaded: only the main task touches RETAINED.
        let image = unsafe { *(&raw const RETAINED) };
        image.is_valid().then_some(image)
    }

    #[cfg(not(target_os = "espidf"))]
    fn load(&self) -> Option<RetainedImage> {
        self.sim.retained.filter(RetainedImage::is_valid)
    }

    #[cfg(target_os = "espidf")]
    fn store(&mut self, image: &RetainedImage) {
        unsafe { *(&raw mut RETAINED) = *image };
        debug!("RTC: retained {} events", image.state.events.len());
    }

    #[cfg(not(target_os = "espidf"))]
    fn store(&mut self, image: &RetainedImage) {
        self.sim.retained = Some(*image);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
