//! Deep-sleep entry.
//!
//! Implements [`SleepControl`]: samples the wake-source levels, blocks for
//! short settle delays and finally arms EXT1 (any-high) plus the RTC timer
//! before calling `esp_deep_sleep_start`.  On the device `suspend` never
//! returns; the next boot starts again at `main`.

use core::time::Duration;

use log::info;
#[cfg(any(target_os = "espidf", test))]
use log::warn;

use crate::app::ports::SleepControl;
use crate::power::policy::SleepPlan;

pub struct DeepSleepDriver {
    #[cfg(not(target_os = "espidf"))]
    sim: SimSleep,
}

/// Records what the device would have done.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimSleep {
    /// Polls that still report a source high before it reads low.
    pub active_polls: u32,
    pub delays: Vec<Duration>,
    pub suspended: Vec<SleepPlan>,
}

impl Default for DeepSleepDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeepSleepDriver {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim: SimSleep::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimSleep {
        &self.sim
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimSleep {
        &mut self.sim
    }
}

/// Log every arming step whose return code is not `ok` and count them.
/// Sleep is entered regardless; a failed step only loses that wake source.
#[cfg(any(target_os = "espidf", test))]
fn failed_arming_steps(steps: &[(&str, i32)], ok: i32) -> usize {
    let mut failed = 0;
    for &(step, rc) in steps {
        if rc != ok {
            warn!("deep_sleep: arming {} failed (rc={})", step, rc);
            failed += 1;
        }
    }
    failed
}

// ───────────────────────────────────────────────────────────────
// SleepControl (device)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SleepControl for DeepSleepDriver {
    fn sources_active(&mut self, mask: u64) -> bool {
        super::rtc_gpio::gpios_in(mask).any(super::rtc_gpio::is_high)
    }

    fn delay(&mut self, duration: Duration) {
        esp_idf_hal::delay::FreeRtos::delay_ms(duration.as_millis() as u32);
    }

    fn suspend(&mut self, plan: &SleepPlan) {
        use esp_idf_svc::sys::*;

        info!(
            "deep_sleep: timer={}s ext1=0x{:x}",
            plan.timer.as_secs(),
            plan.external_mask
        );
        // SAFETY: called last on the main task; nothing runs after
        // esp_deep_sleep_start.
        unsafe {
            // Keep RTC pull-downs powered so EXT1 sees a defined low.
            let pd = esp_sleep_pd_config(
                esp_sleep_pd_domain_t_ESP_PD_DOMAIN_RTC_PERIPH,
                esp_sleep_pd_option_t_ESP_PD_OPTION_ON,
            );
            let ext1 = if plan.external_mask != 0 {
                esp_sleep_enable_ext1_wakeup(
                    plan.external_mask,
                    esp_sleep_ext1_wakeup_mode_t_ESP_EXT1_WAKEUP_ANY_HIGH,
                )
            } else {
                ESP_OK
            };
            let timer = esp_sleep_enable_timer_wakeup(plan.timer.as_micros() as u64);
            failed_arming_steps(&[("rtc_periph", pd), ("ext1", ext1), ("timer", timer)], ESP_OK);
            esp_deep_sleep_start();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// SleepControl (simulation)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl SleepControl for DeepSleepDriver {
    fn sources_active(&mut self, mask: u64) -> bool {
        if mask == 0 || self.sim.active_polls == 0 {
            return false;
        }
        self.sim.active_polls -= 1;
        true
    }

    fn delay(&mut self, duration: Duration) {
        self.sim.delays.push(duration);
    }

    fn suspend(&mut self, plan: &SleepPlan) {
        info!(
            "deep_sleep(sim): timer={}s ext1=0x{:x}",
            plan.timer.as_secs(),
            plan.external_mask
        );
        self.sim.suspended.push(*plan);
    }
}
