//! State retained across deep-sleep cycles.
//!
//! Everything the minimal wake path needs lives in one plain-old-data
//! [`RetainedImage`]: the [`PersistentState`] owned by the core plus the
//! [`WakeProfile`] (config subset) written at the last full wake.  The image
//! is `Copy`, holds no heap pointers, and is validated with a magic word
//! because RTC memory contents are undefined after power-on.
//!
//! ```text
//!   reset ─▶ load image ─▶ PowerOn / invalid ─▶ reinitialise
//!                       └▶ DeepSleep / Other  ─▶ retain
//!   ... decide / flush ...
//!   persist ─▶ suspend
//! ```

use core::time::Duration;

use crate::config::{DeviceIdentity, NodeConfig};
use crate::pins;

use super::buffer::{DeviceId, EventBuffer};
use super::clock::ClockAnchor;
use super::wake::{ResetKind, SourceMasks};

/// Marks a valid image ("RSN1").
pub const RETAINED_MAGIC: u32 = 0x5253_4E31;

/// Core state.  Mutated by exactly one execution phase at a time and
/// written back before every suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentState {
    /// Low-power time of the most recently processed wake.
    pub last_wake_marker: Option<Duration>,
    /// Low-power time of the last successful battery publish.
    pub last_battery_report_marker: Duration,
    pub clock: ClockAnchor,
    pub events: EventBuffer,
}

impl PersistentState {
    /// Cold-start state: empty buffer, zero markers, no anchor.
    pub const fn cold(buffer_capacity: usize) -> Self {
        Self {
            last_wake_marker: None,
            last_battery_report_marker: Duration::ZERO,
            clock: ClockAnchor::unanchored(),
            events: EventBuffer::new(buffer_capacity),
        }
    }
}

// ---------------------------------------------------------------------------
// WakeProfile
// ---------------------------------------------------------------------------

/// Config and identity values the minimal wake path reads.  Flash is not
/// touched on warm wakes; this copy is refreshed at every full wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeProfile {
    pub device_id: DeviceId,
    pub supports_battery: bool,
    pub wake_interval: Duration,
    pub debounce_window: Duration,
    pub battery_report_interval: Duration,
    pub settle_delay: Duration,
    pub sources: SourceMasks,
    pub buffer_capacity: u16,
}

impl WakeProfile {
    /// Board defaults, used until the first full wake has loaded config.
    pub const FACTORY: Self = Self {
        device_id: DeviceId(0),
        supports_battery: true,
        wake_interval: Duration::from_secs(60),
        debounce_window: Duration::from_secs(3),
        battery_report_interval: Duration::from_secs(120),
        settle_delay: Duration::from_millis(1000),
        sources: SourceMasks {
            motion: pins::wake_mask(pins::PIR_GPIO),
            door: pins::wake_mask(pins::DOOR_CONTACT_GPIO),
        },
        buffer_capacity: 10,
    };

    pub fn from_config(config: &NodeConfig, identity: &DeviceIdentity) -> Self {
        Self {
            device_id: identity.device_id,
            supports_battery: identity.supports_battery,
            wake_interval: config.wake_interval(),
            debounce_window: config.debounce_window(),
            battery_report_interval: config.battery_report_interval(),
            settle_delay: config.settle_delay(),
            sources: config.source_masks(),
            buffer_capacity: config.buffer_capacity,
        }
    }
}

impl Default for WakeProfile {
    fn default() -> Self {
        Self::FACTORY
    }
}

// ---------------------------------------------------------------------------
// RetainedImage
// ---------------------------------------------------------------------------

/// How [`RetainedImage::resume`] treated the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Retained,
    Reinitialised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetainedImage {
    pub magic: u32,
    pub state: PersistentState,
    pub profile: WakeProfile,
}

impl RetainedImage {
    /// Freshly initialised image with factory profile.
    pub const fn cold() -> Self {
        Self {
            magic: RETAINED_MAGIC,
            state: PersistentState::cold(WakeProfile::FACTORY.buffer_capacity as usize),
            profile: WakeProfile::FACTORY,
        }
    }

    /// Magic word present and the buffer bookkeeping intact.
    pub fn is_valid(&self) -> bool {
        self.magic == RETAINED_MAGIC && self.state.events.is_consistent()
    }

    /// Apply the init-vs-retain rule for this boot.
    ///
    /// A power-on reset always starts clean.  Any other reset keeps a valid
    /// image, so a panic or watchdog reset does not lose buffered events.
    pub fn resume(reset: ResetKind, loaded: Option<Self>) -> (Self, Lifecycle) {
        match loaded {
            Some(image) if reset != ResetKind::PowerOn && image.is_valid() => {
                (image, Lifecycle::Retained)
            }
            Some(image) if image.is_valid() => {
                // Keep the last known profile, drop everything else.
                let capacity = usize::from(image.profile.buffer_capacity);
                let fresh = Self {
                    magic: RETAINED_MAGIC,
                    state: PersistentState::cold(capacity),
                    profile: image.profile,
                };
                (fresh, Lifecycle::Reinitialised)
            }
            _ => (Self::cold(), Lifecycle::Reinitialised),
        }
    }
}

impl Default for RetainedImage {
    fn default() -> Self {
        Self::cold()
    }
}
