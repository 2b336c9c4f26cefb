//! Clock anchoring.
//!
//! The minimal wake context has no wall clock, only the RTC low-power
//! counter that keeps running through deep sleep.  During a full wake with
//! SNTP available the firmware records one `(low_power, wall)` pair; later
//! wakes extrapolate linearly from it:
//!
//! ```text
//!   wall(t) = anchor.wall + (t - anchor.low_power)
//! ```
//!
//! Accuracy degrades with RTC drift since the last full wake.

use core::time::Duration;

/// [`ClockAnchor::derive`] was called before any anchor was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoClockAnchorYet;

/// A single low-power / wall-clock correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub low_power_time: Duration,
    pub wall_time: Duration,
}

/// Wall-clock stamp for an event, with a flag telling whether it is real.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub wall_time: Duration,
    pub synced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockAnchor {
    anchor: Option<Anchor>,
}

impl ClockAnchor {
    pub const fn unanchored() -> Self {
        Self { anchor: None }
    }

    /// Record a trusted wall time against the current low-power reading.
    /// Replaces any previous anchor.
    pub fn establish(&mut self, low_power_now: Duration, wall_time: Duration) {
        self.anchor = Some(Anchor {
            low_power_time: low_power_now,
            wall_time,
        });
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn is_established(&self) -> bool {
        self.anchor.is_some()
    }

    /// Extrapolate wall time.  Readings before the anchor clamp to the
    /// anchor's wall time, so the result is never earlier than the anchor.
    pub fn derive(&self, low_power_now: Duration) -> Result<Duration, NoClockAnchorYet> {
        let anchor = self.anchor.ok_or(NoClockAnchorYet)?;
        Ok(anchor.wall_time + low_power_now.saturating_sub(anchor.low_power_time))
    }

    /// Like [`derive`](Self::derive) but degrades to a zero, unsynced stamp.
    pub fn stamp(&self, low_power_now: Duration) -> Stamp {
        match self.derive(low_power_now) {
            Ok(wall_time) => Stamp {
                wall_time,
                synced: true,
            },
            Err(NoClockAnchorYet) => Stamp {
                wall_time: Duration::ZERO,
                synced: false,
            },
        }
    }
}
