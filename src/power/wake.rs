//! Wake-cause classification.
//!
//! Turns the raw hardware readings taken at boot (reset reason, sleep
//! wake cause, EXT1 status word) into a [`WakeCause`].  Which status bits
//! belong to which sensor depends on the board wiring and comes in as
//! [`SourceMasks`] derived from the configured pins.

use super::buffer::EventSource;

/// Why the chip came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// First power application (or brown-out): retained memory is garbage.
    PowerOn,
    /// Normal exit from deep sleep.
    DeepSleep,
    /// Panic, watchdog, or software reset; retained memory survives.
    Other,
}

/// Sleep wake cause as reported by the SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareCause {
    /// Not a wake from sleep.
    Undefined,
    Timer,
    /// EXT1 level wake; see the status mask for which pins.
    ExternalLevel,
    /// Any other SoC wake source (raw code).
    Other(u32),
}

/// Raw readings captured at the top of the wake path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeReading {
    pub reset: ResetKind,
    pub cause: HardwareCause,
    pub external_status: u64,
}

/// EXT1 status bits assigned to each sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceMasks {
    pub motion: u64,
    pub door: u64,
}

impl SourceMasks {
    /// Union of all source bits; this is what gets armed before sleeping.
    pub const fn all(self) -> u64 {
        self.motion | self.door
    }
}

// ---------------------------------------------------------------------------
// SourceSet
// ---------------------------------------------------------------------------

/// Set of external sources that fired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSet(u8);

impl SourceSet {
    pub const EMPTY: Self = Self(0);
    pub const MOTION: Self = Self(1 << 0);
    pub const DOOR: Self = Self(1 << 1);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has(self, source: EventSource) -> bool {
        self.contains(Self::of(source))
    }

    pub const fn of(source: EventSource) -> Self {
        match source {
            EventSource::Motion => Self::MOTION,
            EventSource::DoorContact => Self::DOOR,
        }
    }

    /// Members in recording order (motion before door).
    pub fn iter(self) -> impl Iterator<Item = EventSource> {
        [EventSource::Motion, EventSource::DoorContact]
            .into_iter()
            .filter(move |s| self.has(*s))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// No prior sleep: first power-up or a reset outside deep sleep.
    ColdStart,
    /// Periodic keep-alive.
    Timer,
    /// One or more sensors held their line high.
    ExternalSource(SourceSet),
}

pub fn classify(reading: &WakeReading, masks: SourceMasks) -> WakeCause {
    if reading.reset != ResetKind::DeepSleep {
        return WakeCause::ColdStart;
    }
    match reading.cause {
        HardwareCause::Undefined => WakeCause::ColdStart,
        HardwareCause::Timer | HardwareCause::Other(_) => WakeCause::Timer,
        HardwareCause::ExternalLevel => {
            let mut fired = SourceSet::EMPTY;
            if reading.external_status & masks.motion != 0 {
                fired = fired.union(SourceSet::MOTION);
            }
            if reading.external_status & masks.door != 0 {
                fired = fired.union(SourceSet::DOOR);
            }
            WakeCause::ExternalSource(fired)
        }
    }
}
