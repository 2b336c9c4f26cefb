//! Wake debouncing.
//!
//! EXT1 wake sources are level-triggered ("any high"): a PIR output or a
//! door switch that stays asserted re-fires the wake path as soon as the
//! chip suspends.  Any wake closer than `window` to the previous processed
//! wake is treated as a bounce of the same physical trigger.
//!
//! The marker is updated on *every* wake, timer wakes included.

use core::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceVerdict {
    /// Independent trigger.  `since_last` is `None` on the first wake or
    /// when the low-power clock went backwards.
    Fresh { since_last: Option<Duration> },
    /// Retrigger within the window; record nothing.
    Bounce { since_last: Duration },
}

impl DebounceVerdict {
    pub fn is_bounce(self) -> bool {
        matches!(self, Self::Bounce { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceGuard {
    window: Duration,
}

impl DebounceGuard {
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classify the wake at `now` and move `last_wake` to `now`.
    pub fn observe(&self, last_wake: &mut Option<Duration>, now: Duration) -> DebounceVerdict {
        let since_last = last_wake.and_then(|last| now.checked_sub(last));
        *last_wake = Some(now);
        match since_last {
            Some(elapsed) if elapsed <= self.window => DebounceVerdict::Bounce {
                since_last: elapsed,
            },
            since_last => DebounceVerdict::Fresh { since_last },
        }
    }
}
