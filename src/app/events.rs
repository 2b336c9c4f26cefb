//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) and the full-wake
//! flusher emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them.

use core::time::Duration;

use crate::error::Error;
use crate::power::buffer::SensorEvent;
use crate::power::policy::{EscalationReason, SleepPlan};
use crate::power::state::Lifecycle;
use crate::power::wake::WakeCause;

use super::ports::BatteryReading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A wake cycle started (after retained state was resumed).
    Woke {
        cause: WakeCause,
        lifecycle: Lifecycle,
        now: Duration,
    },

    /// The wake was a retrigger of an already-seen source.
    Bounced { since_last: Duration },

    /// A motion event went into the retained buffer.
    Buffered { len: usize, capacity: usize },

    /// Events were recorded before any clock anchor existed.
    Unanchored,

    /// Going back to deep sleep.
    Sleeping(SleepPlan),

    /// Handing off to the full runtime.
    Escalating {
        reason: EscalationReason,
        battery_due: bool,
    },

    /// Wi-Fi, SNTP or broker bring-up failed.
    NetworkFailed(Error),

    /// The clock anchor was (re-)established.
    ClockAnchored { wall_time: Duration },

    /// Buffered and fresh events were acknowledged by the broker.
    Flushed { delivered: usize },

    /// Delivery failed; events stay buffered for the next full wake.
    FlushDeferred { retained: usize, error: Error },

    /// An unbuffered event could not be kept anywhere.
    EventDropped(SensorEvent),

    BatteryReported(BatteryReading),

    BatteryFailed(Error),

    /// Sensors were still asserted when the idle wait expired.
    SourcesStillActive { waited: Duration },
}
