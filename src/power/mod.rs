//! Deep-sleep power and event scheduling core.
//!
//! Pure logic with no hardware access: everything here is driven by the
//! [`NodeService`](crate::app::service::NodeService) with readings taken by
//! the adapters.
//!
//! ```text
//!  wake ─▶ DebounceGuard ─▶ classify ─▶ policy::decide ─┬─▶ Asleep(SleepPlan)
//!                                         │              └─▶ Escalated ─▶ flusher
//!                                  EventBuffer ◀─ ClockAnchor (timestamps)
//! ```
//!
//! All state that must survive deep sleep is in [`state::RetainedImage`].

pub mod buffer;
pub mod clock;
pub mod debounce;
pub mod policy;
pub mod state;
pub mod wake;

pub use buffer::{BufferFull, DeviceId, EventBuffer, EventSource, SensorEvent, MAX_EVENT_CAPACITY};
pub use clock::{ClockAnchor, NoClockAnchorYet};
pub use debounce::{DebounceGuard, DebounceVerdict};
pub use policy::{Decision, Escalation, EscalationReason, SleepPlan, Stage};
pub use state::{Lifecycle, PersistentState, RetainedImage, WakeProfile};
pub use wake::{classify, HardwareCause, ResetKind, SourceMasks, SourceSet, WakeCause, WakeReading};
