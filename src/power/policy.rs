//! Escalation policy: stay asleep or bring up the full runtime.
//!
//! Runs once per wake in the `Deciding` stage.  Rules are a static
//! function-pointer table evaluated top to bottom; the first rule that
//! returns `Some(decision)` wins, and the fallthrough is a normal sleep.
//!
//! ```text
//! ┌────┬───────────────┬────────────────────────────────────────────┐
//! │ #  │ rule          │ outcome                                    │
//! ├────┼───────────────┼────────────────────────────────────────────┤
//! │ 1  │ cold-start    │ Escalated(ColdStart)                       │
//! │ 2  │ bounce        │ Asleep, settle delay first                 │
//! │ 3  │ door          │ Escalated(DoorContact), events unbuffered  │
//! │ 4  │ motion        │ buffer; BufferFull ─▶ Escalated, else sleep│
//! │ 5  │ battery       │ Escalated(BatteryReportDue)                │
//! │ -  │ (fallthrough) │ Asleep                                     │
//! └────┴───────────────┴────────────────────────────────────────────┘
//! ```
//!
//! Every sleep plan arms both the timer and all external sources.

use core::time::Duration;

use log::debug;

use super::buffer::{BufferFull, EventSource, SensorEvent};
use super::debounce::DebounceVerdict;
use super::state::{PersistentState, WakeProfile};
use super::wake::{SourceSet, WakeCause};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where the node is in its wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Asleep,
    Deciding,
    Escalated,
}

/// What to arm before suspending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPlan {
    /// Busy-wait before arming (lets a retriggering source settle).
    pub settle: Duration,
    pub timer: Duration,
    /// EXT1 "any high" mask.
    pub external_mask: u64,
}

impl SleepPlan {
    pub fn normal(profile: &WakeProfile) -> Self {
        Self {
            settle: Duration::ZERO,
            timer: profile.wake_interval,
            external_mask: profile.sources.all(),
        }
    }

    pub fn after_bounce(profile: &WakeProfile) -> Self {
        Self {
            settle: profile.settle_delay,
            ..Self::normal(profile)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    ColdStart,
    DoorContact,
    /// A motion event found the buffer full.  If this full wake cannot
    /// deliver, the event has nowhere to go and is dropped with a fault.
    BufferFull,
    BatteryReportDue,
}

/// Events captured this wake that did not go into the buffer.
pub const MAX_FRESH_EVENTS: usize = 2;
pub type FreshEvents = heapless::Vec<SensorEvent, MAX_FRESH_EVENTS>;

/// Hand-off to the full-wake flusher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub reason: EscalationReason,
    /// Delivered after the buffered events, in this order.
    pub fresh: FreshEvents,
    pub battery_due: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Asleep(SleepPlan),
    Escalated(Escalation),
}

impl Decision {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Asleep(_) => Stage::Asleep,
            Self::Escalated(_) => Stage::Escalated,
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::Escalated(_))
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Everything a rule may look at besides the persistent state.
#[derive(Debug, Clone, Copy)]
pub struct WakeInput<'a> {
    pub cause: WakeCause,
    pub verdict: DebounceVerdict,
    /// Low-power clock reading for this wake.
    pub now: Duration,
    pub profile: &'a WakeProfile,
}

/// A rule returns `Some` to decide, `None` to pass to the next rule.
pub type RuleFn = fn(&WakeInput<'_>, &mut PersistentState) -> Option<Decision>;

pub struct Rule {
    pub name: &'static str,
    pub apply: RuleFn,
}

pub const RULES: [Rule; 5] = [
    Rule { name: "cold-start", apply: cold_start },
    Rule { name: "bounce", apply: bounce },
    Rule { name: "door", apply: door_contact },
    Rule { name: "motion", apply: motion },
    Rule { name: "battery", apply: battery },
];

/// Evaluate the rule table for one wake.
pub fn decide(input: &WakeInput<'_>, state: &mut PersistentState) -> Decision {
    for rule in &RULES {
        if let Some(decision) = (rule.apply)(input, state) {
            debug!("policy: rule '{}' -> {:?}", rule.name, decision.stage());
            return decision;
        }
    }
    debug!("policy: nothing due -> Asleep");
    Decision::Asleep(SleepPlan::normal(input.profile))
}

/// Battery telemetry owed on this wake (cold start or interval elapsed).
pub fn battery_due(input: &WakeInput<'_>, state: &PersistentState) -> bool {
    if !input.profile.supports_battery {
        return false;
    }
    input.cause == WakeCause::ColdStart
        || input.now.saturating_sub(state.last_battery_report_marker)
            >= input.profile.battery_report_interval
}

fn escalate(
    reason: EscalationReason,
    fresh: FreshEvents,
    input: &WakeInput<'_>,
    state: &PersistentState,
) -> Decision {
    Decision::Escalated(Escalation {
        reason,
        fresh,
        battery_due: battery_due(input, state),
    })
}

fn record(input: &WakeInput<'_>, state: &PersistentState, source: EventSource) -> SensorEvent {
    let stamp = state.clock.stamp(input.now);
    SensorEvent {
        timestamp: stamp.wall_time,
        source,
        device_id: input.profile.device_id,
        clock_synced: stamp.synced,
    }
}

fn fired(input: &WakeInput<'_>) -> SourceSet {
    match input.cause {
        WakeCause::ExternalSource(set) => set,
        _ => SourceSet::EMPTY,
    }
}

// ── Rules ──────────────────────────────────────────────────────

fn cold_start(input: &WakeInput<'_>, state: &mut PersistentState) -> Option<Decision> {
    (input.cause == WakeCause::ColdStart).then(|| {
        escalate(EscalationReason::ColdStart, FreshEvents::new(), input, state)
    })
}

fn bounce(input: &WakeInput<'_>, _state: &mut PersistentState) -> Option<Decision> {
    input
        .verdict
        .is_bounce()
        .then(|| Decision::Asleep(SleepPlan::after_bounce(input.profile)))
}

fn door_contact(input: &WakeInput<'_>, state: &mut PersistentState) -> Option<Decision> {
    let set = fired(input);
    if !set.has(EventSource::DoorContact) {
        return None;
    }
    // The door bypasses the buffer; a simultaneous motion trigger rides along.
    let mut fresh = FreshEvents::new();
    for source in set.iter() {
        let _ = fresh.push(record(input, state, source));
    }
    Some(escalate(EscalationReason::DoorContact, fresh, input, state))
}

fn motion(input: &WakeInput<'_>, state: &mut PersistentState) -> Option<Decision> {
    if !fired(input).has(EventSource::Motion) {
        return None;
    }
    let event = record(input, state, EventSource::Motion);
    match state.events.append(event) {
        Ok(()) => Some(Decision::Asleep(SleepPlan::normal(input.profile))),
        Err(BufferFull) => {
            let mut fresh = FreshEvents::new();
            let _ = fresh.push(event);
            Some(escalate(EscalationReason::BufferFull, fresh, input, state))
        }
    }
}

fn battery(input: &WakeInput<'_>, state: &mut PersistentState) -> Option<Decision> {
    battery_due(input, state)
        .then(|| escalate(EscalationReason::BatteryReportDue, FreshEvents::new(), input, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::buffer::DeviceId;

    fn profile() -> WakeProfile {
        WakeProfile {
            device_id: DeviceId(4),
            supports_battery: true,
            battery_report_interval: Duration::from_secs(180),
            ..WakeProfile::FACTORY
        }
    }

    fn input(cause: WakeCause, now_secs: u64, profile: &WakeProfile) -> WakeInput<'_> {
        WakeInput {
            cause,
            verdict: DebounceVerdict::Fresh { since_last: None },
            now: Duration::from_secs(now_secs),
            profile,
        }
    }

    fn state(capacity: usize) -> PersistentState {
        let mut s = PersistentState::cold(capacity);
        s.clock
            .establish(Duration::ZERO, Duration::from_secs(1_700_000_000));
        s
    }

    #[test]
    fn cold_start_escalates_with_battery_due() {
        let p = profile();
        let mut s = state(3);
        let d = decide(&input(WakeCause::ColdStart, 0, &p), &mut s);
        assert_eq!(
            d,
            Decision::Escalated(Escalation {
                reason: EscalationReason::ColdStart,
                fresh: FreshEvents::new(),
                battery_due: true,
            })
        );
    }

    #[test]
    fn cold_start_without_gauge_has_no_battery_due() {
        let p = WakeProfile {
            supports_battery: false,
            ..profile()
        };
        let mut s = state(3);
        let Decision::Escalated(e) = decide(&input(WakeCause::ColdStart, 0, &p), &mut s) else {
            panic!("cold start must escalate");
        };
        assert!(!e.battery_due);
    }

    #[test]
    fn bounce_sleeps_with_settle_delay() {
        let p = profile();
        let mut s = state(3);
        let mut i = input(WakeCause::ExternalSource(SourceSet::DOOR), 200, &p);
        i.verdict = DebounceVerdict::Bounce {
            since_last: Duration::from_secs(1),
        };
        let d = decide(&i, &mut s);
        assert_eq!(d, Decision::Asleep(SleepPlan::after_bounce(&p)));
        assert!(s.events.is_empty());
    }

    #[test]
    fn door_escalates_with_unbuffered_events() {
        let p = profile();
        let mut s = state(3);
        let both = SourceSet::DOOR.union(SourceSet::MOTION);
        let Decision::Escalated(e) = decide(&input(WakeCause::ExternalSource(both), 10, &p), &mut s)
        else {
            panic!("door must escalate");
        };
        assert_eq!(e.reason, EscalationReason::DoorContact);
        assert_eq!(e.fresh.len(), 2);
        assert_eq!(e.fresh[0].source, EventSource::Motion);
        assert_eq!(e.fresh[1].source, EventSource::DoorContact);
        assert_eq!(e.fresh[1].timestamp, Duration::from_secs(1_700_000_010));
        assert!(s.events.is_empty());
    }

    #[test]
    fn motion_buffers_and_sleeps() {
        let p = profile();
        let mut s = state(3);
        let d = decide(&input(WakeCause::ExternalSource(SourceSet::MOTION), 10, &p), &mut s);
        assert_eq!(d, Decision::Asleep(SleepPlan::normal(&p)));
        assert_eq!(s.events.len(), 1);
        assert_eq!(s.events.drain()[0].device_id, DeviceId(4));
    }

    #[test]
    fn motion_on_full_buffer_escalates() {
        let p = profile();
        let mut s = state(1);
        decide(&input(WakeCause::ExternalSource(SourceSet::MOTION), 10, &p), &mut s);
        let Decision::Escalated(e) =
            decide(&input(WakeCause::ExternalSource(SourceSet::MOTION), 20, &p), &mut s)
        else {
            panic!("full buffer must escalate");
        };
        assert_eq!(e.reason, EscalationReason::BufferFull);
        assert_eq!(e.fresh.len(), 1);
        assert_eq!(s.events.len(), 1);
    }

    #[test]
    fn motion_without_anchor_is_flagged() {
        let p = profile();
        let mut s = PersistentState::cold(3);
        decide(&input(WakeCause::ExternalSource(SourceSet::MOTION), 10, &p), &mut s);
        let e = s.events.drain()[0];
        assert!(!e.clock_synced);
        assert_eq!(e.timestamp, Duration::ZERO);
    }

    #[test]
    fn battery_interval_boundary() {
        let p = profile();
        let mut s = state(3);
        assert!(decide(&input(WakeCause::Timer, 181, &p), &mut s).is_escalated());
        assert!(!decide(&input(WakeCause::Timer, 100, &p), &mut s).is_escalated());
        assert!(decide(&input(WakeCause::Timer, 180, &p), &mut s).is_escalated());
    }

    #[test]
    fn node_without_gauge_never_escalates_for_battery() {
        let p = WakeProfile {
            supports_battery: false,
            ..profile()
        };
        let mut s = state(3);
        assert_eq!(
            decide(&input(WakeCause::Timer, 100_000, &p), &mut s),
            Decision::Asleep(SleepPlan::normal(&p))
        );
    }

    #[test]
    fn unmatched_external_falls_through_to_timer_rules() {
        let p = profile();
        let mut s = state(3);
        let i = input(WakeCause::ExternalSource(SourceSet::EMPTY), 30, &p);
        assert_eq!(decide(&i, &mut s), Decision::Asleep(SleepPlan::normal(&p)));
        assert!(s.events.is_empty());
    }

    #[test]
    fn every_plan_arms_timer_and_sources() {
        let p = profile();
        for plan in [SleepPlan::normal(&p), SleepPlan::after_bounce(&p)] {
            assert_eq!(plan.timer, p.wake_interval);
            assert_eq!(plan.external_mask, p.sources.motion | p.sources.door);
        }
    }
}
