//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the retained image for the duration of one wake
//! cycle.  It is resumed from retained memory at boot, makes exactly one
//! sleep/escalate decision, optionally runs the full-wake flusher, and
//! writes the image back right before suspending.
//!
//! ```text
//!  RetainedMemory ─▶ ┌──────────────────────────┐ ──▶ EventSink
//!                    │       NodeService        │
//!  WakeReading ────▶ │ debounce · classify ·    │ ──▶ SleepControl
//!                    │ policy · flusher         │
//!                    └──────────────────────────┘
//! ```

use core::time::Duration;

use log::{info, warn};

use crate::config::{DeviceIdentity, NodeConfig};
use crate::error::Error;
use crate::power::debounce::{DebounceGuard, DebounceVerdict};
use crate::power::policy::{self, Decision, Escalation, SleepPlan, Stage, WakeInput};
use crate::power::state::{Lifecycle, PersistentState, RetainedImage, WakeProfile};
use crate::power::wake::{classify, ResetKind, WakeCause, WakeReading};

use super::events::AppEvent;
use super::flusher::{self, FlushReport, FlushSettings, FullWakeFlusher};
use super::ports::{
    BatteryGauge, BrokerPort, EventSink, LowPowerClock, NetworkPort, RetainedMemory, SleepControl,
};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    image: RetainedImage,
    lifecycle: Lifecycle,
    stage: Stage,
}

impl NodeService {
    // ── Lifecycle ─────────────────────────────────────────────

    /// Load retained state for this boot, applying the cold-start rule.
    pub fn resume(reset: ResetKind, memory: &impl RetainedMemory) -> Self {
        let (image, lifecycle) = RetainedImage::resume(reset, memory.load());
        if lifecycle == Lifecycle::Reinitialised {
            info!("NodeService: retained state reinitialised ({:?})", reset);
        }
        Self {
            image,
            lifecycle,
            stage: Stage::Asleep,
        }
    }

    /// Write the image back.  Call before every suspension.
    pub fn persist(&self, memory: &mut impl RetainedMemory) {
        memory.store(&self.image);
    }

    // ── Minimal wake path ─────────────────────────────────────

    /// Debounce, classify and decide for this wake.  No I/O beyond the
    /// event sink.
    pub fn on_wake(
        &mut self,
        reading: &WakeReading,
        now: Duration,
        sink: &mut impl EventSink,
    ) -> Decision {
        self.stage = Stage::Deciding;
        let profile = self.image.profile;
        let state = &mut self.image.state;

        let verdict = DebounceGuard::new(profile.debounce_window).observe(&mut state.last_wake_marker, now);
        let cause = classify(reading, profile.sources);
        sink.emit(&AppEvent::Woke {
            cause,
            lifecycle: self.lifecycle,
            now,
        });

        let buffered_before = state.events.len();
        let input = WakeInput {
            cause,
            verdict,
            now,
            profile: &profile,
        };
        let decision = policy::decide(&input, state);

        match verdict {
            DebounceVerdict::Bounce { since_last } if cause != WakeCause::ColdStart => {
                sink.emit(&AppEvent::Bounced { since_last });
            }
            _ => {}
        }
        if state.events.len() > buffered_before {
            sink.emit(&AppEvent::Buffered {
                len: state.events.len(),
                capacity: state.events.capacity(),
            });
        }
        if recorded_unanchored(&decision, state, buffered_before) {
            sink.emit(&AppEvent::Unanchored);
        }
        match &decision {
            Decision::Asleep(plan) => sink.emit(&AppEvent::Sleeping(*plan)),
            Decision::Escalated(e) => sink.emit(&AppEvent::Escalating {
                reason: e.reason,
                battery_due: e.battery_due,
            }),
        }

        self.stage = decision.stage();
        decision
    }

    // ── Full wake ─────────────────────────────────────────────

    /// Refresh the retained profile and buffer capacity from the loaded
    /// config.  Only valid after escalation.
    pub fn configure(&mut self, config: &NodeConfig, identity: &DeviceIdentity) {
        let profile = WakeProfile::from_config(config, identity);
        self.image
            .state
            .events
            .set_capacity(usize::from(profile.buffer_capacity));
        if self.image.state.events.capacity() != usize::from(profile.buffer_capacity) {
            warn!(
                "NodeService: capacity {} kept above configured {} until flushed",
                self.image.state.events.capacity(),
                profile.buffer_capacity
            );
        }
        self.image.profile = profile;
    }

    /// Run the flusher for an escalated wake.
    #[allow(clippy::too_many_arguments)]
    pub fn full_wake(
        &mut self,
        escalation: &Escalation,
        identity: &DeviceIdentity,
        settings: FlushSettings,
        network: &mut impl NetworkPort,
        broker: &mut impl BrokerPort,
        gauge: Option<&mut impl BatteryGauge>,
        clock: &impl LowPowerClock,
        sleep: &mut impl SleepControl,
        sink: &mut impl EventSink,
    ) -> FlushReport {
        debug_assert_eq!(self.stage, Stage::Escalated);
        let profile = self.image.profile;
        let mut flusher = FullWakeFlusher {
            network,
            broker,
            gauge,
            clock,
            sleep,
            settings,
        };
        let report = flusher.run(&mut self.image.state, &profile, identity, escalation, sink);
        info!(
            "NodeService: full wake done, delivered={} retained={} battery={} faults={}",
            report.delivered,
            report.retained,
            report.battery_reported,
            report.faults.len()
        );
        report
    }

    /// Give up on an escalated wake before the flusher could run, e.g.
    /// when the radio failed to initialise.  Fresh events are kept for the
    /// next full wake.
    pub fn defer_full_wake(
        &mut self,
        escalation: &Escalation,
        error: Error,
        sink: &mut impl EventSink,
    ) -> SleepPlan {
        let state = &mut self.image.state;
        flusher::retain_fresh(state, escalation, sink);
        sink.emit(&AppEvent::FlushDeferred {
            retained: state.events.len(),
            error,
        });
        SleepPlan::normal(&self.image.profile)
    }

    /// Persist, settle if asked to, and hand the plan to the sleep driver.
    pub fn suspend(
        &mut self,
        plan: &SleepPlan,
        memory: &mut impl RetainedMemory,
        sleep: &mut impl SleepControl,
    ) {
        self.stage = Stage::Asleep;
        self.persist(memory);
        if !plan.settle.is_zero() {
            sleep.delay(plan.settle);
        }
        sleep.suspend(plan);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn state(&self) -> &PersistentState {
        &self.image.state
    }

    pub fn profile(&self) -> &WakeProfile {
        &self.image.profile
    }
}

/// Whether this wake produced an event stamped without a clock anchor.
fn recorded_unanchored(decision: &Decision, state: &PersistentState, buffered_before: usize) -> bool {
    if state.clock.is_established() {
        return false;
    }
    match decision {
        Decision::Escalated(e) => !e.fresh.is_empty(),
        Decision::Asleep(_) => state.events.len() > buffered_before,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::wake::HardwareCause;
    use crate::power::policy::EscalationReason;

    #[derive(Default)]
    struct Mem(Option<RetainedImage>);
    impl RetainedMemory for Mem {
        fn load(&self) -> Option<RetainedImage> {
            self.0.filter(RetainedImage::is_valid)
        }
        fn store(&mut self, image: &RetainedImage) {
            self.0 = Some(*image);
        }
    }

    #[derive(Default)]
    struct Sink(Vec<AppEvent>);
    impl EventSink for Sink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[derive(Default)]
    struct Sleep {
        delays: Vec<Duration>,
        plans: Vec<SleepPlan>,
    }
    impl SleepControl for Sleep {
        fn sources_active(&mut self, _mask: u64) -> bool {
            false
        }
        fn delay(&mut self, d: Duration) {
            self.delays.push(d);
        }
        fn suspend(&mut self, plan: &SleepPlan) {
            self.plans.push(*plan);
        }
    }

    fn reading(reset: ResetKind, cause: HardwareCause, status: u64) -> WakeReading {
        WakeReading {
            reset,
            cause,
            external_status: status,
        }
    }

    fn motion() -> WakeReading {
        reading(
            ResetKind::DeepSleep,
            HardwareCause::ExternalLevel,
            WakeProfile::FACTORY.sources.motion,
        )
    }

    #[test]
    fn power_on_escalates_and_emits() {
        let mem = Mem::default();
        let mut svc = NodeService::resume(ResetKind::PowerOn, &mem);
        let mut sink = Sink::default();
        let d = svc.on_wake(&reading(ResetKind::PowerOn, HardwareCause::Undefined, 0), Duration::ZERO, &mut sink);
        assert_eq!(svc.stage(), Stage::Escalated);
        assert_eq!(svc.lifecycle(), Lifecycle::Reinitialised);
        let Decision::Escalated(e) = d else {
            panic!("power-on must escalate");
        };
        assert_eq!(e.reason, EscalationReason::ColdStart);
        assert!(matches!(sink.0[0], AppEvent::Woke { cause: WakeCause::ColdStart, .. }));
        assert!(matches!(sink.0.last(), Some(AppEvent::Escalating { .. })));
    }

    #[test]
    fn motion_is_persisted_across_suspend() {
        let mut mem = Mem(Some(RetainedImage::cold()));
        let mut sleep = Sleep::default();
        let mut sink = Sink::default();

        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        let Decision::Asleep(plan) = svc.on_wake(&motion(), Duration::from_secs(10), &mut sink) else {
            panic!("single motion must sleep");
        };
        svc.suspend(&plan, &mut mem, &mut sleep);

        assert_eq!(svc.stage(), Stage::Asleep);
        assert_eq!(sleep.plans, vec![plan]);
        assert!(sleep.delays.is_empty());
        let stored = mem.0.unwrap();
        assert_eq!(stored.state.events.len(), 1);
        assert_eq!(stored.state.last_wake_marker, Some(Duration::from_secs(10)));
        assert!(sink.0.contains(&AppEvent::Unanchored));
        assert!(sink.0.contains(&AppEvent::Buffered { len: 1, capacity: 10 }));
    }

    #[test]
    fn bounce_settles_before_sleeping() {
        let mut mem = Mem(Some(RetainedImage::cold()));
        let mut sleep = Sleep::default();
        let mut sink = Sink::default();

        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        let Decision::Asleep(plan) = svc.on_wake(&motion(), Duration::from_secs(10), &mut sink) else {
            panic!();
        };
        svc.suspend(&plan, &mut mem, &mut sleep);

        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        let Decision::Asleep(plan) = svc.on_wake(&motion(), Duration::from_secs(11), &mut sink) else {
            panic!();
        };
        svc.suspend(&plan, &mut mem, &mut sleep);

        assert_eq!(sleep.delays, vec![WakeProfile::FACTORY.settle_delay]);
        assert_eq!(mem.0.unwrap().state.events.len(), 1);
        assert!(sink.0.contains(&AppEvent::Bounced {
            since_last: Duration::from_secs(1)
        }));
    }

    #[test]
    fn configure_refreshes_profile_and_capacity() {
        let mem = Mem(Some(RetainedImage::cold()));
        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        let config = NodeConfig {
            buffer_capacity: 4,
            wake_interval_secs: 120,
            ..Default::default()
        };
        let identity = DeviceIdentity {
            supports_battery: false,
            ..DeviceIdentity::fallback()
        };
        svc.configure(&config, &identity);
        assert_eq!(svc.state().events.capacity(), 4);
        assert_eq!(svc.profile().wake_interval, Duration::from_secs(120));
        assert!(!svc.profile().supports_battery);
    }

    #[test]
    fn configure_never_shrinks_below_buffered() {
        let mut mem = Mem(Some(RetainedImage::cold()));
        let mut sleep = Sleep::default();
        let mut sink = Sink::default();
        for t in [10, 20, 30] {
            let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
            if let Decision::Asleep(plan) = svc.on_wake(&motion(), Duration::from_secs(t), &mut sink) {
                svc.suspend(&plan, &mut mem, &mut sleep);
            }
        }
        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        svc.configure(
            &NodeConfig {
                buffer_capacity: 1,
                ..Default::default()
            },
            &DeviceIdentity::fallback(),
        );
        assert_eq!(svc.state().events.len(), 3);
        assert_eq!(svc.state().events.capacity(), 3);
    }

    #[test]
    fn deferred_full_wake_keeps_fresh_door_event() {
        let mem = Mem(Some(RetainedImage::cold()));
        let mut sink = Sink::default();
        let mut svc = NodeService::resume(ResetKind::DeepSleep, &mem);
        let door = reading(
            ResetKind::DeepSleep,
            HardwareCause::ExternalLevel,
            WakeProfile::FACTORY.sources.door,
        );
        let Decision::Escalated(e) = svc.on_wake(&door, Duration::from_secs(30), &mut sink) else {
            panic!("door must escalate");
        };
        assert_eq!(e.reason, EscalationReason::DoorContact);
        assert!(svc.state().events.is_empty());

        let plan = svc.defer_full_wake(&e, Error::ConnectTimedOut, &mut sink);
        assert_eq!(plan, SleepPlan::normal(&WakeProfile::FACTORY));
        assert_eq!(svc.state().events.len(), 1);
        assert!(sink.0.contains(&AppEvent::FlushDeferred {
            retained: 1,
            error: Error::ConnectTimedOut,
        }));
    }
}
