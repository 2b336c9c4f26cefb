//! Full-wake flusher.
//!
//! Runs only after the policy escalated.  Each step degrades instead of
//! failing the cycle; whatever happens, the caller gets a [`FlushReport`]
//! with a sleep plan and the node suspends.
//!
//! ```text
//!  connect ─▶ anchor clock ─▶ broker ─▶ publish events ─▶ battery
//!      │            │            │          │ fail: keep + append fresh
//!      └────────────┴────────────┴──────────┴─▶ wait idle ─▶ shutdown ─▶ plan
//! ```

use core::time::Duration;

use log::{info, warn};

use crate::config::{DeviceIdentity, NodeConfig};
use crate::error::Error;
use crate::power::buffer::SensorEvent;
use crate::power::policy::{Escalation, SleepPlan};
use crate::power::state::{PersistentState, WakeProfile};

use super::events::AppEvent;
use super::payload;
use super::ports::{BatteryGauge, BrokerPort, EventSink, LowPowerClock, NetworkPort, SleepControl};

/// Maximum number of degradations recorded per full wake.
pub const MAX_FAULTS: usize = 8;

/// Timeouts for the blocking steps of a full wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSettings {
    pub connect_timeout: Duration,
    pub source_idle_timeout: Duration,
    pub idle_poll: Duration,
}

impl FlushSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            source_idle_timeout: config.source_idle_timeout(),
            idle_poll: Duration::from_secs(1),
        }
    }
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self::from_config(&NodeConfig::default())
    }
}

/// Outcome of one full wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub anchor_established: bool,
    /// Events acknowledged by the broker (buffered + fresh).
    pub delivered: usize,
    /// Events left in the retained buffer for the next full wake.
    pub retained: usize,
    pub battery_reported: bool,
    pub faults: heapless::Vec<Error, MAX_FAULTS>,
    pub plan: SleepPlan,
}

/// Collaborators for one full wake, borrowed from the caller.
pub struct FullWakeFlusher<'a, N, B, G, C, S> {
    pub network: &'a mut N,
    pub broker: &'a mut B,
    pub gauge: Option<&'a mut G>,
    pub clock: &'a C,
    pub sleep: &'a mut S,
    pub settings: FlushSettings,
}

impl<N, B, G, C, S> FullWakeFlusher<'_, N, B, G, C, S>
where
    N: NetworkPort,
    B: BrokerPort,
    G: BatteryGauge,
    C: LowPowerClock,
    S: SleepControl,
{
    pub fn run(
        &mut self,
        state: &mut PersistentState,
        profile: &WakeProfile,
        identity: &DeviceIdentity,
        escalation: &Escalation,
        sink: &mut impl EventSink,
    ) -> FlushReport {
        let mut report = FlushReport {
            anchor_established: false,
            delivered: 0,
            retained: 0,
            battery_reported: false,
            faults: heapless::Vec::new(),
            plan: SleepPlan::normal(profile),
        };

        // ── Network + time ─────────────────────────────────────
        let online = match self.network.connect(self.settings.connect_timeout) {
            Ok(()) => true,
            Err(e) => {
                fault(&mut report, e);
                sink.emit(&AppEvent::NetworkFailed(e));
                false
            }
        };

        if online {
            match self.network.current_wall_time() {
                Some(wall_time) => {
                    state.clock.establish(self.clock.now(), wall_time);
                    report.anchor_established = true;
                    sink.emit(&AppEvent::ClockAnchored { wall_time });
                }
                None => {
                    fault(&mut report, Error::ConnectTimedOut);
                    sink.emit(&AppEvent::NetworkFailed(Error::ConnectTimedOut));
                }
            }
            if let Err(e) = self.broker.connect(self.settings.connect_timeout) {
                fault(&mut report, e);
                sink.emit(&AppEvent::NetworkFailed(e));
            }
        }

        // ── Events ─────────────────────────────────────────────
        self.deliver_events(state, identity, escalation, &mut report, sink);

        // ── Battery ────────────────────────────────────────────
        if escalation.battery_due && profile.supports_battery {
            self.report_battery(state, identity, &mut report, sink);
        }

        if self.broker.is_connected() {
            self.broker.disconnect();
        }

        // ── Let level-triggered sources drop before arming ─────
        self.wait_for_idle(report.plan.external_mask, sink);

        self.network.shutdown();
        report.retained = state.events.len();
        report
    }

    fn deliver_events(
        &mut self,
        state: &mut PersistentState,
        identity: &DeviceIdentity,
        escalation: &Escalation,
        report: &mut FlushReport,
        sink: &mut impl EventSink,
    ) {
        let pending: Vec<SensorEvent> = state
            .events
            .drain()
            .iter()
            .chain(escalation.fresh.iter())
            .copied()
            .collect();
        if pending.is_empty() {
            return;
        }

        match self.publish_events(&pending, identity) {
            Ok(()) => {
                state.events.confirm_flush();
                report.delivered = pending.len();
                info!("flusher: {} events delivered", pending.len());
                sink.emit(&AppEvent::Flushed {
                    delivered: pending.len(),
                });
            }
            Err(e) => {
                fault(report, e);
                // Keep the buffered events; fresh ones join them if they fit.
                for _ in 0..retain_fresh(state, escalation, sink) {
                    fault(report, Error::BufferFull);
                }
                sink.emit(&AppEvent::FlushDeferred {
                    retained: state.events.len(),
                    error: e,
                });
            }
        }
    }

    fn publish_events(&mut self, pending: &[SensorEvent], identity: &DeviceIdentity) -> Result<(), Error> {
        if !self.broker.is_connected() {
            return Err(Error::PublishFailed);
        }
        let body = payload::events(pending, identity)?;
        self.broker.publish(identity.topic, &body, true)
    }

    fn report_battery(
        &mut self,
        state: &mut PersistentState,
        identity: &DeviceIdentity,
        report: &mut FlushReport,
        sink: &mut impl EventSink,
    ) {
        let Some(gauge) = self.gauge.as_deref_mut() else {
            return;
        };
        let reading = match gauge.read() {
            Ok(r) => r,
            Err(e) => {
                fault(report, e.into());
                sink.emit(&AppEvent::BatteryFailed(e.into()));
                return;
            }
        };
        if !self.broker.is_connected() {
            // Already recorded as a connect fault; retry next cycle.
            return;
        }

        let now = self.clock.now();
        let timestamp = match state.clock.derive(now) {
            Ok(t) => t,
            Err(e) => {
                fault(report, e.into());
                Duration::ZERO
            }
        };
        let published = payload::battery(&reading, timestamp)
            .and_then(|body| self.broker.publish(identity.topic, &body, true));
        match published {
            Ok(()) => {
                state.last_battery_report_marker = now;
                report.battery_reported = true;
                sink.emit(&AppEvent::BatteryReported(reading));
            }
            Err(e) => {
                fault(report, e);
                sink.emit(&AppEvent::BatteryFailed(e));
            }
        }
    }

    /// Poll until no source in `mask` is asserted, bounded by the idle timeout.
    fn wait_for_idle(&mut self, mask: u64, sink: &mut impl EventSink) {
        let mut waited = Duration::ZERO;
        while self.sleep.sources_active(mask) {
            if waited >= self.settings.source_idle_timeout {
                warn!("flusher: sources still active after {:?}", waited);
                sink.emit(&AppEvent::SourcesStillActive { waited });
                return;
            }
            self.sleep.delay(self.settings.idle_poll);
            waited += self.settings.idle_poll;
        }
    }
}

/// Buffer the escalation's fresh events for a later full wake.  Returns
/// how many were dropped because the buffer was full.
pub fn retain_fresh(state: &mut PersistentState, escalation: &Escalation, sink: &mut impl EventSink) -> usize {
    let mut dropped = 0;
    for event in &escalation.fresh {
        if state.events.append(*event).is_err() {
            warn!("flusher: buffer full, dropping {:?} event", event.source);
            sink.emit(&AppEvent::EventDropped(*event));
            dropped += 1;
        }
    }
    dropped
}

fn fault(report: &mut FlushReport, error: Error) {
    if report.faults.push(error).is_err() {
        warn!("flusher: fault list full, not recording {}", error);
    }
}
