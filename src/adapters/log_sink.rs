//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).  One line per event, with a
//! fixed prefix per concern so logs can be grepped across wake cycles.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Woke {
                cause,
                lifecycle,
                now,
            } => {
                info!("WAKE | cause={:?} | state={:?} | rtc={:.3}s", cause, lifecycle, now.as_secs_f32());
            }
            AppEvent::Bounced { since_last } => {
                info!("WAKE | bounce, {}ms since last wake", since_last.as_millis());
            }
            AppEvent::Buffered { len, capacity } => {
                info!("WAKE | motion buffered ({}/{})", len, capacity);
            }
            AppEvent::Unanchored => {
                warn!("CLOCK | no anchor yet, event stamped unsynced");
            }
            AppEvent::Sleeping(plan) => {
                info!(
                    "SLEEP | timer={}s | ext1=0x{:x} | settle={}ms",
                    plan.timer.as_secs(),
                    plan.external_mask,
                    plan.settle.as_millis()
                );
            }
            AppEvent::Escalating {
                reason,
                battery_due,
            } => {
                info!("ESCALATE | reason={:?} | battery_due={}", reason, battery_due);
            }
            AppEvent::NetworkFailed(e) => {
                warn!("NET | {}", e);
            }
            AppEvent::ClockAnchored { wall_time } => {
                info!("CLOCK | anchored at unix {}", wall_time.as_secs());
            }
            AppEvent::Flushed { delivered } => {
                info!("FLUSH | {} events delivered", delivered);
            }
            AppEvent::FlushDeferred { retained, error } => {
                warn!("FLUSH | deferred ({}), {} events retained", error, retained);
            }
            AppEvent::EventDropped(ev) => {
                warn!(
                    "FLUSH | dropped {} event at {}ms",
                    ev.source.sensor_name(),
                    ev.timestamp.as_millis()
                );
            }
            AppEvent::BatteryReported(r) => {
                info!("BATTERY | {}mV | {}%", r.millivolts, r.soc_percent);
            }
            AppEvent::BatteryFailed(e) => {
                warn!("BATTERY | {}", e);
            }
            AppEvent::SourcesStillActive { waited } => {
                warn!("SLEEP | sources still high after {}s", waited.as_secs());
            }
        }
    }
}
