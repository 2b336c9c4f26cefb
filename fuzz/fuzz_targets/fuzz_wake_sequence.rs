//! Fuzz target: minimal wake path
//!
//! Decodes the input into a sequence of boots (reset kind, wake cause,
//! EXT1 status word, clock step) and replays them through `NodeService`
//! with the RTC simulation, verifying:
//! - No panics for any reset/cause/status combination
//! - The buffer never holds more than its capacity
//! - Every boot ends in exactly one suspension
//!
//! cargo fuzz run fuzz_wake_sequence

#![no_main]

use core::time::Duration;

use libfuzzer_sys::fuzz_target;
use roomsense::adapters::rtc::RtcAdapter;
use roomsense::app::events::AppEvent;
use roomsense::app::ports::{EventSink, RetainedMemory};
use roomsense::app::service::NodeService;
use roomsense::drivers::deep_sleep::DeepSleepDriver;
use roomsense::power::{Decision, HardwareCause, ResetKind, SleepPlan, WakeReading};

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

const STEP_LEN: usize = 12;

fn decode(chunk: &[u8]) -> (WakeReading, u32) {
    let reset = match chunk[0] % 4 {
        0 => ResetKind::PowerOn,
        1 | 2 => ResetKind::DeepSleep,
        _ => ResetKind::Other,
    };
    let cause = match chunk[1] % 4 {
        0 => HardwareCause::Undefined,
        1 => HardwareCause::Timer,
        2 => HardwareCause::ExternalLevel,
        _ => HardwareCause::Other(u32::from(chunk[1])),
    };
    let mut status = [0u8; 8];
    status[..5].copy_from_slice(&chunk[2..7]);
    let step_ms = u32::from_le_bytes([chunk[7], chunk[8], chunk[9], chunk[10]]);
    (
        WakeReading {
            reset,
            cause,
            external_status: u64::from_le_bytes(status),
        },
        step_ms,
    )
}

fuzz_target!(|data: &[u8]| {
    let mut rtc = RtcAdapter::new();
    let mut sleep = DeepSleepDriver::new();
    let mut now = Duration::ZERO;

    for (i, chunk) in data.chunks_exact(STEP_LEN).enumerate() {
        let (reading, step_ms) = decode(chunk);
        now += Duration::from_millis(u64::from(step_ms));
        rtc.sim_mut().now = now;

        let mut node = NodeService::resume(reading.reset, &rtc);
        let plan = match node.on_wake(&reading, now, &mut NullSink) {
            Decision::Asleep(plan) => plan,
            Decision::Escalated(_) => SleepPlan::normal(node.profile()),
        };
        node.suspend(&plan, &mut rtc, &mut sleep);

        assert_eq!(sleep.sim().suspended.len(), i + 1);
        let state = rtc.load().expect("suspend persists a valid image").state;
        assert!(state.events.len() <= state.events.capacity());
    }
});
