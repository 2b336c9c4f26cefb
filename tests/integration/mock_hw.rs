//! Host test bench for whole wake cycles.
//!
//! Wires the simulation backends of the real adapters (RTC, WiFi, MQTT,
//! deep sleep) to a [`NodeService`] and replays one boot per call to
//! [`Bench::wake`], exactly as `main` does on the device.  Only the fuel
//! gauge and the event sink are test doubles.

use core::time::Duration;

use roomsense::adapters::mqtt::{MqttAdapter, broker_url};
use roomsense::adapters::rtc::RtcAdapter;
use roomsense::adapters::wifi::{WifiAdapter, WifiCredentials};
use roomsense::app::events::AppEvent;
use roomsense::app::flusher::{FlushReport, FlushSettings};
use roomsense::app::ports::{BatteryGauge, BatteryReading, EventSink, LowPowerClock, RetainedMemory};
use roomsense::app::service::NodeService;
use roomsense::config::{DeviceIdentity, NodeConfig};
use roomsense::drivers::deep_sleep::DeepSleepDriver;
use roomsense::error::SensorReadError;
use roomsense::power::{
    Decision, HardwareCause, PersistentState, ResetKind, RetainedImage, WakeProfile, WakeReading,
};

/// Unix time of the bench's low-power clock zero.
pub const WALL_ORIGIN: Duration = Duration::from_secs(1_700_000_000);

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Fuel gauge ────────────────────────────────────────────────

pub struct MockGauge {
    pub result: Result<BatteryReading, SensorReadError>,
    pub reads: u32,
}

impl Default for MockGauge {
    fn default() -> Self {
        Self {
            result: Ok(BatteryReading {
                millivolts: 3_900,
                soc_percent: 76,
            }),
            reads: 0,
        }
    }
}

impl BatteryGauge for MockGauge {
    fn read(&mut self) -> Result<BatteryReading, SensorReadError> {
        self.reads += 1;
        self.result
    }
}

// ── Wake readings ─────────────────────────────────────────────

pub fn power_on() -> WakeReading {
    WakeReading {
        reset: ResetKind::PowerOn,
        cause: HardwareCause::Undefined,
        external_status: 0,
    }
}

pub fn timer() -> WakeReading {
    WakeReading {
        reset: ResetKind::DeepSleep,
        cause: HardwareCause::Timer,
        external_status: 0,
    }
}

pub fn external(status: u64) -> WakeReading {
    WakeReading {
        reset: ResetKind::DeepSleep,
        cause: HardwareCause::ExternalLevel,
        external_status: status,
    }
}

pub fn motion() -> WakeReading {
    external(WakeProfile::FACTORY.sources.motion)
}

pub fn door() -> WakeReading {
    external(WakeProfile::FACTORY.sources.door)
}

#[allow(dead_code)]
pub fn motion_and_door() -> WakeReading {
    external(WakeProfile::FACTORY.sources.motion | WakeProfile::FACTORY.sources.door)
}

// ── Bench ─────────────────────────────────────────────────────

/// Outcome of one boot.
#[derive(Debug)]
pub struct Cycle {
    pub decision: Decision,
    pub report: Option<FlushReport>,
}

#[allow(dead_code)]
impl Cycle {
    pub fn is_escalated(&self) -> bool {
        self.decision.is_escalated()
    }
}

pub struct Bench {
    pub rtc: RtcAdapter,
    pub sleep: DeepSleepDriver,
    pub wifi: WifiAdapter,
    pub mqtt: MqttAdapter,
    pub gauge: MockGauge,
    pub sink: RecordingSink,
    pub config: NodeConfig,
    pub identity: DeviceIdentity,
    /// Whether SNTP completes on the next full wake.
    pub sntp_available: bool,
}

#[allow(dead_code)]
impl Bench {
    /// A living-room node with a reachable network.
    pub fn new(config: NodeConfig) -> Self {
        let credentials = WifiCredentials::new(&config, "password1").unwrap();
        let mut client_id = heapless::String::new();
        client_id.push_str("roomsense-bench").unwrap();
        let mqtt = MqttAdapter::new(broker_url(&config), client_id, "token".into());
        Self {
            rtc: RtcAdapter::new(),
            sleep: DeepSleepDriver::new(),
            wifi: WifiAdapter::new(credentials),
            mqtt,
            gauge: MockGauge::default(),
            sink: RecordingSink::default(),
            config,
            identity: roomsense::adapters::device_id::KNOWN_DEVICES[0].1,
            sntp_available: true,
        }
    }

    /// Start from a valid cold image as if the node had already slept
    /// once, so the next wake is a plain deep-sleep wake.
    pub fn seed_retained(&mut self) {
        self.rtc.store(&RetainedImage::cold());
    }

    pub fn offline(&mut self) {
        self.wifi.sim_mut().reachable = false;
    }

    pub fn online(&mut self) {
        self.wifi.sim_mut().reachable = true;
    }

    /// Boot with `reading` at low-power time `at_secs`, run the cycle to
    /// suspension and return what happened.
    pub fn wake(&mut self, reading: WakeReading, at_secs: u64) -> Cycle {
        let at = Duration::from_secs(at_secs);
        self.rtc.sim_mut().now = at;
        self.rtc.sim_mut().reading = Some(reading);
        self.wifi.sim_mut().wall_time = self.sntp_available.then_some(WALL_ORIGIN + at);

        let reading = self.rtc.reading();
        let mut node = NodeService::resume(reading.reset, &self.rtc);
        let decision = node.on_wake(&reading, self.rtc.now(), &mut self.sink);

        let (plan, report) = match &decision {
            Decision::Asleep(plan) => (*plan, None),
            Decision::Escalated(escalation) => {
                node.configure(&self.config, &self.identity);
                let report = node.full_wake(
                    escalation,
                    &self.identity,
                    FlushSettings::from_config(&self.config),
                    &mut self.wifi,
                    &mut self.mqtt,
                    Some(&mut self.gauge),
                    &self.rtc,
                    &mut self.sleep,
                    &mut self.sink,
                );
                (report.plan, Some(report))
            }
        };
        node.suspend(&plan, &mut self.rtc, &mut self.sleep);
        Cycle { decision, report }
    }

    /// Retained state as the next boot would see it.
    pub fn retained(&self) -> PersistentState {
        self.rtc.load().expect("retained image").state
    }

    /// Every message the broker accepted, parsed.
    pub fn published(&self) -> Vec<serde_json::Value> {
        self.mqtt
            .sim()
            .published
            .iter()
            .map(|(_, body)| serde_json::from_slice(body).expect("valid JSON"))
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.mqtt.sim().published.iter().map(|(t, _)| t.clone()).collect()
    }
}
