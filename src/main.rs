//! RoomSense Firmware: Main Entry Point
//!
//! One wake cycle per boot.  The node spends almost all of its life in
//! deep sleep; `main` runs from the top after every wake and ends by
//! suspending again.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RtcAdapter         DeepSleepDriver   LogEventSink  NvsAdapter │
//! │  (Clock+Retained)   (SleepControl)    (EventSink)   (Config)   │
//! │  WifiAdapter        MqttAdapter       Lc709203f                │
//! │  (NetworkPort)      (BrokerPort)      (BatteryGauge)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Debounce · Classify · Escalation rules · Flusher      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Minimal wake (steps 1-3) touches only RTC state and the serial log.
//! Radio, flash and I2C are brought up in step 4, and only when the
//! escalation rules ask for it.
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Result, anyhow};
use log::{info, warn};

use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use roomsense::adapters::device_id;
use roomsense::adapters::log_sink::LogEventSink;
use roomsense::adapters::mqtt::{MqttAdapter, broker_url};
use roomsense::adapters::nvs::{BROKER_TOKEN_KEY, NvsAdapter, WIFI_PASS_KEY};
use roomsense::adapters::rtc::RtcAdapter;
use roomsense::adapters::wifi::{WifiAdapter, WifiCredentials};
use roomsense::app::flusher::FlushSettings;
use roomsense::app::ports::LowPowerClock;
use roomsense::app::service::NodeService;
use roomsense::drivers::deep_sleep::DeepSleepDriver;
use roomsense::drivers::rtc_gpio;
use roomsense::error::Error;
use roomsense::pins;
use roomsense::power::{Decision, Escalation, SleepPlan};
use roomsense::sensors::battery::Lc709203f;

/// Upper bound for the broker JWT read from NVS.
const TOKEN_CAPACITY: usize = 1024;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    // ── 2. Resume retained state ──────────────────────────────
    let mut rtc = RtcAdapter::new();
    let mut sleep = DeepSleepDriver::new();
    let mut sink = LogEventSink::new();

    let reading = rtc.reading();
    let mut node = NodeService::resume(reading.reset, &rtc);

    let sources = node.profile().sources;
    if let Err(e) = rtc_gpio::configure_wake_inputs(rtc_gpio::gpios_in(sources.motion | sources.door)) {
        warn!("Wake inputs: {}", e);
    }

    // ── 3. Decide ─────────────────────────────────────────────
    let plan = match node.on_wake(&reading, rtc.now(), &mut sink) {
        Decision::Asleep(plan) => plan,
        // ── 4. Full wake ──────────────────────────────────────
        Decision::Escalated(escalation) => {
            info!("RoomSense v{}: full wake", env!("CARGO_PKG_VERSION"));
            match full_wake(&mut node, &escalation, &rtc, &mut sleep, &mut sink) {
                Ok(plan) => plan,
                Err(e) => {
                    warn!("Full wake aborted: {:#}", e);
                    node.defer_full_wake(&escalation, Error::ConnectTimedOut, &mut sink)
                }
            }
        }
    };

    // ── 5. Suspend ────────────────────────────────────────────
    node.suspend(&plan, &mut rtc, &mut sleep);
    Ok(())
}

/// Bring up flash, radio and the gauge, then hand them to the flusher.
fn full_wake(
    node: &mut NodeService,
    escalation: &Escalation,
    rtc: &RtcAdapter,
    sleep: &mut DeepSleepDriver,
    sink: &mut LogEventSink,
) -> Result<SleepPlan> {
    // ── Config + identity ─────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = nvs.load_or_repair();

    let mac = device_id::read_mac();
    let identity = device_id::resolve(&mac);
    info!(
        "Device: {} ({}) id={} topic={}",
        identity.name,
        device_id::mac_string(&mac),
        identity.device_id.0,
        identity.topic
    );
    node.configure(&config, &identity);

    // ── Peripherals ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let password: heapless::String<64> = nvs.read_secret(WIFI_PASS_KEY).unwrap_or_default();
    let token: heapless::String<TOKEN_CAPACITY> = nvs.read_secret(BROKER_TOKEN_KEY).unwrap_or_default();
    if token.is_empty() {
        warn!("No broker token provisioned");
    }

    let credentials = WifiCredentials::new(&config, &password)?;
    let mut wifi = WifiAdapter::new(credentials, EspWifi::new(peripherals.modem, sysloop, None)?);
    let mut mqtt = MqttAdapter::new(
        broker_url(&config),
        device_id::client_id(&mac),
        token.as_str().to_owned(),
    );

    let mut gauge = if identity.supports_battery {
        info!("Battery gauge on I2C SDA={} SCL={}", pins::I2C_SDA_GPIO, pins::I2C_SCL_GPIO);
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio21,
            peripherals.pins.gpio22,
            &I2cConfig::new().baudrate(Hertz(pins::I2C_BAUD_HZ)),
        )?;
        let mut g = Lc709203f::new(i2c);
        if let Err(e) = g.wake() {
            warn!("Battery gauge wake failed: {}", e);
        }
        Some(g)
    } else {
        None
    };

    // ── Flush ─────────────────────────────────────────────────
    let report = node.full_wake(
        escalation,
        &identity,
        FlushSettings::from_config(&config),
        &mut wifi,
        &mut mqtt,
        gauge.as_mut(),
        rtc,
        sleep,
        sink,
    );
    Ok(report.plan)
}
