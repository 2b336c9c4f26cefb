//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`]: the full-wake path brings the radio up,
//! waits for an IP, syncs the wall clock over SNTP and tears everything
//! down again before the node suspends.  Every wait is bounded by the
//! caller's timeout so an absent AP costs at most one timeout per wake.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` + `EspSntp`.
//! - **all other targets**: simulation stubs for host-side tests.

use core::time::Duration;

use log::{info, warn};

use crate::app::ports::NetworkPort;
use crate::config::NodeConfig;
use crate::error::Error;

/// Wall times before 2020-01-01 mean SNTP has not run yet.
pub const EPOCH_2020: Duration = Duration::from_secs(1_577_836_800);

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), Error> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(Error::Config("wifi ssid must be 1-32 printable bytes"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), Error> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(Error::Config("wifi password must be 8-64 bytes or empty"));
    }
    Ok(())
}

/// Validated station credentials plus the SNTP server to sync against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    pub sntp_server: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(config: &NodeConfig, password: &str) -> Result<Self, Error> {
        validate_ssid(&config.wifi_ssid)?;
        validate_password(password)?;
        let mut pass = heapless::String::new();
        pass.push_str(password)
            .map_err(|_| Error::Config("wifi password must be 8-64 bytes or empty"))?;
        Ok(Self {
            ssid: config.wifi_ssid.clone(),
            password: pass,
            sntp_server: config.sntp_server.clone(),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Down,
    Associated,
    Synced,
}

pub struct WifiAdapter {
    state: WifiState,
    credentials: WifiCredentials,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimNetwork,
}

/// Simulation knobs.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    pub reachable: bool,
    /// What SNTP would have delivered.
    pub wall_time: Option<Duration>,
    pub connect_attempts: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(credentials: WifiCredentials, wifi: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        Self {
            state: WifiState::Down,
            credentials,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(credentials: WifiCredentials) -> Self {
        Self {
            state: WifiState::Down,
            credentials,
            sim: SimNetwork {
                reachable: true,
                ..SimNetwork::default()
            },
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimNetwork {
        &mut self.sim
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_associate(&mut self, timeout: Duration) -> Result<(), Error> {
        use esp_idf_hal::delay::FreeRtos;
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if self.credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let ssid = self
            .credentials
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| Error::Config("wifi ssid must be 1-32 printable bytes"))?;
        let password = self
            .credentials
            .password
            .as_str()
            .try_into()
            .map_err(|_| Error::Config("wifi password must be 8-64 bytes or empty"))?;
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                ..Default::default()
            }))
            .map_err(|_| Error::ConnectTimedOut)?;
        self.wifi.start().map_err(|_| Error::ConnectTimedOut)?;
        self.wifi.connect().map_err(|_| Error::ConnectTimedOut)?;

        let started = std::time::Instant::now();
        while !self.wifi.is_up().unwrap_or(false) {
            if started.elapsed() >= timeout {
                return Err(Error::ConnectTimedOut);
            }
            FreeRtos::delay_ms(100);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associate(&mut self, _timeout: Duration) -> Result<(), Error> {
        self.sim.connect_attempts = self.sim.connect_attempts.wrapping_add(1);
        if self.sim.reachable {
            Ok(())
        } else {
            Err(Error::ConnectTimedOut)
        }
    }

    /// Block until SNTP completes or the timeout expires.  The SNTP
    /// client is dropped afterwards; the system clock keeps the result.
    #[cfg(target_os = "espidf")]
    fn platform_sync(&mut self, timeout: Duration) -> bool {
        use esp_idf_hal::delay::FreeRtos;
        use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};

        let mut conf = SntpConf::default();
        conf.servers[0] = self.credentials.sntp_server.as_str();
        let sntp = match EspSntp::new(&conf) {
            Ok(s) => s,
            Err(e) => {
                warn!("WiFi: SNTP start failed: {}", e);
                return false;
            }
        };
        let started = std::time::Instant::now();
        while sntp.get_sync_status() != SyncStatus::Completed {
            if started.elapsed() >= timeout {
                return false;
            }
            FreeRtos::delay_ms(100);
        }
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_sync(&mut self, _timeout: Duration) -> bool {
        self.sim.wall_time.is_some()
    }

    #[cfg(target_os = "espidf")]
    fn platform_wall_time(&self) -> Option<Duration> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_wall_time(&self) -> Option<Duration> {
        self.sim.wall_time
    }

    #[cfg(target_os = "espidf")]
    fn platform_shutdown(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
        if let Err(e) = self.wifi.stop() {
            warn!("WiFi: stop failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_shutdown(&mut self) {
        info!("WiFi(sim): radio off");
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn connect(&mut self, timeout: Duration) -> Result<(), Error> {
        info!("WiFi: connecting to '{}'", self.credentials.ssid);
        if let Err(e) = self.platform_associate(timeout) {
            warn!("WiFi: association failed: {}", e);
            self.platform_shutdown();
            self.state = WifiState::Down;
            return Err(e);
        }
        self.state = WifiState::Associated;

        if self.platform_sync(timeout) {
            self.state = WifiState::Synced;
            info!("WiFi: connected, clock synced via {}", self.credentials.sntp_server);
        } else {
            warn!("WiFi: connected, SNTP did not complete");
        }
        Ok(())
    }

    fn current_wall_time(&self) -> Option<Duration> {
        if self.state != WifiState::Synced {
            return None;
        }
        self.platform_wall_time().filter(|t| *t >= EPOCH_2020)
    }

    fn shutdown(&mut self) {
        if self.state == WifiState::Down {
            return;
        }
        self.platform_shutdown();
        self.state = WifiState::Down;
        info!("WiFi: down");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
