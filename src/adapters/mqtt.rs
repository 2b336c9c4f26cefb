//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] on top of `esp_idf_svc::mqtt::client`.  The
//! client runs its own task; the event callback mirrors connection state
//! and publish acknowledgements into atomics that the blocking port
//! methods poll with a deadline.
//!
//! The broker authenticates with username `JWT` and the token stored in
//! the `auth` NVS namespace.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient`.
//! - **all other targets**: an in-memory broker for host-side tests.

use core::fmt::Write;
use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::BrokerPort;
use crate::config::NodeConfig;
use crate::error::Error;

pub const BROKER_USERNAME: &str = "JWT";

/// How long a QoS 1 publish may wait for PUBACK.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// `mqtt://host:port`
pub fn broker_url(config: &NodeConfig) -> heapless::String<96> {
    let mut url = heapless::String::new();
    let _ = write!(url, "mqtt://{}:{}", config.broker_host, config.broker_port);
    url
}

// ───────────────────────────────────────────────────────────────
// Shared callback state (device)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct Link {
    connected: std::sync::atomic::AtomicBool,
    last_acked: std::sync::atomic::AtomicU32,
}

// ───────────────────────────────────────────────────────────────
// MqttAdapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    url: heapless::String<96>,
    client_id: heapless::String<24>,
    token: String,
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    link: std::sync::Arc<Link>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// In-memory broker for host tests.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimBroker {
    pub reachable: bool,
    /// Whether QoS 1 publishes get a PUBACK.
    pub acks: bool,
    pub connected: bool,
    pub published: Vec<(String, Vec<u8>)>,
}

impl MqttAdapter {
    pub fn new(url: heapless::String<96>, client_id: heapless::String<24>, token: String) -> Self {
        Self {
            url,
            client_id,
            token,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            link: std::sync::Arc::new(Link::default()),
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker {
                reachable: true,
                acks: true,
                ..SimBroker::default()
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimBroker {
        &self.sim
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, timeout: Duration) -> Result<(), Error> {
        use std::sync::atomic::Ordering;

        use esp_idf_hal::delay::FreeRtos;
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

        if self.client.is_none() {
            let conf = MqttClientConfiguration {
                client_id: Some(self.client_id.as_str()),
                username: Some(BROKER_USERNAME),
                password: Some(self.token.as_str()),
                ..Default::default()
            };
            let link = std::sync::Arc::clone(&self.link);
            let client = EspMqttClient::new_cb(self.url.as_str(), &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => link.connected.store(true, Ordering::Release),
                    EventPayload::Disconnected => link.connected.store(false, Ordering::Release),
                    EventPayload::Published(id) => link.last_acked.store(id, Ordering::Release),
                    EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                    _ => {}
                }
            })
            .map_err(|e| {
                warn!("MQTT: client init failed: {}", e);
                Error::ConnectTimedOut
            })?;
            self.client = Some(client);
        }

        let started = std::time::Instant::now();
        while !self.link.connected.load(Ordering::Acquire) {
            if started.elapsed() >= timeout {
                return Err(Error::ConnectTimedOut);
            }
            FreeRtos::delay_ms(50);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, _timeout: Duration) -> Result<(), Error> {
        if self.sim.reachable {
            self.sim.connected = true;
            Ok(())
        } else {
            Err(Error::ConnectTimedOut)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.link.connected.load(std::sync::atomic::Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim.connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], at_least_once: bool) -> Result<(), Error> {
        use std::sync::atomic::Ordering;

        use esp_idf_hal::delay::FreeRtos;
        use esp_idf_svc::mqtt::client::QoS;

        let client = self.client.as_mut().ok_or(Error::PublishFailed)?;
        let qos = if at_least_once {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        let id = client
            .publish(topic, qos, false, payload)
            .map_err(|_| Error::PublishFailed)?;
        if !at_least_once {
            return Ok(());
        }

        let started = std::time::Instant::now();
        while self.link.last_acked.load(Ordering::Acquire) != id {
            if started.elapsed() >= ACK_TIMEOUT || !self.platform_is_connected() {
                return Err(Error::PublishFailed);
            }
            FreeRtos::delay_ms(20);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], at_least_once: bool) -> Result<(), Error> {
        if !self.sim.connected {
            return Err(Error::PublishFailed);
        }
        if at_least_once && !self.sim.acks {
            return Err(Error::PublishFailed);
        }
        self.sim.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
        self.link
            .connected
            .store(false, std::sync::atomic::Ordering::Release);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.connected = false;
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerPort
// ───────────────────────────────────────────────────────────────

impl BrokerPort for MqttAdapter {
    fn connect(&mut self, timeout: Duration) -> Result<(), Error> {
        info!("MQTT: connecting to {} as {}", self.url, self.client_id);
        self.platform_connect(timeout).inspect_err(|e| {
            warn!("MQTT: connect failed: {}", e);
        })
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8], at_least_once: bool) -> Result<(), Error> {
        debug!("MQTT: publish {} bytes to {}", payload.len(), topic);
        self.platform_publish(topic, payload, at_least_once)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        debug!("MQTT: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
