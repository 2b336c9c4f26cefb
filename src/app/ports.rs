//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService / FullWakeFlusher (domain)
//! ```
//!
//! Driven adapters (RTC, deep sleep, Wi-Fi, MQTT, fuel gauge, storage,
//! event sinks) implement these traits.  The core consumes them via
//! generics, so the domain never touches hardware directly and every
//! path is testable with mock adapters.
//!
//! ## Ownership rules
//!
//! - Only the core writes retained state.  Collaborators return values;
//!   the core decides what to persist.
//! - Every blocking call takes an explicit timeout and gives up with a
//!   typed error rather than retrying in a loop.

use core::time::Duration;

use crate::config::NodeConfig;
use crate::error::{Error, SensorReadError};
use crate::power::policy::SleepPlan;
use crate::power::state::RetainedImage;

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Retained memory + low-power clock (RTC domain)
// ───────────────────────────────────────────────────────────────

/// Memory region that survives deep sleep but not power-on.
pub trait RetainedMemory {
    /// The stored image, or `None` if its magic word does not match.
    fn load(&self) -> Option<RetainedImage>;

    /// Overwrite the stored image.  Must complete before suspension.
    fn store(&mut self, image: &RetainedImage);
}

/// Monotonic counter that keeps running through deep sleep.
pub trait LowPowerClock {
    fn now(&self) -> Duration;
}

// ───────────────────────────────────────────────────────────────
// Sleep control (driven adapter: domain → deep-sleep hardware)
// ───────────────────────────────────────────────────────────────

pub trait SleepControl {
    /// `true` while any pin in `mask` is still held high.
    fn sources_active(&mut self, mask: u64) -> bool;

    /// Blocking delay.
    fn delay(&mut self, duration: Duration);

    /// Arm the timer and EXT1 sources from `plan` and enter deep sleep.
    /// Does not return on hardware.
    fn suspend(&mut self, plan: &SleepPlan);
}

// ───────────────────────────────────────────────────────────────
// Network + time (full wake only)
// ───────────────────────────────────────────────────────────────

pub trait NetworkPort {
    /// Join the network and sync time.  Fails with
    /// [`Error::ConnectTimedOut`] once `timeout` has elapsed.
    fn connect(&mut self, timeout: Duration) -> Result<(), Error>;

    /// Trusted wall time since the Unix epoch.  `None` until connected
    /// and synchronised.
    fn current_wall_time(&self) -> Option<Duration>;

    /// Release the radio before sleeping.
    fn shutdown(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broker client
// ───────────────────────────────────────────────────────────────

pub trait BrokerPort {
    fn connect(&mut self, timeout: Duration) -> Result<(), Error>;

    fn is_connected(&self) -> bool;

    /// Publish and, when `at_least_once`, block until the broker
    /// acknowledges.  Unconfirmed delivery is [`Error::PublishFailed`].
    fn publish(&mut self, topic: &str, payload: &[u8], at_least_once: bool) -> Result<(), Error>;

    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Battery gauge
// ───────────────────────────────────────────────────────────────

/// One fuel-gauge sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub millivolts: u16,
    /// Relative state of charge, 0–100 %.
    pub soc_percent: u8,
}

impl BatteryReading {
    pub fn volts(&self) -> f32 {
        f32::from(self.millivolts) / 1000.0
    }
}

pub trait BatteryGauge {
    fn read(&mut self) -> Result<BatteryReading, SensorReadError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for config blobs and credentials.
///
/// - Sensitive keys (Wi-Fi passphrase, broker token) belong in the
///   encrypted `auth` namespace.
/// - Writes MUST be atomic; NVS guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    /// Value does not fit the caller's buffer.
    TooLarge,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::TooLarge => write!(f, "value too large"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::StorageFull => Self::Storage("full"),
            ConfigError::IoError => Self::Storage("I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::Storage("key not found"),
            StorageError::Full => Self::Storage("full"),
            StorageError::IoError => Self::Storage("I/O error"),
            StorageError::TooLarge => Self::Storage("value too large"),
        }
    }
}
