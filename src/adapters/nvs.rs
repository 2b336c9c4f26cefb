//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for RoomSense.
//! Flash is only touched on full wakes; warm wakes read the retained
//! [`WakeProfile`](crate::power::state::WakeProfile) instead.
//!
//! # Layout
//!
//! | Namespace   | Key            | Content                          |
//! |-------------|----------------|----------------------------------|
//! | `roomsense` | `nodecfg`      | postcard-encoded [`NodeConfig`]  |
//! | `auth`      | `wifi_pass`    | Wi-Fi passphrase (UTF-8)         |
//! | `auth`      | `broker_token` | broker JWT (UTF-8)               |
//!
//! On ESP32 the `auth` namespace lives on the encrypted NVS partition.
//! The simulation backend uses plaintext (dev/test only).

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::NodeConfig;
use crate::pins;
use crate::power::buffer::MAX_EVENT_CAPACITY;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "roomsense";
const CONFIG_KEY: &str = "nodecfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;
const CRED_NAMESPACE: &str = "auth";

/// Credential key for the Wi-Fi passphrase.
pub const WIFI_PASS_KEY: &str = "wifi_pass";
/// Credential key for the broker JWT.
pub const BROKER_TOKEN_KEY: &str = "broker_token";

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  On a full partition or a version mismatch
    /// the partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS user.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NVS names are at most 15 bytes plus the terminator.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a UTF-8 credential into a fixed-capacity string.  Missing,
    /// oversized or non-UTF-8 values yield `None`.
    pub fn read_secret<const N: usize>(&self, key: &str) -> Option<heapless::String<N>> {
        let mut buf = [0u8; N];
        let len = match self.read_credential(key, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return None,
            Err(e) => {
                warn!("NvsAdapter: credential '{}' unreadable: {}", key, e);
                return None;
            }
        };
        let text = core::str::from_utf8(&buf[..len]).ok()?;
        heapless::String::try_from(text).ok()
    }

    /// Load the stored config.  A blob that fails to decode or validate is
    /// overwritten with the defaults, so later full wakes read a good one.
    pub fn load_or_repair(&self) -> NodeConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("NvsAdapter: stored config rejected ({}), restoring defaults", e);
                let defaults = NodeConfig::default();
                if let Err(e) = self.save(&defaults) {
                    warn!("NvsAdapter: could not restore defaults: {}", e);
                }
                defaults
            }
        }
    }
}

/// Range-check a config before it is persisted.
pub fn validate_config(cfg: &NodeConfig) -> Result<(), ConfigError> {
    if cfg.wake_interval_secs == 0 {
        return Err(ConfigError::ValidationFailed("wake_interval_secs must be > 0"));
    }
    if cfg.debounce_window_secs >= cfg.wake_interval_secs {
        return Err(ConfigError::ValidationFailed(
            "debounce_window_secs must be < wake_interval_secs",
        ));
    }
    if cfg.battery_report_interval_secs == 0 {
        return Err(ConfigError::ValidationFailed(
            "battery_report_interval_secs must be > 0",
        ));
    }
    if cfg.buffer_capacity == 0 || usize::from(cfg.buffer_capacity) > MAX_EVENT_CAPACITY {
        return Err(ConfigError::ValidationFailed("buffer_capacity must be 1–32"));
    }
    if cfg.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationFailed("connect_timeout_secs must be > 0"));
    }
    if cfg.source_idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationFailed(
            "source_idle_timeout_secs must be > 0",
        ));
    }
    if !pins::is_rtc_capable(cfg.motion_pin) {
        return Err(ConfigError::ValidationFailed("motion_pin must be an RTC GPIO"));
    }
    if !pins::is_rtc_capable(cfg.door_pin) {
        return Err(ConfigError::ValidationFailed("door_pin must be an RTC GPIO"));
    }
    if cfg.motion_pin == cfg.door_pin {
        return Err(ConfigError::ValidationFailed(
            "motion_pin and door_pin must differ",
        ));
    }
    if cfg.broker_host.is_empty() || cfg.broker_port == 0 {
        return Err(ConfigError::ValidationFailed("broker address must be set"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            if let Some(bytes) = self.store.borrow().get(&key) {
                let cfg: NodeConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
                let key = Self::c_name(CONFIG_KEY);
                let mut size: usize = 0;

                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });

            match result {
                Ok(bytes) => {
                    let cfg: NodeConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    validate_config(&cfg)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(NodeConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(NodeConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let key = Self::c_name(CONFIG_KEY);
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) if data.len() > buf.len() => Err(StorageError::TooLarge),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::TooLarge),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }
}

// ── Credential storage ─────────────────────────────────────────────
//
// Secrets live in the "auth" namespace.  With CONFIG_NVS_ENCRYPTION set
// and an nvs_key partition present, ESP-IDF encrypts the namespace
// transparently; the API below is identical either way.
impl NvsAdapter {
    fn read_credential(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.read(CRED_NAMESPACE, key, buf)
    }
}
