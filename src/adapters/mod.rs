//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                    | Connects to                |
//! |-------------|-------------------------------|----------------------------|
//! | `device_id` | (identity lookup)             | eFuse station MAC          |
//! | `log_sink`  | EventSink                     | Serial log output          |
//! | `mqtt`      | BrokerPort                    | ESP-IDF MQTT client        |
//! | `nvs`       | ConfigPort, StoragePort       | NVS / in-memory store      |
//! | `rtc`       | LowPowerClock, RetainedMemory | RTC timer, RTC slow memory |
//! | `wifi`      | NetworkPort                   | ESP-IDF WiFi STA + SNTP    |

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod rtc;
pub mod wifi;
