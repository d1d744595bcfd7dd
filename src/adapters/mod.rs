//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements      | Connects to                    |
//! |--------------|-----------------|--------------------------------|
//! | `device_id`  | identity        | eFuse factory MAC              |
//! | `http_push`  | PushTransport   | ESP-IDF HTTP(S) client         |
//! | `log_sink`   | EventSink       | Serial log output              |
//! | `nvs`        | StoragePort     | NVS / in-memory store          |
//! | `sensor_bus` | RegisterReader  | Simulated T/RH probe           |
//! | `system`     | restart         | `esp_restart`                  |
//! | `time`       | ClockPort       | ESP32 system timer, SNTP clock |

pub mod device_id;
pub mod http_push;
pub mod log_sink;
pub mod nvs;
pub mod sensor_bus;
pub mod system;
pub mod time;
