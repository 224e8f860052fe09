//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                      | Connects to            |
//! |-------------|---------------------------------|------------------------|
//! | `time`      | TickSource                      | ESP32 system timer     |
//! | `wifi`      | NetworkLink                     | ESP-IDF WiFi STA       |
//! | `mqtt`      | BrokerClientFactory             | ESP-IDF MQTT client    |
//! |             | BrokerClient                    |                        |
//! | `device_id` |                                 | eFuse MAC              |

pub mod device_id;
pub mod mqtt;
pub mod time;
pub mod wifi;
