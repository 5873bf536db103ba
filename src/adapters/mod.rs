//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements     | Connects to                    |
//! |-------------|----------------|--------------------------------|
//! | `loopback`  | TransportPort  | In-process echo link           |
//! | `log_sink`  | EventSink      | Serial log output              |
//! | `device_id` | (identity URL) | eFuse MAC                      |
//! | `time`      | (clock)        | ESP32 system timer / host time |

pub mod device_id;
pub mod log_sink;
pub mod loopback;
pub mod time;
