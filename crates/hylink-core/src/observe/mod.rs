//! # Observability
//!
//! Blocks report through `tracing` events:
//!
//! | Level  | Events                                                         |
//! |--------|----------------------------------------------------------------|
//! | warn   | aligner discontinuity, delay over budget                       |
//! | debug  | header lock, label/counter rejection, aligner lock, gate flips |
//! | trace  | per-packet decisions, bit errors                               |
//!
//! Nothing is printed until a subscriber is installed with
//! [`init_logging`].

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};

/// Install logging from a loaded [`HybridConfig`](crate::config::HybridConfig).
pub fn init(config: &crate::config::HybridConfig) -> bool {
    init_logging(&config.logging)
}
