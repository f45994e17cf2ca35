//! # Hybrid Link Testbed
//!
//! End-to-end harness for the `hylink-core` blocks. Two deterministic
//! loopback links stand in for the RF and optical channels, so framing,
//! alignment and switching can be exercised without hardware.
//!
//! ## Loopback impairments
//!
//! | Setting            | Effect on the receiver                           |
//! |--------------------|--------------------------------------------------|
//! | `skip`             | link joins late, aligner sees a packet delay     |
//! | `delay`, `junk`    | deframer must search before its first header     |
//! | `flips`            | targeted header or payload corruption            |
//! | `flip_probability` | seeded random bit errors                         |
//!
//! ## Example
//!
//! ```rust
//! use hylink_sim::{HybridTestbed, LoopbackConfig, TestbedConfig};
//!
//! let mut config = TestbedConfig::default();
//! config.core.packet_size = 100;
//! config.packets = 6;
//! // link 1 comes up two frames late
//! config.link_1 = LoopbackConfig { skip: 2 * (48 + 100), ..Default::default() };
//!
//! let report = HybridTestbed::new(config).unwrap().run().unwrap();
//! assert_eq!(report.delay, Some(2));
//! assert_eq!(report.counters, vec![2, 3]);
//! ```

pub mod error;
pub mod loopback;
pub mod testbed;

pub use error::{SimError, SimResult};
pub use loopback::{LoopbackConfig, LoopbackLink};
pub use testbed::{HybridTestbed, SwitchMode, TestbedConfig, TestbedReport};
