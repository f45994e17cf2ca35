//! # Hybrid Link Core
//!
//! Streaming blocks for a dual-link (RF + optical) testbed: packet framing
//! and deframing, cross-link stream alignment, link-decision gates, hard and
//! soft link switching, and link quality measurement.
//!
//! ## Overview
//!
//! Every block is a pure streaming filter. It owns its buffers, consumes
//! whatever input it is given, emits only whole packets (or whole bits),
//! and holds partial input for the next call. Construction validates the
//! configuration and is the only place a block can fail.
//!
//! - **Framing**: [`Framer`] prepends preamble + label + counter headers,
//!   [`Deframer`] finds them again and emits the data/sync/counter triple
//! - **Alignment**: [`StreamAligner`] delays the leading link so packet N of
//!   both links lines up
//! - **Decision**: [`HysteresisGate`] and [`StepGate`] turn per-link levels
//!   into a switching signal; [`QualityMetre`] measures those levels
//! - **Switching**: [`RxHardSwitch`]/[`TxHardSwitch`] pick one link per packet,
//!   [`RxSoftSwitch`]/[`TxSoftSwitch`] share each packet between links
//! - **Measurement**: [`LinkTester`] tracks BER, availability and throughput
//!
//! ## Signal Flow
//!
//! ```text
//! TX: Source → Switch(Tx) ─┬→ Framer(L1) → link 1
//!                          └→ Framer(L2) → link 2
//! RX: link 1 → Deframer(L1) ─┐
//!                            ├→ StreamAligner → Switch(Rx) → LinkTester
//!     link 2 → Deframer(L2) ─┘        └→ QualityMetre → Gate ─┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::prelude::*;
//!
//! let header = HeaderDescriptor::with_label("RF");
//! let mut framer = Framer::<u8>::new(FramerConfig {
//!     packet_size: 8,
//!     header: header.clone(),
//!     ..Default::default()
//! })
//! .unwrap();
//! let mut deframer = Deframer::<u8>::new(DeframerConfig {
//!     packet_size: 8,
//!     header,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let payload: Vec<u8> = (0..16).map(|i| (i % 2) as u8).collect();
//! let link = deframer.process(&framer.process(&payload));
//! assert_eq!(link.data, payload);
//! assert_eq!(link.counter[8], 1);
//! ```

pub mod aligner;
pub mod buckets;
pub mod config;
pub mod counter;
pub mod deframer;
pub mod framer;
pub mod hard_switch;
pub mod header;
pub mod hysteresis;
pub mod link_tester;
pub mod observe;
pub mod parallel_switch;
pub mod quality_metre;
pub mod resample;
pub mod slicer;
pub mod soft_switch;
pub mod source;
pub mod step_gate;
pub mod stream;
pub mod types;

pub use aligner::{AlignStatus, AlignedBlock, AlignerConfig, Leader, StreamAligner};
pub use config::{ConfigError, HybridConfig};
pub use counter::CounterSpace;
pub use deframer::{Deframer, DeframerConfig, DeframerState, DeframerStats};
pub use framer::{Framer, FramerConfig};
pub use hard_switch::{HardSwitchConfig, RxHardSwitch, TxHardSwitch};
pub use header::HeaderDescriptor;
pub use hysteresis::{GateMode, HysteresisConfig, HysteresisGate};
pub use link_tester::{LinkMetrics, LinkTester, LinkTesterConfig};
pub use parallel_switch::{ParallelSwitchConfig, TxParallelSwitch};
pub use quality_metre::{Merit, QualityMetre, QualityMetreConfig};
pub use slicer::{Slicer, SlicerConfig};
pub use soft_switch::{RxSoftSwitch, SoftSwitchConfig, TxSoftSwitch};
pub use source::{BitSource, SourceConfig, SourceMode};
pub use step_gate::{StepGate, StepGateConfig};
pub use types::{HybridError, HybridResult, LinkId, LinkTriple, Sample};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::aligner::{AlignStatus, AlignerConfig, StreamAligner};
    pub use crate::config::HybridConfig;
    pub use crate::deframer::{Deframer, DeframerConfig};
    pub use crate::framer::{Framer, FramerConfig};
    pub use crate::hard_switch::{HardSwitchConfig, RxHardSwitch, TxHardSwitch};
    pub use crate::header::HeaderDescriptor;
    pub use crate::hysteresis::{GateMode, HysteresisConfig, HysteresisGate};
    pub use crate::link_tester::{LinkTester, LinkTesterConfig};
    pub use crate::soft_switch::{RxSoftSwitch, SoftSwitchConfig, TxSoftSwitch};
    pub use crate::types::{HybridError, HybridResult, LinkId, LinkTriple, Sample};
}
