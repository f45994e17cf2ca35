//! Step Gate
//!
//! Multi-level, memoryless counterpart of the
//! [`HysteresisGate`](crate::hysteresis::HysteresisGate): the per-packet
//! difference `d = level_1 - level_2` is quantised through a sorted
//! threshold table and the matching output level is held for the packet.
//!
//! ```text
//!  d < T0        -> L0
//!  T0 <= d < T1  -> L1
//!  ...
//!  d >= T(n-1)   -> Ln
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::step_gate::{StepGate, StepGateConfig};
//!
//! let config = StepGateConfig {
//!     packet_size: 2,
//!     thresholds: vec![-1.0, 1.0],
//!     levels: vec![0.0, 0.5, 1.0],
//! };
//! let mut gate = StepGate::new(config).unwrap();
//! let out = gate.process(&[3.0, 3.0, 0.0, 0.0], &[0.0; 4]);
//! assert_eq!(out, vec![1.0, 1.0, 0.5, 0.5]);
//! ```

use crate::buckets::ThresholdTable;
use crate::stream::{packet_heads, PacketBuffer};
use crate::types::{check_packet_size, HybridError, HybridResult};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Step gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepGateConfig {
    pub packet_size: usize,
    /// Strictly increasing hopping points
    pub thresholds: Vec<f64>,
    /// One output level per bucket (thresholds + 1)
    pub levels: Vec<f64>,
}

impl Default for StepGateConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            thresholds: vec![0.0],
            levels: vec![-1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepGate {
    packet_size: usize,
    table: ThresholdTable,
    levels: Vec<f64>,
    level_1: PacketBuffer<f64>,
    level_2: PacketBuffer<f64>,
}

impl StepGate {
    pub fn new(config: StepGateConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        let table = ThresholdTable::new(config.thresholds)?;
        if config.levels.len() != table.buckets() {
            return Err(HybridError::LevelTableLength {
                levels: config.levels.len(),
                expected: table.buckets(),
            });
        }
        Ok(Self {
            packet_size: config.packet_size,
            table,
            levels: config.levels,
            level_1: PacketBuffer::new(config.packet_size),
            level_2: PacketBuffer::new(config.packet_size),
        })
    }

    pub fn process(&mut self, level_1: &[f64], level_2: &[f64]) -> Vec<f64> {
        self.level_1.push(level_1);
        self.level_2.push(level_2);
        let packets = self.level_1.packets().min(self.level_2.packets());
        let l1 = self.level_1.take(packets);
        let l2 = self.level_2.take(packets);

        let mut out = Vec::with_capacity(packets * self.packet_size);
        for (a, b) in packet_heads(&l1, self.packet_size).zip(packet_heads(&l2, self.packet_size)) {
            let level = self.level_for(a - b);
            out.extend(std::iter::repeat(level).take(self.packet_size));
        }
        out
    }

    /// Output level for one difference value.
    pub fn level_for(&self, d: f64) -> f64 {
        let bucket = self.table.index_of(d);
        trace!(d, bucket, "step gate decision");
        self.levels[bucket]
    }

    pub fn reset(&mut self) {
        self.level_1.clear();
        self.level_2.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> StepGate {
        StepGate::new(StepGateConfig {
            packet_size: 1,
            thresholds: vec![0.0, 2.0, 4.0],
            levels: vec![10.0, 20.0, 30.0, 40.0],
        })
        .unwrap()
    }

    #[test]
    fn test_levels() {
        let g = gate();
        assert_eq!(g.level_for(-0.1), 10.0);
        assert_eq!(g.level_for(0.0), 20.0);
        assert_eq!(g.level_for(3.9), 30.0);
        assert_eq!(g.level_for(4.0), 40.0);
        assert_eq!(g.level_for(1e9), 40.0);
    }

    #[test]
    fn test_difference_of_inputs() {
        let mut g = gate();
        let out = g.process(&[5.0, 5.0, 5.0], &[6.0, 4.0, 0.5]);
        assert_eq!(out, vec![10.0, 20.0, 40.0]);
    }

    #[test]
    fn test_no_memory() {
        let mut g = gate();
        let up = g.process(&[3.0], &[0.0]);
        let down = g.process(&[3.0], &[0.0]);
        assert_eq!(up, down);
    }

    #[test]
    fn test_level_table_mismatch() {
        let err = StepGate::new(StepGateConfig {
            packet_size: 1,
            thresholds: vec![0.0],
            levels: vec![1.0],
        })
        .unwrap_err();
        assert_eq!(err, HybridError::LevelTableLength { levels: 1, expected: 2 });
    }
}
