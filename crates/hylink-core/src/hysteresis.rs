//! Hysteresis Gate
//!
//! Turns two per-packet link levels into a bistable switching signal.
//! Per packet, `d = level_1 - level_2` is taken from the first sample of
//! the packet and mapped through the branch selected by the current mode:
//!
//! ```text
//! Forward : v = clamp((d - P_f) * S_f + V_b, V_b, V_f)   flips when v reaches V_f
//! Backward: v = clamp(-(d - P_b) * S_b + V_f, V_b, V_f)  flips when v reaches V_b
//! ```
//!
//! The mode only changes once the output has swung all the way to the
//! opposite rail, so a metric that hovers near a crossing point cannot
//! make the decision chatter. The output value is held for the whole
//! packet.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::hysteresis::{GateMode, HysteresisConfig, HysteresisGate};
//!
//! let config = HysteresisConfig { packet_size: 2, ..Default::default() };
//! let mut gate = HysteresisGate::new(config).unwrap();
//!
//! let out = gate.process(&[0.5, 0.5, 1.0, 1.0, 0.5, 0.5], &[0.0; 6]);
//! assert_eq!(out, vec![0.5, 0.5, 1.0, 1.0, 0.5, 0.5]);
//! assert_eq!(gate.mode(), GateMode::Backward);
//! ```

use crate::stream::{packet_heads, PacketBuffer};
use crate::types::{check_packet_size, HybridError, HybridResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current polarity of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    Forward,
    Backward,
}

impl Default for GateMode {
    fn default() -> Self {
        GateMode::Forward
    }
}

/// One branch of the transfer characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Crossing point P
    pub point: f64,
    /// Slope S
    pub slope: f64,
    /// Rail V this branch flips at (ceiling for forward, floor for backward)
    pub rail: f64,
}

/// Hysteresis gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    /// Samples per packet
    pub packet_size: usize,
    pub forward: Branch,
    pub backward: Branch,
    /// Mode before the first packet
    pub initial_mode: GateMode,
    /// Distance from a rail that counts as reaching it
    pub tolerance: f64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            forward: Branch {
                point: -1.0,
                slope: 1.0,
                rail: 1.0,
            },
            backward: Branch {
                point: 1.0,
                slope: -1.0,
                rail: -1.0,
            },
            initial_mode: GateMode::Forward,
            tolerance: 1e-9,
        }
    }
}

impl HysteresisConfig {
    pub fn validate(&self) -> HybridResult<()> {
        check_packet_size(self.packet_size)?;
        let values = [
            self.forward.point,
            self.forward.slope,
            self.forward.rail,
            self.backward.point,
            self.backward.slope,
            self.backward.rail,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(HybridError::InvalidHysteresis(
                "parameters must be finite".to_string(),
            ));
        }
        if self.backward.rail >= self.forward.rail {
            return Err(HybridError::InvalidHysteresis(format!(
                "floor {} must be below ceiling {}",
                self.backward.rail, self.forward.rail
            )));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(HybridError::InvalidHysteresis(
                "tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Schmitt-trigger style link decision.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    config: HysteresisConfig,
    mode: GateMode,
    level_1: PacketBuffer<f64>,
    level_2: PacketBuffer<f64>,
    flips: u64,
}

impl HysteresisGate {
    pub fn new(config: HysteresisConfig) -> HybridResult<Self> {
        config.validate()?;
        Ok(Self {
            mode: config.initial_mode,
            level_1: PacketBuffer::new(config.packet_size),
            level_2: PacketBuffer::new(config.packet_size),
            flips: 0,
            config,
        })
    }

    /// Gate whole packets of the two level streams; output is held per packet.
    pub fn process(&mut self, level_1: &[f64], level_2: &[f64]) -> Vec<f64> {
        self.level_1.push(level_1);
        self.level_2.push(level_2);

        let packets = self.level_1.packets().min(self.level_2.packets());
        let l1 = self.level_1.take(packets);
        let l2 = self.level_2.take(packets);

        let packet_size = self.config.packet_size;
        let mut out = Vec::with_capacity(packets * packet_size);
        for (a, b) in packet_heads(&l1, packet_size).zip(packet_heads(&l2, packet_size)) {
            let v = self.decide(a - b);
            out.extend(std::iter::repeat(v).take(packet_size));
        }
        out
    }

    /// Apply the transfer characteristic to one difference value.
    pub fn decide(&mut self, d: f64) -> f64 {
        let floor = self.config.backward.rail;
        let ceiling = self.config.forward.rail;
        let tol = self.config.tolerance;

        match self.mode {
            GateMode::Forward => {
                let f = self.config.forward;
                let v = clamp((d - f.point) * f.slope + floor, floor, ceiling);
                if (v - ceiling).abs() <= tol {
                    self.flip(GateMode::Backward, d);
                }
                v
            }
            GateMode::Backward => {
                let b = self.config.backward;
                let v = clamp(-(d - b.point) * b.slope + ceiling, floor, ceiling);
                if (v - floor).abs() <= tol {
                    self.flip(GateMode::Forward, d);
                }
                v
            }
        }
    }

    fn flip(&mut self, mode: GateMode, d: f64) {
        debug!(from = ?self.mode, to = ?mode, d, "hysteresis gate flipped");
        self.mode = mode;
        self.flips += 1;
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    /// Force the mode, e.g. from an operator control.
    pub fn set_mode(&mut self, mode: GateMode) {
        self.mode = mode;
    }

    /// Number of mode changes so far.
    pub fn flips(&self) -> u64 {
        self.flips
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.mode = self.config.initial_mode;
        self.level_1.clear();
        self.level_2.clear();
        self.flips = 0;
    }
}

/// NaN-propagating clamp; `lo <= hi` is guaranteed by validation.
#[inline]
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}
