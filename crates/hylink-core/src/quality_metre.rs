//! Signal Quality Metre
//!
//! Estimates the quality of a two-level soft signal once per packet and
//! holds the chosen figure of merit for the whole packet. The metric feeds
//! the gates and switches that decide between links.
//!
//! ```text
//!   DC     = mean(packet)
//!   edge   = first i with x[i] and x[i + r - 1] on opposite sides of DC
//!   sample x at edge + 1 + sps/2, then every sps samples
//!   level 0: samples < DC        level 1: samples >= DC
//!
//!   signal power  ((μ1·n1 - μ0·n0) / (n0 + n1))^2
//!   noise power   (σ0² + σ1²) / 2
//!   SNR           10·log10(signal / noise)   dB
//!   Q-factor      |μ1 - μ0| / (σ0 + σ1)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::quality_metre::{Merit, QualityMetre, QualityMetreConfig};
//!
//! let config = QualityMetreConfig {
//!     packet_size: 8,
//!     samples_per_symbol: 2,
//!     merit: Merit::SignalPower,
//!     ..Default::default()
//! };
//! let mut metre = QualityMetre::new(config).unwrap();
//! let out = metre.process(&[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
//! assert_eq!(out.merit.len(), 8);
//! assert_eq!(out.dc, vec![0.5; 8]);
//! ```

use crate::stream::PacketBuffer;
use crate::types::{check_packet_size, HybridError, HybridResult};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Figure of merit emitted on the main output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Merit {
    SignalPower,
    NoisePower,
    Snr,
    QFactor,
}

impl Default for Merit {
    fn default() -> Self {
        Merit::SignalPower
    }
}

/// Signal quality metre configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMetreConfig {
    pub packet_size: usize,
    pub samples_per_symbol: usize,
    pub merit: Merit,
    /// Span of the edge search window in samples
    pub edge_range: usize,
}

impl Default for QualityMetreConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            samples_per_symbol: 1,
            merit: Merit::SignalPower,
            edge_range: 2,
        }
    }
}

/// All merits measured on one packet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacketQuality {
    pub dc: f64,
    pub first_edge: usize,
    pub n0: usize,
    pub n1: usize,
    pub mean_0: f64,
    pub mean_1: f64,
    pub var_0: f64,
    pub var_1: f64,
    pub signal_power: f64,
    pub noise_power: f64,
    pub snr_db: f64,
    pub q_factor: f64,
}

impl PacketQuality {
    pub fn merit(&self, merit: Merit) -> f64 {
        match merit {
            Merit::SignalPower => self.signal_power,
            Merit::NoisePower => self.noise_power,
            Merit::Snr => self.snr_db,
            Merit::QFactor => self.q_factor,
        }
    }
}

/// Output of [`QualityMetre::process`], both streams held per packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityOutput {
    pub merit: Vec<f64>,
    pub dc: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct QualityMetre {
    config: QualityMetreConfig,
    input: PacketBuffer<f64>,
    last: Option<PacketQuality>,
}

impl QualityMetre {
    pub fn new(config: QualityMetreConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        if config.samples_per_symbol == 0 {
            return Err(HybridError::InvalidSamplesPerBit(0));
        }
        if config.edge_range < 2 {
            return Err(HybridError::InvalidWindow(config.edge_range));
        }
        Ok(Self {
            input: PacketBuffer::new(config.packet_size),
            last: None,
            config,
        })
    }

    pub fn process(&mut self, input: &[f64]) -> QualityOutput {
        self.input.push(input);
        let packets = self.input.packets();
        let samples = self.input.take(packets);

        let p = self.config.packet_size;
        let mut out = QualityOutput {
            merit: Vec::with_capacity(samples.len()),
            dc: Vec::with_capacity(samples.len()),
        };
        for packet in samples.chunks_exact(p) {
            let q = self.measure(packet);
            let merit = q.merit(self.config.merit);
            trace!(dc = q.dc, edge = q.first_edge, merit, "packet quality");
            out.merit.extend(std::iter::repeat(merit).take(p));
            out.dc.extend(std::iter::repeat(q.dc).take(p));
            self.last = Some(q);
        }
        out
    }

    /// Measure a single packet.
    pub fn measure(&self, packet: &[f64]) -> PacketQuality {
        let dc = packet.iter().sum::<f64>() / packet.len().max(1) as f64;
        let first_edge = first_edge(packet, dc, self.config.edge_range);

        let sps = self.config.samples_per_symbol;
        let start = first_edge + 1 + sps / 2;
        let (mut low, mut high) = (Level::default(), Level::default());
        for &x in packet.iter().skip(start).step_by(sps) {
            if x < dc {
                low.add(x);
            } else {
                high.add(x);
            }
        }

        let (mean_0, var_0) = (low.mean(), low.variance());
        let (mean_1, var_1) = (high.mean(), high.variance());
        let n = low.n + high.n;
        let signal_power = if n == 0 {
            0.0
        } else {
            let s = (mean_1 * high.n as f64 - mean_0 * low.n as f64) / n as f64;
            s * s
        };
        let noise_power = (var_0 + var_1) / 2.0;
        let snr_db = 10.0 * (signal_power / noise_power).log10();
        let q_factor = (mean_1 - mean_0).abs() / (var_0.sqrt() + var_1.sqrt());

        PacketQuality {
            dc,
            first_edge,
            n0: low.n,
            n1: high.n,
            mean_0,
            mean_1,
            var_0,
            var_1,
            signal_power,
            noise_power,
            snr_db,
            q_factor,
        }
    }

    /// Quality of the most recent complete packet.
    pub fn last(&self) -> Option<&PacketQuality> {
        self.last.as_ref()
    }

    pub fn set_merit(&mut self, merit: Merit) {
        self.config.merit = merit;
    }

    pub fn config(&self) -> &QualityMetreConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.last = None;
    }
}

/// Running sums for one signal level.
#[derive(Debug, Default)]
struct Level {
    n: usize,
    sum: f64,
    sum_sq: f64,
}

impl Level {
    fn add(&mut self, x: f64) {
        self.n += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.sum / self.n as f64
        }
    }

    /// Unbiased sample variance; zero with fewer than two samples.
    fn variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let n = self.n as f64;
        let mean = self.sum / n;
        ((self.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0)
    }
}

/// Index of the first level crossing of `threshold` over a `range`-sample
/// span, or 0 when the packet never crosses.
fn first_edge(packet: &[f64], threshold: f64, range: usize) -> usize {
    let span = range - 1;
    (0..packet.len().saturating_sub(span))
        .find(|&i| {
            let (a, b) = (packet[i], packet[i + span]);
            (a < threshold && b >= threshold) || (a > threshold && b <= threshold)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metre(p: usize, sps: usize, merit: Merit) -> QualityMetre {
        QualityMetre::new(QualityMetreConfig {
            packet_size: p,
            samples_per_symbol: sps,
            merit,
            edge_range: 2,
        })
        .unwrap()
    }

    /// Symbols of `sps` samples, each level offset by a small alternating noise.
    fn noisy_symbols(bits: &[u8], sps: usize, low: f64, high: f64, noise: f64) -> Vec<f64> {
        let mut out = Vec::new();
        for (i, &b) in bits.iter().enumerate() {
            let level = if b == 1 { high } else { low };
            let n = if i % 2 == 0 { noise } else { -noise };
            out.extend(std::iter::repeat(level + n).take(sps));
        }
        out
    }

    #[test]
    fn test_first_edge() {
        assert_eq!(first_edge(&[0.0, 0.0, 1.0, 1.0], 0.5, 2), 1);
        assert_eq!(first_edge(&[1.0, 0.0, 1.0], 0.5, 2), 0);
        assert_eq!(first_edge(&[1.0, 1.0, 1.0], 0.5, 2), 0);
        assert_eq!(first_edge(&[0.0, 0.0, 0.0, 1.0], 0.5, 3), 1);
    }

    #[test]
    fn test_clean_signal() {
        let m = metre(16, 2, Merit::SignalPower);
        let packet = noisy_symbols(&[0, 1, 1, 0, 1, 0, 0, 1], 2, 0.0, 2.0, 0.0);
        let q = m.measure(&packet);
        assert_relative_eq!(q.dc, 1.0);
        assert_eq!(q.first_edge, 1);
        assert_relative_eq!(q.mean_0, 0.0);
        assert_relative_eq!(q.mean_1, 2.0);
        assert_eq!(q.var_0, 0.0);
        assert_eq!(q.var_1, 0.0);
        assert!(q.snr_db.is_infinite());
    }

    #[test]
    fn test_noisy_signal_merits() {
        let m = metre(40, 4, Merit::QFactor);
        let bits = [0, 1, 0, 1, 1, 0, 0, 1, 1, 0];
        let packet = noisy_symbols(&bits, 4, -1.0, 1.0, 0.1);
        let q = m.measure(&packet);
        assert!(q.n0 > 1 && q.n1 > 1);
        assert!(q.mean_1 > 0.8 && q.mean_0 < -0.8);
        assert!(q.noise_power > 0.0 && q.noise_power < 0.02);
        assert!(q.q_factor > 5.0);
        assert_relative_eq!(
            q.snr_db,
            10.0 * (q.signal_power / q.noise_power).log10()
        );
    }

    #[test]
    fn test_merit_held_per_packet() {
        let mut m = metre(4, 1, Merit::NoisePower);
        let out = m.process(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(out.merit.len(), 4);
        assert!(out.merit.iter().all(|&v| v == out.merit[0]));
        let out = m.process(&[0.0, 1.0]);
        assert_eq!(out.dc, vec![0.5; 4]);
        assert!(m.last().is_some());
    }

    #[test]
    fn test_select_merit() {
        let mut m = metre(8, 1, Merit::SignalPower);
        let packet = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let q = m.measure(&packet);
        m.set_merit(Merit::QFactor);
        let out = m.process(&packet);
        assert_eq!(out.merit[0].to_bits(), q.q_factor.to_bits());
    }

    #[test]
    fn test_flat_packet() {
        let m = metre(4, 1, Merit::SignalPower);
        let q = m.measure(&[0.5; 4]);
        assert_eq!(q.first_edge, 0);
        assert_eq!(q.n0, 0);
        assert!(q.signal_power.is_finite());
    }

    #[test]
    fn test_invalid_config() {
        assert!(QualityMetre::new(QualityMetreConfig {
            samples_per_symbol: 0,
            ..Default::default()
        })
        .is_err());
        assert!(QualityMetre::new(QualityMetreConfig {
            edge_range: 1,
            ..Default::default()
        })
        .is_err());
    }
}
