//! Bit Source
//!
//! Test-pattern generator for link measurements. Each packet is filled
//! with bits repeated by the samples-per-bit value found on the first
//! sample of the packet in the control stream, which is forwarded
//! alongside the data so downstream blocks know the rate.
//!
//! ```text
//! spb ──> [BitSource] ──> data  (P samples per packet, bits × spb, zero tail)
//!                    └──> spb   (held per packet)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::source::{BitSource, SourceConfig, SourceMode};
//!
//! let config = SourceConfig { packet_size: 5, mode: SourceMode::Constant, seed: 0 };
//! let mut source = BitSource::<u8>::new(config).unwrap();
//! let out = source.process(&[2; 5]);
//! assert_eq!(out.data, vec![1, 1, 1, 1, 0]);
//! assert_eq!(out.samples_per_bit, vec![2; 5]);
//! ```

use crate::resample::stretch;
use crate::stream::{packet_heads, PacketBuffer};
use crate::types::{check_packet_size, spb_factor, HybridResult, Sample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Pattern produced by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// All ones
    Constant,
    /// All zeros
    Zero,
    /// Uniform random bits
    Random,
}

impl Default for SourceMode {
    fn default() -> Self {
        SourceMode::Random
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub packet_size: usize,
    pub mode: SourceMode,
    /// Seed for [`SourceMode::Random`]
    pub seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            mode: SourceMode::Random,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOutput<T> {
    pub data: Vec<T>,
    pub samples_per_bit: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BitSource<T: Sample> {
    config: SourceConfig,
    rng: StdRng,
    spb: PacketBuffer<u8>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Sample> BitSource<T> {
    pub fn new(config: SourceConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            spb: PacketBuffer::new(config.packet_size),
            config,
            _marker: std::marker::PhantomData,
        })
    }

    /// One packet of output per complete packet of the SpB control stream.
    pub fn process(&mut self, spb: &[u8]) -> SourceOutput<T> {
        self.spb.push(spb);
        let packets = self.spb.packets();
        let control = self.spb.take(packets);

        let p = self.config.packet_size;
        let mut out = SourceOutput::default();
        for head in packet_heads(&control, p) {
            let factor = spb_factor(head);
            let bits = self.bits(p / factor);
            out.data.extend(stretch(&bits, factor, p));
            out.samples_per_bit.extend(std::iter::repeat(head).take(p));
        }
        out
    }

    /// Generate `count` packets at a fixed samples-per-bit.
    pub fn generate(&mut self, count: usize, samples_per_bit: u8) -> SourceOutput<T> {
        let control = vec![samples_per_bit; count * self.config.packet_size];
        self.process(&control)
    }

    fn bits(&mut self, n: usize) -> Vec<T> {
        match self.config.mode {
            SourceMode::Constant => vec![T::from_bit(true); n],
            SourceMode::Zero => vec![T::from_bit(false); n],
            SourceMode::Random => (0..n).map(|_| T::from_bit(self.rng.gen::<bool>())).collect(),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.config.mode
    }

    /// Restart the pattern from the configured seed.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.spb.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(mode: SourceMode, seed: u64) -> BitSource<u8> {
        BitSource::new(SourceConfig { packet_size: 12, mode, seed }).unwrap()
    }

    #[test]
    fn test_constant_and_zero() {
        let out = source(SourceMode::Constant, 0).generate(2, 1);
        assert_eq!(out.data, vec![1; 24]);
        let out = source(SourceMode::Zero, 0).generate(2, 3);
        assert_eq!(out.data, vec![0; 24]);
        assert_eq!(out.samples_per_bit, vec![3; 24]);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = source(SourceMode::Random, 7).generate(4, 1);
        let b = source(SourceMode::Random, 7).generate(4, 1);
        let c = source(SourceMode::Random, 8).generate(4, 1);
        assert_eq!(a, b);
        assert_ne!(a.data, c.data);
        assert!(a.data.iter().all(|&x| x <= 1));
    }

    #[test]
    fn test_bits_repeated_per_packet_spb() {
        let mut s = source(SourceMode::Random, 3);
        let mut spb = vec![3u8; 12];
        spb.extend(vec![4u8; 12]);
        let out = s.process(&spb);
        for run in out.data[..12].chunks(3) {
            assert!(run.iter().all(|&x| x == run[0]));
        }
        for run in out.data[12..].chunks(4) {
            assert!(run.iter().all(|&x| x == run[0]));
        }
    }

    #[test]
    fn test_partial_control_packet_waits() {
        let mut s = source(SourceMode::Constant, 0);
        assert!(s.process(&[1; 7]).data.is_empty());
        assert_eq!(s.process(&[1; 5]).data.len(), 12);
    }

    #[test]
    fn test_reset_replays_pattern() {
        let mut s = source(SourceMode::Random, 11);
        let first = s.generate(1, 1);
        s.reset();
        assert_eq!(s.generate(1, 1), first);
    }
}
