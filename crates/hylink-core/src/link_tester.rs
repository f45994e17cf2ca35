//! Link Tester
//!
//! Running bit-error-rate, availability and throughput between a reference
//! and a candidate bit stream. All inputs are sample aligned; the
//! samples-per-bit stream fixes where each bit starts and the bit is read
//! at its centre sample.
//!
//! ```text
//! reference ─┐
//! candidate ─┤                 ┌─> BER          (errors / valid bits)
//! control   ─┼─> [LinkTester] ─┼─> availability (up bits / all bits)
//! spb       ─┘                 └─> throughput   (sample_rate / spb)
//! ```
//!
//! Counters run from the start of the stream and are only cleared by an
//! explicit [`LinkTester::reset`]. Outputs are held for every sample of the
//! bit they were computed on.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::link_tester::{LinkTester, LinkTesterConfig};
//!
//! let mut tester = LinkTester::<u8>::new(LinkTesterConfig::default()).unwrap();
//! let out = tester.process(&[1, 0, 1, 1], &[1, 1, 1, 1], &[true; 4], &[1; 4]);
//! assert_eq!(out.ber, vec![0.0, 0.5, 1.0 / 3.0, 0.25]);
//! assert_eq!(out.throughput, vec![3200.0; 4]);
//! ```

use crate::types::{spb_factor, HybridError, HybridResult, Sample};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// Link tester configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTesterConfig {
    /// Nominal sample rate in samples per second
    pub sample_rate: f64,
}

impl Default for LinkTesterConfig {
    fn default() -> Self {
        Self { sample_rate: 3200.0 }
    }
}

/// Per-sample metric streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkMetrics {
    pub ber: Vec<f64>,
    pub availability: Vec<f64>,
    pub throughput: Vec<f64>,
}

impl LinkMetrics {
    pub fn len(&self) -> usize {
        self.ber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ber.is_empty()
    }

    fn hold(&mut self, ber: f64, availability: f64, throughput: f64, n: usize) {
        self.ber.extend(std::iter::repeat(ber).take(n));
        self.availability.extend(std::iter::repeat(availability).take(n));
        self.throughput.extend(std::iter::repeat(throughput).take(n));
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkTesterStats {
    /// Bits seen
    pub bits: u64,
    /// Bits with the control gate up and both sides binary
    pub valid_bits: u64,
    /// Valid bits where reference and candidate differ
    pub errors: u64,
    /// Bits with the control gate up
    pub up_bits: u64,
    /// Bit-weighted mean of the instantaneous throughput
    pub mean_throughput: f64,
}

impl LinkTesterStats {
    pub fn ber(&self) -> f64 {
        if self.valid_bits == 0 {
            0.0
        } else {
            self.errors as f64 / self.valid_bits as f64
        }
    }

    pub fn availability(&self) -> f64 {
        if self.bits == 0 {
            0.0
        } else {
            self.up_bits as f64 / self.bits as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkTester<T: Sample> {
    config: LinkTesterConfig,
    reference: VecDeque<T>,
    candidate: VecDeque<T>,
    control: VecDeque<bool>,
    spb: VecDeque<u8>,
    stats: LinkTesterStats,
}

impl<T: Sample> LinkTester<T> {
    pub fn new(config: LinkTesterConfig) -> HybridResult<Self> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(HybridError::InvalidSampleRate(config.sample_rate));
        }
        Ok(Self {
            config,
            reference: VecDeque::new(),
            candidate: VecDeque::new(),
            control: VecDeque::new(),
            spb: VecDeque::new(),
            stats: LinkTesterStats::default(),
        })
    }

    /// Measure every complete bit available on all four inputs.
    ///
    /// A bit is complete once `spb` samples are buffered, where `spb` is read
    /// from the bit's first sample. Incomplete bits wait for the next call.
    pub fn process(
        &mut self,
        reference: &[T],
        candidate: &[T],
        control: &[bool],
        spb: &[u8],
    ) -> LinkMetrics {
        self.reference.extend(reference);
        self.candidate.extend(candidate);
        self.control.extend(control);
        self.spb.extend(spb);

        let mut out = LinkMetrics::default();
        loop {
            let available = self
                .reference
                .len()
                .min(self.candidate.len())
                .min(self.control.len())
                .min(self.spb.len());
            let Some(&head) = self.spb.front() else {
                break;
            };
            let n = spb_factor(head);
            if available < n {
                break;
            }

            let mid = n / 2;
            let up = self.control[mid];
            let pair = (self.reference[mid].as_bit(), self.candidate[mid].as_bit());
            let throughput = self.config.sample_rate / n as f64;
            self.measure(up, pair, throughput);

            out.hold(
                self.stats.ber(),
                self.stats.availability(),
                throughput,
                n,
            );
            self.reference.drain(..n);
            self.candidate.drain(..n);
            self.control.drain(..n);
            self.spb.drain(..n);
        }
        out
    }

    fn measure(&mut self, up: bool, pair: (Option<bool>, Option<bool>), throughput: f64) {
        let s = &mut self.stats;
        s.bits += 1;
        s.mean_throughput += (throughput - s.mean_throughput) / s.bits as f64;
        if !up {
            return;
        }
        s.up_bits += 1;
        if let (Some(r), Some(c)) = pair {
            s.valid_bits += 1;
            if r != c {
                s.errors += 1;
                trace!(bit = s.bits, errors = s.errors, "bit error");
            }
        }
    }

    pub fn stats(&self) -> &LinkTesterStats {
        &self.stats
    }

    pub fn config(&self) -> &LinkTesterConfig {
        &self.config
    }

    /// Clear the running counters and any buffered input.
    pub fn reset(&mut self) {
        self.reference.clear();
        self.candidate.clear();
        self.control.clear();
        self.spb.clear();
        self.stats = LinkTesterStats::default();
    }
}
