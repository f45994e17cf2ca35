//! Slicer
//!
//! Hard decision on a soft sample stream. Each sample is replaced by a
//! Gaussian-weighted average of its neighbourhood and compared against a
//! threshold:
//!
//! ```text
//! window w (forced odd), h = (w + 1) / 2
//! weight[k] = exp(-(5k / (h - 1))^2),  k = 0..h   (weight[0] = 1 when h = 1)
//!
//! mean[i] = Σ weight[|k|] x[i+k] / Σ weight[|k|]   over -(h-1) <= k <= h-1 in range
//! bit[i]  = 0 if mean[i] < threshold[i] else 1
//! ```
//!
//! The threshold is either fixed or taken sample-by-sample from a second
//! stream. A sample is only decided once its look-ahead has arrived, so the
//! output does not depend on how the input is chunked; [`Slicer::finish`]
//! decides the tail with a truncated window.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::slicer::{Slicer, SlicerConfig};
//!
//! let mut slicer = Slicer::new(SlicerConfig { avg_window: 1, threshold: 0.5 }).unwrap();
//! assert_eq!(slicer.process(&[0.1, 0.9, 0.4, 0.6]), vec![0, 1, 0, 1]);
//! ```

use crate::types::{HybridError, HybridResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Slicer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Averaging window in samples; even values are rounded up
    pub avg_window: usize,
    /// Fixed decision threshold
    pub threshold: f64,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            avg_window: 10,
            threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Slicer {
    threshold: f64,
    weights: Vec<f64>,
    samples: VecDeque<f64>,
    thresholds: VecDeque<Option<f64>>,
    /// Index in `samples` of the next undecided sample
    next: usize,
}

impl Slicer {
    pub fn new(config: SlicerConfig) -> HybridResult<Self> {
        if config.avg_window == 0 {
            return Err(HybridError::InvalidWindow(0));
        }
        if !config.threshold.is_finite() {
            return Err(HybridError::NonFiniteThreshold { index: 0 });
        }
        Ok(Self {
            threshold: config.threshold,
            weights: gaussian_weights(config.avg_window),
            samples: VecDeque::new(),
            thresholds: VecDeque::new(),
            next: 0,
        })
    }

    /// Slice against the fixed threshold.
    pub fn process(&mut self, input: &[f64]) -> Vec<u8> {
        self.samples.extend(input);
        self.thresholds.extend(std::iter::repeat(None).take(input.len()));
        self.drain(false)
    }

    /// Slice against a per-sample threshold stream.
    ///
    /// Samples without a matching threshold entry use the fixed threshold.
    pub fn process_with_threshold(&mut self, input: &[f64], thresholds: &[f64]) -> Vec<u8> {
        self.samples.extend(input);
        self.thresholds
            .extend((0..input.len()).map(|i| thresholds.get(i).copied()));
        self.drain(false)
    }

    /// Decide every buffered sample, truncating the window at the end.
    pub fn finish(&mut self) -> Vec<u8> {
        let out = self.drain(true);
        self.reset();
        out
    }

    fn drain(&mut self, flush: bool) -> Vec<u8> {
        let reach = self.weights.len() - 1;
        let mut out = Vec::new();
        while self.next < self.samples.len() && (flush || self.next + reach < self.samples.len()) {
            let mean = self.weighted_mean(self.next);
            let threshold = self.thresholds.pop_front().flatten().unwrap_or(self.threshold);
            out.push(u8::from(mean >= threshold));
            self.next += 1;
        }
        // keep only the history the next decision can see
        let excess = self.next.saturating_sub(reach);
        self.samples.drain(..excess);
        self.next -= excess;
        out
    }

    fn weighted_mean(&self, centre: usize) -> f64 {
        let mut sum = self.samples[centre] * self.weights[0];
        let mut total = self.weights[0];
        for (k, &w) in self.weights.iter().enumerate().skip(1) {
            if let Some(&x) = centre.checked_sub(k).and_then(|i| self.samples.get(i)) {
                sum += x * w;
                total += w;
            }
            if let Some(&x) = self.samples.get(centre + k) {
                sum += x * w;
                total += w;
            }
        }
        sum / total
    }

    /// Window in effect after rounding to an odd size.
    pub fn window(&self) -> usize {
        2 * self.weights.len() - 1
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.thresholds.clear();
        self.next = 0;
    }
}

/// One-sided Gaussian weights for an averaging window.
fn gaussian_weights(window: usize) -> Vec<f64> {
    if window <= 1 {
        return vec![1.0];
    }
    let odd = window | 1;
    let half = (odd + 1) / 2;
    let step = 5.0 / (half - 1) as f64;
    (0..half)
        .map(|k| {
            let x = step * k as f64;
            (-x * x).exp()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_shape() {
        let s = Slicer::new(SlicerConfig { avg_window: 10, threshold: 0.0 }).unwrap();
        assert_eq!(s.window(), 11);
        let w = s.weights();
        assert_eq!(w.len(), 6);
        assert_relative_eq!(w[0], 1.0);
        assert_relative_eq!(w[5], (-25.0f64).exp());
        assert!(w.windows(2).all(|p| p[0] > p[1]));
    }

    #[test]
    fn test_no_averaging() {
        let mut s = Slicer::new(SlicerConfig { avg_window: 1, threshold: 0.0 }).unwrap();
        assert_eq!(s.process(&[-1.0, 0.0, 1.0, -0.5]), vec![0, 1, 1, 0]);
        assert!(s.finish().is_empty());
    }

    #[test]
    fn test_averaging_smooths_spike() {
        let mut s = Slicer::new(SlicerConfig { avg_window: 10, threshold: 0.5 }).unwrap();
        let mut input = vec![0.0; 13];
        input[6] = 0.8;
        let mut out = s.process(&input);
        out.extend(s.finish());
        assert_eq!(out, vec![0; 13]);

        let mut raw = Slicer::new(SlicerConfig { avg_window: 1, threshold: 0.5 }).unwrap();
        assert_eq!(raw.process(&input)[6], 1);
    }

    #[test]
    fn test_chunking_independent() {
        let input: Vec<f64> = (0..64).map(|i| ((i as f64) * 0.7).sin()).collect();
        let config = SlicerConfig { avg_window: 7, threshold: 0.1 };

        let mut whole = Slicer::new(config.clone()).unwrap();
        let mut expected = whole.process(&input);
        expected.extend(whole.finish());
        assert_eq!(expected.len(), input.len());

        let mut chunked = Slicer::new(config).unwrap();
        let mut out = Vec::new();
        for chunk in input.chunks(5) {
            out.extend(chunked.process(chunk));
        }
        out.extend(chunked.finish());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_lookahead_held_back() {
        let mut s = Slicer::new(SlicerConfig { avg_window: 5, threshold: 0.0 }).unwrap();
        // reach of 2 samples
        assert_eq!(s.process(&[1.0, 1.0]).len(), 0);
        assert_eq!(s.process(&[1.0]).len(), 1);
        assert_eq!(s.finish().len(), 2);
    }

    #[test]
    fn test_threshold_stream() {
        let mut s = Slicer::new(SlicerConfig { avg_window: 1, threshold: 0.0 }).unwrap();
        let out = s.process_with_threshold(&[0.5, 0.5, 0.5, 0.5], &[0.4, 0.6]);
        // last two fall back to the fixed threshold
        assert_eq!(out, vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_invalid_window() {
        assert_eq!(
            Slicer::new(SlicerConfig { avg_window: 0, threshold: 0.0 }).unwrap_err(),
            HybridError::InvalidWindow(0)
        );
    }
}
