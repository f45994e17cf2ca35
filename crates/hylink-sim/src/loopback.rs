//! Loopback Link
//!
//! A deterministic stand-in for a physical link between a framer and a
//! deframer. It reproduces the impairments the receive chain has to cope
//! with, nothing more:
//!
//! ```text
//! tx ──> [skip first N] ──> [bit flips] ──> [prepend delay zeros + junk] ──> rx
//! ```
//!
//! - `skip`: samples lost before the receiver came up (the link joins late)
//! - `flips`: absolute sample positions (counted on the transmitted stream)
//!   whose binary value is inverted
//! - `flip_probability`: seeded random bit errors on every sample
//! - `delay`: zero samples ahead of the stream
//! - `junk`: seeded random bits ahead of the stream, after the delay
//!
//! Non-binary samples pass through unflipped.

use crate::error::{SimError, SimResult};
use hylink_core::Sample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub skip: usize,
    pub delay: usize,
    pub junk: usize,
    pub flips: Vec<usize>,
    pub flip_probability: f64,
    pub seed: u64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            skip: 0,
            delay: 0,
            junk: 0,
            flips: Vec::new(),
            flip_probability: 0.0,
            seed: 0,
        }
    }
}

impl LoopbackConfig {
    /// An ideal link.
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn with_flips(mut self, flips: impl IntoIterator<Item = usize>) -> Self {
        self.flips.extend(flips);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackLink {
    config: LoopbackConfig,
    flips: BTreeSet<usize>,
    rng: StdRng,
    /// Samples of the transmitted stream seen so far
    position: usize,
    started: bool,
    flipped: u64,
}

impl LoopbackLink {
    pub fn new(config: LoopbackConfig) -> SimResult<Self> {
        if !(0.0..=1.0).contains(&config.flip_probability) {
            return Err(SimError::InvalidLink(format!(
                "flip probability {} outside [0, 1]",
                config.flip_probability
            )));
        }
        Ok(Self {
            flips: config.flips.iter().copied().collect(),
            rng: StdRng::seed_from_u64(config.seed),
            position: 0,
            started: false,
            flipped: 0,
            config,
        })
    }

    /// Carry one chunk of the transmitted stream.
    pub fn transmit<T: Sample>(&mut self, input: &[T]) -> Vec<T> {
        let mut out = Vec::with_capacity(input.len());
        if !self.started {
            self.started = true;
            out.extend(std::iter::repeat(T::default()).take(self.config.delay));
            for _ in 0..self.config.junk {
                out.push(T::from_bit(self.rng.gen::<bool>()));
            }
        }

        for &x in input {
            let at = self.position;
            self.position += 1;
            if at < self.config.skip {
                continue;
            }
            let forced = self.flips.contains(&at);
            let random =
                self.config.flip_probability > 0.0 && self.rng.gen_bool(self.config.flip_probability);
            out.push(if forced ^ random { self.flip(x) } else { x });
        }
        out
    }

    fn flip<T: Sample>(&mut self, x: T) -> T {
        match x.as_bit() {
            Some(bit) => {
                self.flipped += 1;
                T::from_bit(!bit)
            }
            None => x,
        }
    }

    /// Samples whose value was actually inverted.
    pub fn flipped(&self) -> u64 {
        self.flipped
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }
}
