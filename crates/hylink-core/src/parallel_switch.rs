//! Tx Parallel Switch
//!
//! Sends the same stream over both links at once, for redundancy tests and
//! as a baseline against the hard and soft switches.
//!
//! ```text
//!          ┌──> link 1
//! input ───┤
//!          └──> link 2        spb: constant
//! ```

use crate::types::{HybridError, HybridResult, Sample};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelSwitchConfig {
    /// Samples per bit announced on the metadata stream
    pub samples_per_bit: u8,
}

impl Default for ParallelSwitchConfig {
    fn default() -> Self {
        Self { samples_per_bit: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelOutput<T> {
    pub link_1: Vec<T>,
    pub link_2: Vec<T>,
    pub samples_per_bit: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TxParallelSwitch<T: Sample> {
    samples_per_bit: u8,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Sample> TxParallelSwitch<T> {
    pub fn new(config: ParallelSwitchConfig) -> HybridResult<Self> {
        if config.samples_per_bit == 0 {
            return Err(HybridError::InvalidSamplesPerBit(0));
        }
        Ok(Self {
            samples_per_bit: config.samples_per_bit,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn process(&mut self, input: &[T]) -> ParallelOutput<T> {
        ParallelOutput {
            link_1: input.to_vec(),
            link_2: input.to_vec(),
            samples_per_bit: vec![self.samples_per_bit; input.len()],
        }
    }

    pub fn samples_per_bit(&self) -> u8 {
        self.samples_per_bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_input() {
        let mut sw = TxParallelSwitch::<u8>::new(ParallelSwitchConfig { samples_per_bit: 4 }).unwrap();
        let out = sw.process(&[1, 0, 1]);
        assert_eq!(out.link_1, vec![1, 0, 1]);
        assert_eq!(out.link_2, out.link_1);
        assert_eq!(out.samples_per_bit, vec![4, 4, 4]);
    }

    #[test]
    fn test_zero_spb_rejected() {
        assert!(TxParallelSwitch::<u8>::new(ParallelSwitchConfig { samples_per_bit: 0 }).is_err());
    }
}
