//! Packet Header Descriptor
//!
//! Describes the header that the [`Framer`](crate::framer::Framer) prepends
//! to every payload packet and that the
//! [`Deframer`](crate::deframer::Deframer) searches for:
//!
//! ```text
//! ┌──────────────┬────────────────────┬─────────────────┬───────────────┐
//! │ Preamble     │ Label              │ Counter         │ Payload       │
//! │ |P| bits     │ 8 bits / character │ W bits          │ PacketSize    │
//! │              │ LSB first          │ LSB first       │ samples       │
//! └──────────────┴────────────────────┴─────────────────┴───────────────┘
//!   each header bit repeated `samples_per_bit` times
//! ```
//!
//! The label is encoded from its UTF-8 bytes, so a non-ASCII character
//! occupies more than eight bits.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::header::HeaderDescriptor;
//!
//! let header = HeaderDescriptor::default();
//! assert_eq!(header.header_len(), (16 + 16 + 16) * 1);
//!
//! let encoded: Vec<u8> = header.encode(3);
//! assert_eq!(encoded.len(), header.header_len());
//! ```

use crate::counter::CounterSpace;
use crate::types::{HybridError, HybridResult, Sample};
use serde::{Deserialize, Serialize};

/// Default preamble of the hybrid testbed.
pub const DEFAULT_PREAMBLE: [u8; 16] = [0, 0, 1, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 1, 0, 0];

/// Header layout shared by a framer/deframer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderDescriptor {
    /// Preamble bits (0 or 1), matched exactly by the deframer
    pub preamble: Vec<u8>,
    /// Link label, 8 bits per byte
    pub label: String,
    /// Counter field width in bits (1..=32)
    pub counter_width: u8,
    /// Oversampling applied to every header bit
    pub samples_per_bit: usize,
}

impl Default for HeaderDescriptor {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_vec(),
            label: "L1".to_string(),
            counter_width: 16,
            samples_per_bit: 1,
        }
    }
}

impl HeaderDescriptor {
    /// Default layout with a different label.
    pub fn with_label(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> HybridResult<()> {
        if self.preamble.is_empty() {
            return Err(HybridError::EmptyPreamble);
        }
        if let Some((index, &value)) = self.preamble.iter().enumerate().find(|(_, &b)| b > 1) {
            return Err(HybridError::InvalidPreambleBit { index, value });
        }
        if self.samples_per_bit == 0 {
            return Err(HybridError::InvalidSamplesPerBit(self.samples_per_bit));
        }
        CounterSpace::new(self.counter_width)?;
        Ok(())
    }

    pub fn counter_space(&self) -> HybridResult<CounterSpace> {
        CounterSpace::new(self.counter_width)
    }

    /// Preamble length in samples.
    pub fn preamble_len(&self) -> usize {
        self.preamble.len() * self.samples_per_bit
    }

    /// Label field length in samples.
    pub fn label_len(&self) -> usize {
        self.label.len() * 8 * self.samples_per_bit
    }

    /// Counter field length in samples.
    pub fn counter_len(&self) -> usize {
        self.counter_width as usize * self.samples_per_bit
    }

    /// Total header length in samples.
    pub fn header_len(&self) -> usize {
        self.preamble_len() + self.label_len() + self.counter_len()
    }

    /// Label as a bit sequence, LSB first within each byte.
    pub fn label_bits(&self) -> Vec<bool> {
        self.label
            .as_bytes()
            .iter()
            .flat_map(|&byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
            .collect()
    }

    /// Preamble expanded to samples.
    pub fn preamble_samples<T: Sample>(&self) -> Vec<T> {
        let bits: Vec<bool> = self.preamble.iter().map(|&b| b == 1).collect();
        repeat_bits(&bits, self.samples_per_bit)
    }

    /// Preamble and label expanded to samples; constant for every packet.
    pub fn prefix_samples<T: Sample>(&self) -> Vec<T> {
        let mut out = self.preamble_samples();
        out.extend(repeat_bits::<T>(&self.label_bits(), self.samples_per_bit));
        out
    }

    /// Counter field expanded to samples.
    pub fn counter_samples<T: Sample>(&self, counter: u32) -> Vec<T> {
        repeat_bits(&u32_to_bits(counter, self.counter_width as usize), self.samples_per_bit)
    }

    /// Full header for the given counter value.
    pub fn encode<T: Sample>(&self, counter: u32) -> Vec<T> {
        let mut out = self.prefix_samples();
        out.extend(self.counter_samples::<T>(counter));
        out
    }
}

/// Repeat every bit `samples_per_bit` times.
pub fn repeat_bits<T: Sample>(bits: &[bool], samples_per_bit: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(bits.len() * samples_per_bit);
    for &bit in bits {
        out.extend(std::iter::repeat(T::from_bit(bit)).take(samples_per_bit));
    }
    out
}

/// Decode oversampled header symbols by majority vote over each run.
///
/// A run decodes to one when more than half of its samples read as one;
/// samples that are not bits count as zero. A trailing partial run is
/// ignored.
pub fn majority_bits<T, I>(samples: I, samples_per_bit: usize) -> Vec<bool>
where
    T: Sample,
    I: IntoIterator<Item = T>,
{
    let spb = samples_per_bit.max(1);
    let mut bits = Vec::new();
    let mut ones = 0usize;
    let mut seen = 0usize;
    for s in samples {
        if s.as_bit() == Some(true) {
            ones += 1;
        }
        seen += 1;
        if seen == spb {
            bits.push(ones * 2 > spb);
            ones = 0;
            seen = 0;
        }
    }
    bits
}

/// Unsigned value to `width` bits, LSB first.
pub fn u32_to_bits(value: u32, width: usize) -> Vec<bool> {
    (0..width).map(|i| i < 32 && (value >> i) & 1 == 1).collect()
}

/// Bits (LSB first) to an unsigned value. Bits beyond 32 are ignored.
pub fn bits_to_u32(bits: &[bool]) -> u32 {
    bits.iter()
        .take(32)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | ((b as u32) << i))
}
