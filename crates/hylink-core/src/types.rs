//! Core types shared by the hybrid-link blocks
//!
//! Every block in this crate is a streaming filter over plain slices of
//! samples. Payload samples are generic over [`Sample`], which lets the same
//! framer, deframer and switch logic run over hard bits (`u8`, `bool`),
//! wider integer words or soft floating-point samples.
//!
//! ## Link triples
//!
//! A received link is described by three sample-aligned streams:
//!
//! ```text
//!   data    : d0  d1  d2 ... d(P-1) | d0  d1 ...
//!   sync    :  1   0   0 ...   0    |  1   0 ...
//!   counter :  n   n   n ...   n    | n+1 n+1 ...
//! ```
//!
//! [`LinkTriple`] keeps the three vectors together so they can never drift
//! out of step.

use serde::{Deserialize, Serialize};

/// Result type for block construction
pub type HybridResult<T> = Result<T, HybridError>;

/// Configuration errors raised when a block is constructed.
///
/// Data-content problems (corrupted headers, lost alignment) are never
/// reported through this type; blocks recover from them in-band.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HybridError {
    #[error("Invalid packet size: {0}. Must be at least 1 sample")]
    InvalidPacketSize(usize),

    #[error("Preamble must contain at least one bit")]
    EmptyPreamble,

    #[error("Preamble element {index} is {value}; only 0 and 1 are allowed")]
    InvalidPreambleBit { index: usize, value: u8 },

    #[error("Invalid counter width: {0}. Must be between 1 and 32 bits")]
    InvalidCounterWidth(u8),

    #[error("Invalid samples per bit: {0}. Must be at least 1")]
    InvalidSamplesPerBit(usize),

    #[error("Allocation table has {shares} entries, expected {expected} (thresholds + 1)")]
    AllocationTableLength { shares: usize, expected: usize },

    #[error("Level table has {levels} entries, expected {expected} (thresholds + 1)")]
    LevelTableLength { levels: usize, expected: usize },

    #[error("Threshold {index} is not strictly greater than its predecessor")]
    UnorderedThresholds { index: usize },

    #[error("Threshold {index} is not a finite number")]
    NonFiniteThreshold { index: usize },

    #[error("Allocation entry {index} gives both links a zero share")]
    ZeroAllocation { index: usize },

    #[error("Invalid hysteresis parameters: {0}")]
    InvalidHysteresis(String),

    #[error("Invalid sample rate: {0}. Must be positive and finite")]
    InvalidSampleRate(f64),

    #[error("Invalid averaging window: {0}. Must be at least 1 sample")]
    InvalidWindow(usize),

    #[error("Invalid delay budget: {0} packets. Must be at least 1")]
    InvalidDelayBudget(usize),
}

/// A payload sample that can carry a hard bit.
///
/// `from_bit` is used when a block synthesises header or padding symbols,
/// `as_bit` when it has to read a hard decision back. Only the exact values
/// zero and one are bits; anything else reads as `None`.
pub trait Sample: Copy + PartialEq + Default + std::fmt::Debug + Send + 'static {
    fn from_bit(bit: bool) -> Self;
    fn as_bit(self) -> Option<bool>;
}

macro_rules! impl_integer_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn from_bit(bit: bool) -> Self {
                    bit as $t
                }

                #[inline]
                fn as_bit(self) -> Option<bool> {
                    match self {
                        0 => Some(false),
                        1 => Some(true),
                        _ => None,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_float_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn from_bit(bit: bool) -> Self {
                    if bit { 1.0 } else { 0.0 }
                }

                #[inline]
                fn as_bit(self) -> Option<bool> {
                    if self == 0.0 {
                        Some(false)
                    } else if self == 1.0 {
                        Some(true)
                    } else {
                        None
                    }
                }
            }
        )*
    };
}

impl_integer_sample!(u8, i8, u16, i16, u32, i32);
impl_float_sample!(f32, f64);

impl Sample for bool {
    #[inline]
    fn from_bit(bit: bool) -> Self {
        bit
    }

    #[inline]
    fn as_bit(self) -> Option<bool> {
        Some(self)
    }
}

/// Identifies one of the two physical links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkId {
    Link1,
    Link2,
}

impl LinkId {
    /// The other link.
    pub fn other(self) -> Self {
        match self {
            LinkId::Link1 => LinkId::Link2,
            LinkId::Link2 => LinkId::Link1,
        }
    }
}

/// Data, sync-pulse and counter streams of one link, kept sample-aligned.
///
/// The fields are public, so a triple may be built ragged. Every method
/// works on the shortest common length and ignores the excess.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkTriple<T> {
    pub data: Vec<T>,
    pub sync: Vec<bool>,
    pub counter: Vec<u32>,
}

impl<T: Sample> LinkTriple<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            sync: Vec::new(),
            counter: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            sync: Vec::with_capacity(capacity),
            counter: Vec::with_capacity(capacity),
        }
    }

    /// Build a triple from three parallel vectors.
    ///
    /// # Panics
    /// Panics if the vectors differ in length.
    pub fn from_parts(data: Vec<T>, sync: Vec<bool>, counter: Vec<u32>) -> Self {
        assert_eq!(data.len(), sync.len(), "sync stream length mismatch");
        assert_eq!(data.len(), counter.len(), "counter stream length mismatch");
        Self { data, sync, counter }
    }

    /// Number of complete (data, sync, counter) samples.
    pub fn len(&self) -> usize {
        self.data.len().min(self.sync.len()).min(self.counter.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn push(&mut self, data: T, sync: bool, counter: u32) {
        self.data.push(data);
        self.sync.push(sync);
        self.counter.push(counter);
    }

    /// Append one full packet: pulse on the first sample, counter held.
    pub fn push_packet(&mut self, payload: &[T], counter: u32) {
        for (i, &s) in payload.iter().enumerate() {
            self.push(s, i == 0, counter);
        }
    }

    pub fn extend_from(&mut self, other: &LinkTriple<T>) {
        let n = other.len();
        self.data.extend_from_slice(&other.data[..n]);
        self.sync.extend_from_slice(&other.sync[..n]);
        self.counter.extend_from_slice(&other.counter[..n]);
    }

    /// Remove and return the first `n` samples.
    pub fn drain_front(&mut self, n: usize) -> LinkTriple<T> {
        let n = n.min(self.len());
        LinkTriple {
            data: self.data.drain(..n).collect(),
            sync: self.sync.drain(..n).collect(),
            counter: self.counter.drain(..n).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.sync.clear();
        self.counter.clear();
    }

    /// Number of sync pulses in the triple.
    pub fn pulses(&self) -> usize {
        self.sync.iter().filter(|&&s| s).count()
    }
}

/// Convert a samples-per-bit metadata value to a usable factor (0 reads as 1).
#[inline]
pub(crate) fn spb_factor(spb: u8) -> usize {
    spb.max(1) as usize
}

pub(crate) fn check_packet_size(packet_size: usize) -> HybridResult<()> {
    if packet_size == 0 {
        return Err(HybridError::InvalidPacketSize(packet_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bits() {
        assert_eq!(u8::from_bit(true), 1);
        assert_eq!(i16::from_bit(false), 0);
        assert_eq!(1u8.as_bit(), Some(true));
        assert_eq!(0i32.as_bit(), Some(false));
        assert_eq!(7u8.as_bit(), None);
        assert_eq!((-1i8).as_bit(), None);
    }

    #[test]
    fn test_float_bits() {
        assert_eq!(f32::from_bit(true), 1.0);
        assert_eq!(1.0f64.as_bit(), Some(true));
        assert_eq!(0.5f64.as_bit(), None);
        assert_eq!(f64::NAN.as_bit(), None);
    }

    #[test]
    fn test_bool_bits() {
        assert!(bool::from_bit(true));
        assert_eq!(false.as_bit(), Some(false));
    }

    #[test]
    fn test_link_triple_packet() {
        let mut triple: LinkTriple<u8> = LinkTriple::new();
        triple.push_packet(&[5, 6, 7], 42);
        triple.push_packet(&[8, 9, 10], 43);
        assert_eq!(triple.len(), 6);
        assert_eq!(triple.sync, vec![true, false, false, true, false, false]);
        assert_eq!(triple.counter, vec![42, 42, 42, 43, 43, 43]);
        assert_eq!(triple.pulses(), 2);

        let head = triple.drain_front(4);
        assert_eq!(head.data, vec![5, 6, 7, 8]);
        assert_eq!(triple.data, vec![9, 10]);
        assert_eq!(triple.counter, vec![43, 43]);
    }

    #[test]
    fn test_ragged_triple_uses_common_length() {
        let ragged = LinkTriple {
            data: vec![1u8, 2, 3, 4],
            sync: vec![true, false],
            counter: vec![7, 7, 7],
        };
        assert_eq!(ragged.len(), 2);

        let mut triple = LinkTriple::new();
        triple.extend_from(&ragged);
        assert_eq!(triple.data, vec![1, 2]);
        assert_eq!(triple.sync, vec![true, false]);
        assert_eq!(triple.counter, vec![7, 7]);
    }

    #[test]
    #[should_panic]
    fn test_from_parts_length_mismatch() {
        let _ = LinkTriple::from_parts(vec![1u8, 2], vec![true], vec![0, 0]);
    }

    #[test]
    fn test_link_other() {
        assert_eq!(LinkId::Link1.other(), LinkId::Link2);
        assert_eq!(LinkId::Link2.other(), LinkId::Link1);
    }

    #[test]
    fn test_error_display() {
        let err = HybridError::AllocationTableLength { shares: 2, expected: 3 };
        assert!(err.to_string().contains("expected 3"));
        assert!(HybridError::InvalidCounterWidth(40).to_string().contains("40"));
    }
}
