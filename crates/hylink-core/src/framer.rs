//! Framer (Add Header)
//!
//! Cuts a continuous payload stream into fixed-size packets and prepends a
//! header (preamble + label + packet counter) to each one. The counter
//! starts at the configured initial value, increments by one per packet and
//! wraps modulo 2^counter_width.
//!
//! Payload that does not yet fill a whole packet is held until the next
//! call. At end of stream, [`Framer::finish`] discards the held remainder
//! and reports how many samples were dropped; a partial packet is never
//! emitted.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::framer::{Framer, FramerConfig};
//!
//! let config = FramerConfig { packet_size: 4, ..Default::default() };
//! let mut framer = Framer::<u8>::new(config).unwrap();
//!
//! let out = framer.process(&[7, 7, 7, 7, 9, 9]);
//! assert_eq!(out.len(), 48 + 4);    // one header + one packet
//! assert_eq!(framer.pending(), 2);  // held for the next call
//! assert_eq!(framer.counter(), 1);
//! ```

use crate::counter::CounterSpace;
use crate::header::HeaderDescriptor;
use crate::types::{check_packet_size, HybridResult, Sample};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Framer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Payload samples per packet
    pub packet_size: usize,
    /// Header layout
    pub header: HeaderDescriptor,
    /// Counter value of the first packet
    pub initial_counter: u32,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            header: HeaderDescriptor::default(),
            initial_counter: 0,
        }
    }
}

/// Streaming packet framer.
#[derive(Debug, Clone)]
pub struct Framer<T: Sample> {
    config: FramerConfig,
    space: CounterSpace,
    /// Preamble + label samples, identical for every packet
    prefix: Vec<T>,
    counter: u32,
    pending: Vec<T>,
    packets: u64,
}

impl<T: Sample> Framer<T> {
    pub fn new(config: FramerConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        config.header.validate()?;
        let space = config.header.counter_space()?;
        let prefix = config.header.prefix_samples();
        let counter = space.wrap(config.initial_counter as u64);
        Ok(Self {
            prefix,
            space,
            counter,
            pending: Vec::with_capacity(config.packet_size),
            packets: 0,
            config,
        })
    }

    /// Frame as many whole packets as the held and new payload allows.
    pub fn process(&mut self, input: &[T]) -> Vec<T> {
        self.pending.extend_from_slice(input);

        let packet_size = self.config.packet_size;
        let full = self.pending.len() / packet_size;
        let mut out = Vec::with_capacity(full * self.frame_len());

        for chunk in self.pending.chunks_exact(packet_size) {
            out.extend_from_slice(&self.prefix);
            out.extend(self.config.header.counter_samples::<T>(self.counter));
            out.extend_from_slice(chunk);
            trace!(counter = self.counter, "framed packet");
            self.counter = self.space.next(self.counter);
            self.packets += 1;
        }

        self.pending.drain(..full * packet_size);
        out
    }

    /// End of stream: drop the held partial packet and return its length.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Counter value the next packet will carry.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Payload samples held for the next packet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn packets_framed(&self) -> u64 {
        self.packets
    }

    /// Header plus payload length in samples.
    pub fn frame_len(&self) -> usize {
        self.config.header.header_len() + self.config.packet_size
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.counter = self.space.wrap(self.config.initial_counter as u64);
        self.pending.clear();
        self.packets = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{bits_to_u32, majority_bits};

    fn small_config() -> FramerConfig {
        FramerConfig {
            packet_size: 8,
            header: HeaderDescriptor {
                preamble: vec![1, 0, 1, 1],
                label: "X".to_string(),
                counter_width: 4,
                samples_per_bit: 1,
            },
            initial_counter: 0,
        }
    }

    #[test]
    fn test_single_packet_layout() {
        let mut framer = Framer::<u8>::new(small_config()).unwrap();
        let payload = [9u8; 8];
        let out = framer.process(&payload);
        assert_eq!(out.len(), 4 + 8 + 4 + 8);
        assert_eq!(&out[..4], &[1, 0, 1, 1]);
        // 'X' = 0x58, LSB first
        assert_eq!(&out[4..12], &[0, 0, 0, 1, 1, 0, 1, 0]);
        assert_eq!(&out[12..16], &[0, 0, 0, 0]);
        assert_eq!(&out[16..], &payload);
    }

    #[test]
    fn test_counter_increments_and_wraps() {
        let mut config = small_config();
        config.initial_counter = 14;
        let mut framer = Framer::<u8>::new(config).unwrap();
        let out = framer.process(&[5u8; 24]);
        let frame = framer.frame_len();
        assert_eq!(out.len(), 3 * frame);

        let counters: Vec<u32> = (0..3)
            .map(|k| {
                let start = k * frame + 12;
                bits_to_u32(&majority_bits(out[start..start + 4].iter().copied(), 1))
            })
            .collect();
        assert_eq!(counters, vec![14, 15, 0]);
        assert_eq!(framer.counter(), 1);
    }

    #[test]
    fn test_partial_payload_held() {
        let mut framer = Framer::<u8>::new(small_config()).unwrap();
        assert!(framer.process(&[3u8; 5]).is_empty());
        assert_eq!(framer.pending(), 5);

        let out = framer.process(&[4u8; 5]);
        assert_eq!(out.len(), framer.frame_len());
        assert_eq!(&out[16..], &[3, 3, 3, 3, 3, 4, 4, 4]);
        assert_eq!(framer.pending(), 2);
    }

    #[test]
    fn test_finish_drops_remainder() {
        let mut framer = Framer::<u8>::new(small_config()).unwrap();
        framer.process(&[1u8; 11]);
        assert_eq!(framer.finish(), 3);
        assert_eq!(framer.pending(), 0);
        assert!(framer.process(&[]).is_empty());
    }

    #[test]
    fn test_oversampled_header() {
        let mut config = small_config();
        config.header.samples_per_bit = 3;
        let mut framer = Framer::<f32>::new(config).unwrap();
        let out = framer.process(&[0.25f32; 8]);
        assert_eq!(out.len(), 16 * 3 + 8);
        assert_eq!(&out[..6], &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = small_config();
        config.packet_size = 0;
        assert!(Framer::<u8>::new(config).is_err());

        let mut config = small_config();
        config.header.counter_width = 0;
        assert!(Framer::<u8>::new(config).is_err());
    }

    #[test]
    fn test_reset() {
        let mut framer = Framer::<u8>::new(small_config()).unwrap();
        framer.process(&[1u8; 19]);
        assert_eq!(framer.counter(), 2);
        framer.reset();
        assert_eq!(framer.counter(), 0);
        assert_eq!(framer.pending(), 0);
        assert_eq!(framer.packets_framed(), 0);
    }
}
