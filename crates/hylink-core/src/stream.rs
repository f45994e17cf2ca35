//! Packet-granular input buffering
//!
//! Per-packet blocks (switches, gates, metres) may be fed slices of any
//! length. [`PacketBuffer`] holds each input until whole packets are
//! available, so a block with several inputs can consume them in lockstep
//! regardless of how the caller chunks the streams.

/// FIFO that releases samples a whole packet at a time.
#[derive(Debug, Clone)]
pub struct PacketBuffer<T> {
    packet_size: usize,
    buf: Vec<T>,
}

impl<T: Copy> PacketBuffer<T> {
    /// `packet_size` must be non-zero; blocks validate it before building
    /// their buffers.
    pub fn new(packet_size: usize) -> Self {
        Self {
            packet_size: packet_size.max(1),
            buf: Vec::new(),
        }
    }

    pub fn push(&mut self, input: &[T]) {
        self.buf.extend_from_slice(input);
    }

    /// Whole packets ready to be taken.
    pub fn packets(&self) -> usize {
        self.buf.len() / self.packet_size
    }

    /// Samples held in total.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remove `count` packets from the front, concatenated.
    pub fn take(&mut self, count: usize) -> Vec<T> {
        let n = (count * self.packet_size).min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }
}

/// First sample of every packet in a slice of whole packets.
pub(crate) fn packet_heads<T: Copy>(samples: &[T], packet_size: usize) -> impl Iterator<Item = T> + '_ {
    samples.chunks_exact(packet_size).map(|p| p[0])
}
