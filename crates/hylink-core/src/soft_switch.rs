//! Soft Switch (Rx / Tx)
//!
//! Proportional, rate-adaptive sharing of one packet between two links.
//! A per-packet capacity metric picks a bucket from a sorted threshold
//! table (see [`ThresholdTable`]); the bucket's share pair
//! `(SpP_1, SpP_2)` fixes how many input samples each link carries:
//!
//! ```text
//! samples_1 = floor(P * SpP_2 / (SpP_1 + SpP_2))     ratio_1 = floor(P / samples_1)
//! samples_2 = P - samples_1                          ratio_2 = floor(P / samples_2)
//!
//!  Tx, one packet of P input samples:
//!  ┌──────── samples_1 ────────┬──── samples_2 ────┐
//!  │ x0 x1 ...                 │ ...           xP-1│
//!  └────────────┬──────────────┴─────────┬─────────┘
//!    stretch by ratio_1, pad        stretch by ratio_2, pad
//!               ▼                        ▼
//!       link 1: P samples        link 2: P samples
//! ```
//!
//! The Rx switch inverts this: it decimates each link by its ratio, keeps
//! `samples_i` samples and concatenates them back into one packet. For
//! any bucket, `samples_1 + samples_2 == P` and every input sample is
//! carried by exactly one link.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::soft_switch::{RxSoftSwitch, SoftSwitchConfig, TxSoftSwitch};
//!
//! let config = SoftSwitchConfig { packet_size: 6, ..Default::default() };
//! let mut tx = TxSoftSwitch::<u8>::new(config.clone()).unwrap();
//! let mut rx = RxSoftSwitch::<u8>::new(config).unwrap();
//!
//! let input = [1, 2, 3, 4, 5, 6];
//! let metric = [-1.0; 6]; // bucket 0: shares (1, 2)
//! let sent = tx.process(&input, &metric);
//! assert_eq!(sent.link_1, vec![1, 2, 3, 4, 0, 0]);
//! assert_eq!(sent.link_2, vec![5, 5, 5, 6, 6, 6]);
//!
//! let received = rx.process(&sent.link_1, &sent.link_2, &metric);
//! assert_eq!(received, input);
//! ```

use crate::buckets::ThresholdTable;
use crate::resample::{decimate, stretch};
use crate::stream::{packet_heads, PacketBuffer};
use crate::types::{check_packet_size, HybridError, HybridResult, Sample};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Soft switch configuration, shared by the Rx and Tx variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftSwitchConfig {
    pub packet_size: usize,
    /// Strictly increasing bucket boundaries
    pub thresholds: Vec<f64>,
    /// Share SpP_1 per bucket (thresholds + 1 entries)
    pub shares_1: Vec<u32>,
    /// Share SpP_2 per bucket (thresholds + 1 entries)
    pub shares_2: Vec<u32>,
}

impl Default for SoftSwitchConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            thresholds: vec![0.0],
            shares_1: vec![1, 2],
            shares_2: vec![2, 1],
        }
    }
}

/// Per-bucket split of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Input samples carried by link 1
    pub samples_1: usize,
    /// Input samples carried by link 2
    pub samples_2: usize,
    /// Stretch factor on link 1 (0 when link 1 is idle)
    pub ratio_1: usize,
    /// Stretch factor on link 2 (0 when link 2 is idle)
    pub ratio_2: usize,
}

impl Allocation {
    fn new(packet_size: usize, share_1: u32, share_2: u32) -> Self {
        let total = share_1 as u64 + share_2 as u64;
        let samples_1 = (packet_size as u64 * share_2 as u64 / total) as usize;
        let samples_2 = packet_size - samples_1;
        let ratio = |n: usize| if n == 0 { 0 } else { packet_size / n };
        Self {
            samples_1,
            samples_2,
            ratio_1: ratio(samples_1),
            ratio_2: ratio(samples_2),
        }
    }
}

/// Validated threshold table with one allocation per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTable {
    thresholds: ThresholdTable,
    allocations: Vec<Allocation>,
}

impl AllocationTable {
    pub fn new(config: &SoftSwitchConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        let thresholds = ThresholdTable::new(config.thresholds.clone())?;
        let expected = thresholds.buckets();
        for shares in [&config.shares_1, &config.shares_2] {
            if shares.len() != expected {
                return Err(HybridError::AllocationTableLength {
                    shares: shares.len(),
                    expected,
                });
            }
        }

        let mut allocations = Vec::with_capacity(expected);
        for (index, (&s1, &s2)) in config.shares_1.iter().zip(&config.shares_2).enumerate() {
            if s1 == 0 && s2 == 0 {
                return Err(HybridError::ZeroAllocation { index });
            }
            allocations.push(Allocation::new(config.packet_size, s1, s2));
        }
        Ok(Self {
            thresholds,
            allocations,
        })
    }

    /// Bucket index and allocation for a capacity metric.
    pub fn lookup(&self, metric: f64) -> (usize, Allocation) {
        let bucket = self.thresholds.index_of(metric);
        (bucket, self.allocations[bucket])
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }
}

fn clamp_spb(ratio: usize) -> u8 {
    u8::try_from(ratio).unwrap_or(u8::MAX)
}

/// Output of [`TxSoftSwitch::process`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSoftOutput<T> {
    pub link_1: Vec<T>,
    pub link_2: Vec<T>,
    /// Stretch factor (samples per input sample) of each link, per sample
    pub samples_per_bit_1: Vec<u8>,
    pub samples_per_bit_2: Vec<u8>,
    /// Bucket index per packet
    pub buckets: Vec<usize>,
}

/// Transmit-side soft switch: splits one stream across two links.
#[derive(Debug, Clone)]
pub struct TxSoftSwitch<T: Sample> {
    packet_size: usize,
    table: AllocationTable,
    input: PacketBuffer<T>,
    metric: PacketBuffer<f64>,
}

impl<T: Sample> TxSoftSwitch<T> {
    pub fn new(config: SoftSwitchConfig) -> HybridResult<Self> {
        let table = AllocationTable::new(&config)?;
        Ok(Self {
            packet_size: config.packet_size,
            table,
            input: PacketBuffer::new(config.packet_size),
            metric: PacketBuffer::new(config.packet_size),
        })
    }

    pub fn process(&mut self, input: &[T], metric: &[f64]) -> TxSoftOutput<T> {
        self.input.push(input);
        self.metric.push(metric);
        let packets = self.input.packets().min(self.metric.packets());
        let data = self.input.take(packets);
        let metric = self.metric.take(packets);

        let p = self.packet_size;
        let mut out = TxSoftOutput::default();
        for (packet, m) in data.chunks_exact(p).zip(packet_heads(&metric, p)) {
            let (bucket, alloc) = self.table.lookup(m);
            let (head, tail) = packet.split_at(alloc.samples_1);
            out.link_1.extend(stretch(head, alloc.ratio_1, p));
            out.link_2.extend(stretch(tail, alloc.ratio_2, p));
            out.samples_per_bit_1
                .extend(std::iter::repeat(clamp_spb(alloc.ratio_1)).take(p));
            out.samples_per_bit_2
                .extend(std::iter::repeat(clamp_spb(alloc.ratio_2)).take(p));
            out.buckets.push(bucket);
            trace!(metric = m, bucket, samples_1 = alloc.samples_1, "tx soft switch");
        }
        out
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.metric.clear();
    }
}

/// Receive-side soft switch: recombines the two links into one stream.
#[derive(Debug, Clone)]
pub struct RxSoftSwitch<T: Sample> {
    packet_size: usize,
    table: AllocationTable,
    link_1: PacketBuffer<T>,
    link_2: PacketBuffer<T>,
    metric: PacketBuffer<f64>,
}

impl<T: Sample> RxSoftSwitch<T> {
    pub fn new(config: SoftSwitchConfig) -> HybridResult<Self> {
        let table = AllocationTable::new(&config)?;
        Ok(Self {
            packet_size: config.packet_size,
            table,
            link_1: PacketBuffer::new(config.packet_size),
            link_2: PacketBuffer::new(config.packet_size),
            metric: PacketBuffer::new(config.packet_size),
        })
    }

    pub fn process(&mut self, link_1: &[T], link_2: &[T], metric: &[f64]) -> Vec<T> {
        self.link_1.push(link_1);
        self.link_2.push(link_2);
        self.metric.push(metric);
        let packets = self
            .link_1
            .packets()
            .min(self.link_2.packets())
            .min(self.metric.packets());
        let l1 = self.link_1.take(packets);
        let l2 = self.link_2.take(packets);
        let metric = self.metric.take(packets);

        let p = self.packet_size;
        let mut out = Vec::with_capacity(packets * p);
        for (k, m) in packet_heads(&metric, p).enumerate() {
            let (_, alloc) = self.table.lookup(m);
            let range = k * p..(k + 1) * p;
            out.extend(decimate(&l1[range.clone()], alloc.ratio_1, alloc.samples_1));
            out.extend(decimate(&l2[range], alloc.ratio_2, alloc.samples_2));
        }
        out
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn reset(&mut self) {
        self.link_1.clear();
        self.link_2.clear();
        self.metric.clear();
    }
}
