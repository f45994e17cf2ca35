//! Stream Aligner
//!
//! Realigns the deframed outputs of two links to a common packet clock.
//! Each link delivers a [`LinkTriple`] (data, sync pulse, counter). Because
//! the links have different latencies, packet N of one link generally
//! arrives some whole number of packets before packet N of the other.
//!
//! ## Operation
//!
//! 1. **Bootstrap.** Wait for a sync pulse on both links at the same
//!    sample. The packet delay is `counter_A - counter_B` on the counter
//!    ring: positive means link A leads, negative means link B leads.
//! 2. **Lock.** The leading link is routed through a delay line of
//!    `|delay| * packet_size` samples, so both outputs carry the same packet
//!    number at the same sample from then on.
//! 3. **Re-validation.** Each link is checked continuously: pulses exactly
//!    `packet_size` apart, counters incrementing by one. Any break drops the
//!    aligner back to bootstrap on the same sample.
//!
//! Until the delay line has filled, and whenever the aligner is not locked,
//! both outputs carry the fill value with no sync pulse and counter zero,
//! and the per-sample [`AlignStatus`] says why.
//!
//! ```text
//! link A  │12 │13 │14 │15 │16 │        delay = 12 - 10 = 2, A leads
//! link B  │10 │11 │12 │13 │14 │
//!
//! out A   │ - │ - │12 │13 │14 │        A delayed by 2 packets
//! out B   │ - │ - │12 │13 │14 │
//! status   fill fill  aligned ...
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::aligner::{AlignerConfig, StreamAligner};
//! use hylink_core::types::LinkTriple;
//!
//! let mut a = LinkTriple::<u8>::new();
//! let mut b = LinkTriple::<u8>::new();
//! for k in 0..4 {
//!     a.push_packet(&[7, 7], 5 + k);
//!     b.push_packet(&[9, 9], 4 + k);
//! }
//!
//! let config = AlignerConfig { packet_size: 2, ..Default::default() };
//! let mut aligner = StreamAligner::<u8>::new(config).unwrap();
//! let out = aligner.process(&a, &b);
//!
//! assert_eq!(aligner.delay(), Some(1));
//! assert_eq!(out.a.counter[2..], out.b.counter[2..]);
//! assert!(!out.status[0].is_valid());
//! assert!(out.status[2].is_valid());
//! ```

use crate::counter::CounterSpace;
use crate::types::{check_packet_size, HybridError, HybridResult, LinkTriple, Sample};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Aligner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Payload samples per packet
    pub packet_size: usize,
    /// Counter field width of both links
    pub counter_width: u8,
    /// Largest packet delay the aligner will buffer
    pub max_delay: usize,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            counter_width: 16,
            max_delay: 5,
        }
    }
}

/// Which link arrives first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leader {
    A,
    B,
    Neither,
}

/// Per-sample alignment status. Only `Aligned` samples are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignStatus {
    /// No coincident sync pulses seen yet
    Searching,
    /// Sync pulses arrived on one link only; the streams are not packet-aligned
    PulseMisaligned,
    /// Measured delay exceeds the configured budget
    DelayTooLong(i64),
    /// Locked, delay line still filling
    Filling(i64),
    /// Both outputs carry the same packet
    Aligned(i64),
}

impl AlignStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, AlignStatus::Aligned(_))
    }

    /// Measured delay, if one is known.
    pub fn delay(&self) -> Option<i64> {
        match *self {
            AlignStatus::DelayTooLong(d) | AlignStatus::Filling(d) | AlignStatus::Aligned(d) => {
                Some(d)
            }
            _ => None,
        }
    }
}

/// Output of one [`StreamAligner::process`] call.
#[derive(Debug, Clone, Default)]
pub struct AlignedBlock<T> {
    pub a: LinkTriple<T>,
    pub b: LinkTriple<T>,
    pub status: Vec<AlignStatus>,
}

type Tap<T> = (T, bool, u32);

impl<T: Sample> AlignedBlock<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            a: LinkTriple::with_capacity(n),
            b: LinkTriple::with_capacity(n),
            status: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, a: Tap<T>, b: Tap<T>, status: AlignStatus) {
        self.a.push(a.0, a.1, a.2);
        self.b.push(b.0, b.1, b.2);
        self.status.push(status);
    }

    fn push_invalid(&mut self, fill: T, status: AlignStatus) {
        self.a.push(fill, false, 0);
        self.b.push(fill, false, 0);
        self.status.push(status);
    }

    pub fn len(&self) -> usize {
        self.status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    /// Number of valid (aligned) samples.
    pub fn valid_samples(&self) -> usize {
        self.status.iter().filter(|s| s.is_valid()).count()
    }
}

/// Aligner counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignerStats {
    /// Times a delay was established
    pub locks: u64,
    /// Times a locked aligner fell back to bootstrap
    pub discontinuities: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Bootstrapping,
    Locked { leader: Leader, delay: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuity {
    Quiet,
    Pulse { counter: u32, continuous: bool },
    MissedPulse,
}

impl Continuity {
    fn is_break(self) -> bool {
        matches!(
            self,
            Continuity::MissedPulse | Continuity::Pulse { continuous: false, .. }
        )
    }
}

/// Checks one link for regular pulses and consecutive counters.
#[derive(Debug, Clone)]
struct LinkTracker {
    packet_size: usize,
    last: Option<u32>,
    /// Samples since the last pulse, counting the pulse itself
    since: usize,
}

impl LinkTracker {
    fn new(packet_size: usize) -> Self {
        Self {
            packet_size,
            last: None,
            since: 0,
        }
    }

    fn observe(&mut self, sync: bool, counter: u32, space: &CounterSpace) -> Continuity {
        if sync {
            let continuous = self
                .last
                .is_some_and(|prev| self.since == self.packet_size && counter == space.next(prev));
            self.last = Some(counter);
            self.since = 1;
            return Continuity::Pulse {
                counter,
                continuous,
            };
        }
        if self.last.is_none() {
            return Continuity::Quiet;
        }
        self.since += 1;
        if self.since == self.packet_size + 1 {
            Continuity::MissedPulse
        } else {
            Continuity::Quiet
        }
    }
}

/// Two-link packet aligner.
#[derive(Debug, Clone)]
pub struct StreamAligner<T: Sample> {
    config: AlignerConfig,
    space: CounterSpace,
    fill: T,
    pending_a: LinkTriple<T>,
    pending_b: LinkTriple<T>,
    track_a: LinkTracker,
    track_b: LinkTracker,
    phase: Phase,
    /// Status reported for bootstrap samples
    boot_status: AlignStatus,
    line: VecDeque<Tap<T>>,
    line_len: usize,
    stats: AlignerStats,
}

impl<T: Sample> StreamAligner<T> {
    pub fn new(config: AlignerConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        if config.max_delay == 0 {
            return Err(HybridError::InvalidDelayBudget(config.max_delay));
        }
        let space = CounterSpace::new(config.counter_width)?;
        Ok(Self {
            space,
            fill: T::default(),
            pending_a: LinkTriple::new(),
            pending_b: LinkTriple::new(),
            track_a: LinkTracker::new(config.packet_size),
            track_b: LinkTracker::new(config.packet_size),
            phase: Phase::Bootstrapping,
            boot_status: AlignStatus::Searching,
            line: VecDeque::with_capacity(config.packet_size * config.max_delay + 1),
            line_len: 0,
            stats: AlignerStats::default(),
            config,
        })
    }

    /// Use `fill` as the data value of invalid output samples.
    pub fn with_fill(mut self, fill: T) -> Self {
        self.fill = fill;
        self
    }

    /// Align as many samples as both links have delivered.
    ///
    /// Inputs of unequal length are fine: the excess of the longer one is
    /// held until the other link catches up.
    pub fn process(&mut self, a: &LinkTriple<T>, b: &LinkTriple<T>) -> AlignedBlock<T> {
        self.pending_a.extend_from(a);
        self.pending_b.extend_from(b);

        let n = self.pending_a.len().min(self.pending_b.len());
        let in_a = self.pending_a.drain_front(n);
        let in_b = self.pending_b.drain_front(n);

        let mut out = AlignedBlock::with_capacity(n);
        for i in 0..n {
            let tap_a = (in_a.data[i], in_a.sync[i], in_a.counter[i]);
            let tap_b = (in_b.data[i], in_b.sync[i], in_b.counter[i]);
            self.step(tap_a, tap_b, &mut out);
        }
        out
    }

    fn step(&mut self, tap_a: Tap<T>, tap_b: Tap<T>, out: &mut AlignedBlock<T>) {
        let ev_a = self.track_a.observe(tap_a.1, tap_a.2, &self.space);
        let ev_b = self.track_b.observe(tap_b.1, tap_b.2, &self.space);

        if let Phase::Locked { delay, .. } = self.phase {
            if ev_a.is_break() || ev_b.is_break() {
                warn!(
                    delay,
                    link_a = ?ev_a,
                    link_b = ?ev_b,
                    "stream discontinuity, re-entering bootstrap"
                );
                self.stats.discontinuities += 1;
                self.unlock();
            }
        }

        if self.phase == Phase::Bootstrapping {
            self.bootstrap(ev_a, ev_b);
        }

        match self.phase {
            Phase::Bootstrapping => out.push_invalid(self.fill, self.boot_status),
            Phase::Locked { leader, delay } => self.emit_locked(leader, delay, tap_a, tap_b, out),
        }
    }

    fn bootstrap(&mut self, ev_a: Continuity, ev_b: Continuity) {
        match (ev_a, ev_b) {
            (Continuity::Pulse { counter: ca, .. }, Continuity::Pulse { counter: cb, .. }) => {
                let delay = self.space.signed_diff(ca, cb);
                if delay.unsigned_abs() as usize > self.config.max_delay {
                    warn!(delay, max = self.config.max_delay, "link delay exceeds budget");
                    self.boot_status = AlignStatus::DelayTooLong(delay);
                } else {
                    self.lock(delay);
                }
            }
            (Continuity::Pulse { .. }, _) | (_, Continuity::Pulse { .. }) => {
                self.boot_status = AlignStatus::PulseMisaligned;
            }
            _ => {}
        }
    }

    fn lock(&mut self, delay: i64) {
        let leader = match delay {
            d if d > 0 => Leader::A,
            d if d < 0 => Leader::B,
            _ => Leader::Neither,
        };
        self.line.clear();
        self.line_len = delay.unsigned_abs() as usize * self.config.packet_size;
        self.phase = Phase::Locked { leader, delay };
        self.stats.locks += 1;
        debug!(delay, ?leader, "stream alignment locked");
    }

    fn unlock(&mut self) {
        self.phase = Phase::Bootstrapping;
        self.boot_status = AlignStatus::Searching;
        self.line.clear();
        self.line_len = 0;
    }

    fn emit_locked(
        &mut self,
        leader: Leader,
        delay: i64,
        tap_a: Tap<T>,
        tap_b: Tap<T>,
        out: &mut AlignedBlock<T>,
    ) {
        let (lead, follow) = match leader {
            Leader::Neither => {
                out.push(tap_a, tap_b, AlignStatus::Aligned(delay));
                return;
            }
            Leader::A => (tap_a, tap_b),
            Leader::B => (tap_b, tap_a),
        };

        self.line.push_back(lead);
        if self.line.len() <= self.line_len {
            out.push_invalid(self.fill, AlignStatus::Filling(delay));
            return;
        }

        match self.line.pop_front() {
            Some(delayed) if leader == Leader::A => {
                out.push(delayed, follow, AlignStatus::Aligned(delay))
            }
            Some(delayed) => out.push(follow, delayed, AlignStatus::Aligned(delay)),
            None => out.push_invalid(self.fill, AlignStatus::Filling(delay)),
        }
    }

    /// Established packet delay (A minus B), if locked.
    pub fn delay(&self) -> Option<i64> {
        match self.phase {
            Phase::Locked { delay, .. } => Some(delay),
            Phase::Bootstrapping => None,
        }
    }

    pub fn leader(&self) -> Option<Leader> {
        match self.phase {
            Phase::Locked { leader, .. } => Some(leader),
            Phase::Bootstrapping => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.phase, Phase::Locked { .. })
    }

    pub fn stats(&self) -> AlignerStats {
        self.stats
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.pending_a.clear();
        self.pending_b.clear();
        self.track_a = LinkTracker::new(self.config.packet_size);
        self.track_b = LinkTracker::new(self.config.packet_size);
        self.unlock();
        self.stats = AlignerStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: usize = 4;

    fn config() -> AlignerConfig {
        AlignerConfig {
            packet_size: P,
            counter_width: 16,
            max_delay: 5,
        }
    }

    /// One link carrying the given counters; data encodes (counter, offset).
    fn link(counters: &[u32]) -> LinkTriple<u32> {
        let mut triple = LinkTriple::new();
        for &c in counters {
            let payload: Vec<u32> = (0..P as u32).map(|i| c * 100 + i).collect();
            triple.push_packet(&payload, c);
        }
        triple
    }

    fn counters(start: u32, n: u32) -> Vec<u32> {
        (start..start + n).collect()
    }

    fn assert_aligned_tail(out: &AlignedBlock<u32>, from: usize) {
        for i in from..out.len() {
            assert!(out.status[i].is_valid(), "sample {} not valid", i);
            assert_eq!(out.a.counter[i], out.b.counter[i]);
            assert_eq!(out.a.data[i], out.b.data[i]);
            assert_eq!(out.a.sync[i], out.b.sync[i]);
            assert_eq!(out.a.sync[i], i % P == 0);
        }
    }

    #[test]
    fn test_link_a_leads() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let out = aligner.process(&link(&counters(12, 10)), &link(&counters(10, 10)));
        assert_eq!(aligner.delay(), Some(2));
        assert_eq!(aligner.leader(), Some(Leader::A));
        assert!(out.status[..2 * P].iter().all(|s| *s == AlignStatus::Filling(2)));
        assert!(out.a.data[..2 * P].iter().all(|&d| d == 0));
        assert_aligned_tail(&out, 2 * P);
        assert_eq!(out.a.counter[2 * P], 12);
    }

    #[test]
    fn test_link_b_leads() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let out = aligner.process(&link(&counters(40, 10)), &link(&counters(43, 10)));
        assert_eq!(aligner.delay(), Some(-3));
        assert_eq!(aligner.leader(), Some(Leader::B));
        assert_aligned_tail(&out, 3 * P);
        assert_eq!(out.valid_samples(), 7 * P);
    }

    #[test]
    fn test_zero_delay() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let out = aligner.process(&link(&counters(7, 3)), &link(&counters(7, 3)));
        assert_eq!(aligner.leader(), Some(Leader::Neither));
        assert_aligned_tail(&out, 0);
    }

    #[test]
    fn test_delay_across_counter_wrap() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let a: Vec<u32> = (0..6).map(|k| (0xFFFF + k) & 0xFFFF).collect();
        let b: Vec<u32> = (0..6).map(|k| (0xFFFD + k) & 0xFFFF).collect();
        let out = aligner.process(&link(&a), &link(&b));
        assert_eq!(aligner.delay(), Some(2));
        assert_aligned_tail(&out, 2 * P);
    }

    #[test]
    fn test_delay_over_budget() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let out = aligner.process(&link(&counters(20, 4)), &link(&counters(13, 4)));
        assert_eq!(aligner.delay(), None);
        assert_eq!(out.valid_samples(), 0);
        assert!(out.status.iter().all(|s| *s == AlignStatus::DelayTooLong(7)));
        assert!(out.a.sync.iter().all(|&s| !s));
    }

    #[test]
    fn test_uneven_chunks_match_single_call() {
        let a = link(&counters(3, 8));
        let b = link(&counters(2, 8));

        let mut whole = StreamAligner::new(config()).unwrap();
        let expected = whole.process(&a, &b);

        let mut chunked = StreamAligner::new(config()).unwrap();
        let mut got = AlignedBlock::default();
        let mut ia = 0;
        let mut ib = 0;
        while ia < a.len() || ib < b.len() {
            let ea = (ia + 3).min(a.len());
            let eb = (ib + 5).min(b.len());
            let ca = LinkTriple::from_parts(
                a.data[ia..ea].to_vec(),
                a.sync[ia..ea].to_vec(),
                a.counter[ia..ea].to_vec(),
            );
            let cb = LinkTriple::from_parts(
                b.data[ib..eb].to_vec(),
                b.sync[ib..eb].to_vec(),
                b.counter[ib..eb].to_vec(),
            );
            let part = chunked.process(&ca, &cb);
            got.a.extend_from(&part.a);
            got.b.extend_from(&part.b);
            got.status.extend(part.status);
            ia = ea;
            ib = eb;
        }

        assert_eq!(got.a, expected.a);
        assert_eq!(got.b, expected.b);
        assert_eq!(got.status, expected.status);
    }

    #[test]
    fn test_counter_jump_relocks() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let b = link(&[10, 11, 12, 14, 15, 16, 17, 18, 19, 20]);
        let out = aligner.process(&link(&counters(12, 10)), &b);

        assert_eq!(out.status[2 * P], AlignStatus::Aligned(2));
        assert_eq!(out.status[3 * P], AlignStatus::Filling(1));
        assert_eq!(out.status[4 * P], AlignStatus::Aligned(1));
        assert_aligned_tail(&out, 4 * P);
        assert_eq!(aligner.delay(), Some(1));
        assert_eq!(aligner.stats().discontinuities, 1);
        assert_eq!(aligner.stats().locks, 2);
    }

    #[test]
    fn test_missing_pulse_relocks() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let mut b = link(&counters(10, 10));
        b.sync[4 * P] = false;
        let out = aligner.process(&link(&counters(12, 10)), &b);

        assert_eq!(out.status[4 * P], AlignStatus::PulseMisaligned);
        assert_eq!(out.status[5 * P - 1], AlignStatus::PulseMisaligned);
        assert_eq!(out.status[5 * P], AlignStatus::Filling(2));
        assert_aligned_tail(&out, 7 * P);
        assert_eq!(aligner.stats().discontinuities, 1);
        assert_eq!(aligner.stats().locks, 2);
    }

    #[test]
    fn test_misaligned_pulses_never_lock() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let a = link(&counters(0, 5));
        let mut b = LinkTriple::new();
        b.push(0u32, false, 0);
        b.extend_from(&link(&counters(0, 5)));
        let out = aligner.process(&a, &b);
        assert!(!aligner.is_locked());
        assert_eq!(out.status[0], AlignStatus::PulseMisaligned);
        assert_eq!(out.valid_samples(), 0);
    }

    #[test]
    fn test_fill_value() {
        let mut aligner = StreamAligner::new(config()).unwrap().with_fill(255u32);
        let out = aligner.process(&link(&counters(1, 3)), &link(&counters(0, 3)));
        assert!(out.a.data[..P].iter().all(|&d| d == 255));
        assert!(out.b.data[..P].iter().all(|&d| d == 255));
        assert_eq!(out.status[0].delay(), Some(1));
    }

    #[test]
    fn test_searching_before_first_pulse() {
        let mut aligner = StreamAligner::<u8>::new(config()).unwrap();
        let quiet = LinkTriple::from_parts(vec![0u8; 3], vec![false; 3], vec![0; 3]);
        let out = aligner.process(&quiet, &quiet);
        assert!(out.status.iter().all(|s| *s == AlignStatus::Searching));
    }

    #[test]
    fn test_ragged_input_uses_common_length() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        let mut a = link(&counters(1, 3));
        a.sync.truncate(2 * P + 1);
        let out = aligner.process(&a, &link(&counters(0, 3)));
        assert_eq!(out.len(), 2 * P + 1);
        assert_eq!(out.a.len(), out.b.len());
    }

    #[test]
    fn test_invalid_config() {
        let mut bad = config();
        bad.max_delay = 0;
        assert!(StreamAligner::<u8>::new(bad).is_err());
        let mut bad = config();
        bad.counter_width = 0;
        assert!(StreamAligner::<u8>::new(bad).is_err());
    }

    #[test]
    fn test_reset() {
        let mut aligner = StreamAligner::new(config()).unwrap();
        aligner.process(&link(&counters(1, 3)), &link(&counters(0, 3)));
        assert!(aligner.is_locked());
        aligner.reset();
        assert!(!aligner.is_locked());
        assert_eq!(aligner.stats(), AlignerStats::default());
    }
}
