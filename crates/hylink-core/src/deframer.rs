//! Deframer (Remove Header)
//!
//! Recovers packets from an unsynchronised stream produced by a
//! [`Framer`](crate::framer::Framer): finds the preamble, checks the label,
//! decodes the packet counter and passes the payload through together with
//! a sync pulse and the counter value.
//!
//! ## State machine
//!
//! ```text
//!             preamble matched            label ok
//! Searching ─────────────────▶ MatchingLabel ─────────▶ ReadingCounter
//!     ▲                            │ mismatch                │
//!     │   resume one sample after  │                         │ counter ok
//!     └──── the failed match ◀─────┘◀──── counter rejected ──┤
//!     │                                                      ▼
//!     └──────────────── payload passed ◀──────────── PassingPayload
//! ```
//!
//! The preamble must match exactly, sample for sample. Label and counter
//! bits are majority-decoded per oversampled run, so isolated sample errors
//! inside those fields are tolerated. A rejected header never stalls the
//! stream: scanning restarts one sample after the start of the rejected
//! preamble.
//!
//! ## Counter verification
//!
//! Once a header has been accepted, the deframer knows how many samples
//! separate consecutive headers. A later header found a whole number of
//! frames away must carry the counter predicted from that distance; if it
//! does not, the counter field is treated as corrupted and the packet is
//! dropped. A rejected header is remembered as a candidate, so a genuine
//! renumbering by the transmitter is accepted on the following packet.
//!
//! The first accepted header has nothing to be checked against, so it is
//! provisional: its packet is held back until the next header, found a
//! whole number of frames later, confirms the counter. If that header
//! disagrees, the held packet is dropped and the new header takes its
//! place. A corrupted first counter therefore costs only its own packet.
//! Headers found at a distance that is not a whole number of frames mark a
//! stream discontinuity and are accepted as-is.
//!
//! ## Output
//!
//! Every payload sample is emitted with its sync flag (set on the first
//! sample of the packet only) and the packet counter, held across the whole
//! packet. A packet is only emitted once all of its payload has arrived,
//! and, with counter verification on, the very first packet only once a
//! second header has confirmed it.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::deframer::{Deframer, DeframerConfig};
//! use hylink_core::framer::{Framer, FramerConfig};
//!
//! let mut framer = Framer::<u8>::new(FramerConfig { packet_size: 4, ..Default::default() }).unwrap();
//! let mut deframer = Deframer::<u8>::new(DeframerConfig { packet_size: 4, ..Default::default() }).unwrap();
//!
//! let mut stream = vec![5u8; 7]; // leading junk
//! stream.extend(framer.process(&[2, 3, 4, 5, 6, 7, 8, 9]));
//!
//! let out = deframer.process(&stream);
//! assert_eq!(out.data, vec![2, 3, 4, 5, 6, 7, 8, 9]);
//! assert_eq!(out.sync, vec![true, false, false, false, true, false, false, false]);
//! assert_eq!(out.counter, vec![0, 0, 0, 0, 1, 1, 1, 1]);
//! ```

use crate::counter::CounterSpace;
use crate::header::{bits_to_u32, majority_bits, HeaderDescriptor};
use crate::types::{check_packet_size, HybridResult, LinkTriple, Sample};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Deframer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeframerConfig {
    /// Payload samples per packet
    pub packet_size: usize,
    /// Header layout, identical to the transmitting framer's
    pub header: HeaderDescriptor,
    /// Reject headers whose counter contradicts the sample clock
    pub verify_counter: bool,
}

impl Default for DeframerConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            header: HeaderDescriptor::default(),
            verify_counter: true,
        }
    }
}

/// Deframer state. The buffered header always starts at the buffer front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeframerState {
    /// Sliding one sample at a time looking for the preamble
    Searching,
    /// Preamble matched, waiting for the label field
    MatchingLabel,
    /// Label accepted, waiting for the counter field
    ReadingCounter,
    /// Header consumed, waiting for the payload
    PassingPayload { counter: u32 },
}

/// Running deframer statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Packets passed through
    pub packets: u64,
    /// Preamble matches rejected because of the label
    pub rejected_labels: u64,
    /// Headers rejected because of the counter
    pub rejected_counters: u64,
    /// Input samples discarded while searching
    pub skipped_samples: u64,
}

/// Streaming header detector and payload extractor.
#[derive(Debug, Clone)]
pub struct Deframer<T: Sample> {
    config: DeframerConfig,
    space: CounterSpace,
    preamble: Vec<T>,
    label_bits: Vec<bool>,
    state: DeframerState,
    buffer: VecDeque<T>,
    /// Absolute stream index of `buffer[0]`
    position: u64,
    /// (stream index, counter) of the last accepted header
    last_header: Option<(u64, u32)>,
    /// Most recent rejected header, accepted if the next one agrees with it
    candidate: Option<(u64, u32)>,
    /// Set once a header has been predicted by an earlier one
    confirmed: bool,
    /// Packet of the provisional first header
    held: LinkTriple<T>,
    stats: DeframerStats,
}

impl<T: Sample> Deframer<T> {
    pub fn new(config: DeframerConfig) -> HybridResult<Self> {
        check_packet_size(config.packet_size)?;
        config.header.validate()?;
        let space = config.header.counter_space()?;
        Ok(Self {
            space,
            preamble: config.header.preamble_samples(),
            label_bits: config.header.label_bits(),
            state: DeframerState::Searching,
            buffer: VecDeque::new(),
            position: 0,
            last_header: None,
            candidate: None,
            confirmed: false,
            held: LinkTriple::new(),
            stats: DeframerStats::default(),
            config,
        })
    }

    /// Consume input and emit every packet that completes.
    pub fn process(&mut self, input: &[T]) -> LinkTriple<T> {
        self.buffer.extend(input.iter().copied());
        let mut out = LinkTriple::new();

        loop {
            let progressed = match self.state {
                DeframerState::Searching => self.search(),
                DeframerState::MatchingLabel => self.match_label(),
                DeframerState::ReadingCounter => self.read_counter(),
                DeframerState::PassingPayload { counter } => self.pass_payload(counter, &mut out),
            };
            if !progressed {
                break;
            }
        }

        out
    }

    /// Slide until the preamble sits at the buffer front.
    fn search(&mut self) -> bool {
        let n = self.preamble.len();
        while self.buffer.len() >= n {
            if self.buffer.iter().take(n).eq(self.preamble.iter()) {
                trace!(position = self.position, "preamble matched");
                self.state = DeframerState::MatchingLabel;
                return true;
            }
            self.skip(1);
        }
        false
    }

    fn match_label(&mut self) -> bool {
        let start = self.config.header.preamble_len();
        let end = start + self.config.header.label_len();
        if self.buffer.len() < end {
            return false;
        }

        let bits = majority_bits(
            self.buffer.range(start..end).copied(),
            self.config.header.samples_per_bit,
        );
        if bits == self.label_bits {
            self.state = DeframerState::ReadingCounter;
        } else {
            self.stats.rejected_labels += 1;
            debug!(position = self.position, "label mismatch, resynchronising");
            self.resync();
        }
        true
    }

    fn read_counter(&mut self) -> bool {
        let header = &self.config.header;
        let start = header.preamble_len() + header.label_len();
        let end = header.header_len();
        if self.buffer.len() < end {
            return false;
        }

        let bits = majority_bits(self.buffer.range(start..end).copied(), header.samples_per_bit);
        let counter = self.space.wrap(bits_to_u32(&bits) as u64);

        if self.accept_counter(counter) {
            self.buffer.drain(..end);
            self.position += end as u64;
            self.state = DeframerState::PassingPayload { counter };
        } else {
            self.stats.rejected_counters += 1;
            debug!(position = self.position, counter, "counter rejected, resynchronising");
            self.resync();
        }
        true
    }

    fn pass_payload(&mut self, counter: u32, out: &mut LinkTriple<T>) -> bool {
        let packet_size = self.config.packet_size;
        if self.buffer.len() < packet_size {
            return false;
        }

        let provisional = self.config.verify_counter && !self.confirmed;
        if !provisional && !self.held.is_empty() {
            out.extend_from(&self.held);
            self.held.clear();
            self.stats.packets += 1;
        }

        let target = if provisional { &mut self.held } else { out };
        for (i, sample) in self.buffer.drain(..packet_size).enumerate() {
            target.push(sample, i == 0, counter);
        }
        self.position += packet_size as u64;
        if !provisional {
            self.stats.packets += 1;
        }
        self.state = DeframerState::Searching;
        true
    }

    /// Decide whether a decoded counter is consistent with the stream.
    fn accept_counter(&mut self, counter: u32) -> bool {
        let here = self.position;
        let accepted = !self.config.verify_counter
            || match self.last_header {
                None => true,
                Some(last) if !self.confirmed => {
                    if self.predicts(last, here, counter) {
                        self.confirmed = true;
                        debug!(position = here, counter, "header lock confirmed");
                    } else {
                        // the unconfirmed reference was the corrupted one
                        self.stats.rejected_counters += 1;
                        self.held.clear();
                        debug!(position = here, counter, "provisional header replaced");
                    }
                    true
                }
                Some(last) => {
                    self.predicts(last, here, counter)
                        || self.candidate.is_some_and(|c| self.predicts(c, here, counter))
                }
            };

        if accepted {
            if self.last_header.is_none() {
                debug!(position = here, counter, "header lock acquired");
            }
            self.last_header = Some((here, counter));
            self.candidate = None;
        } else {
            self.candidate = Some((here, counter));
        }
        accepted
    }

    /// True when `counter` at stream index `here` follows from `reference`,
    /// or when the distance is not a whole number of frames.
    fn predicts(&self, reference: (u64, u32), here: u64, counter: u32) -> bool {
        let (at, value) = reference;
        let frame = self.frame_len() as u64;
        let elapsed = here.saturating_sub(at);
        if elapsed % frame != 0 {
            return true;
        }
        self.space.advance(value, elapsed / frame) == counter
    }

    /// Drop the first sample of a rejected header and search again.
    fn resync(&mut self) {
        self.skip(1);
        self.state = DeframerState::Searching;
    }

    fn skip(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
        self.position += n as u64;
        self.stats.skipped_samples += n as u64;
    }

    /// End of stream: discard a partially received header or packet.
    ///
    /// A provisional first packet that no second header confirmed is
    /// dropped as well. Returns the number of samples that were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len() + self.held.len();
        self.position += self.buffer.len() as u64;
        self.buffer.clear();
        self.held.clear();
        self.state = DeframerState::Searching;
        dropped
    }

    pub fn state(&self) -> DeframerState {
        self.state
    }

    pub fn stats(&self) -> DeframerStats {
        self.stats
    }

    /// Header plus payload length in samples.
    pub fn frame_len(&self) -> usize {
        self.config.header.header_len() + self.config.packet_size
    }

    pub fn config(&self) -> &DeframerConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.state = DeframerState::Searching;
        self.buffer.clear();
        self.position = 0;
        self.last_header = None;
        self.candidate = None;
        self.confirmed = false;
        self.held.clear();
        self.stats = DeframerStats::default();
    }
}
