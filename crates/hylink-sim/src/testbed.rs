//! Hybrid Link Testbed
//!
//! Runs a complete transmit/receive chain over two [`LoopbackLink`]s and
//! measures the recovered stream against what was sent:
//!
//! ```text
//! BitSource → Switch(Tx) ─┬→ Framer(L1) → Loopback 1 → Deframer(L1) ─┐
//!     ▲                   └→ Framer(L2) → Loopback 2 → Deframer(L2) ─┤
//!     │                                                              ▼
//!     └── reference by counter ── LinkTester ← Switch(Rx) ← StreamAligner
//! ```
//!
//! The per-packet switching metric comes from a cyclic schedule, optionally
//! passed through a [`HysteresisGate`]. The receive side looks the metric up
//! again by packet counter, which is what an out-of-band control channel
//! would deliver in a real deployment.
//!
//! Only packets the aligner reports as valid on both links reach the Rx
//! switch. Packets lost to late start, corrupted headers or realignment
//! are counted as missing, never as bit errors.
//!
//! ## Example
//!
//! ```rust
//! use hylink_sim::{HybridTestbed, SwitchMode, TestbedConfig};
//!
//! let mut config = TestbedConfig::default();
//! config.core.packet_size = 64;
//! config.packets = 8;
//! config.mode = SwitchMode::Soft;
//!
//! let report = HybridTestbed::new(config).unwrap().run().unwrap();
//! assert_eq!(report.aligned_packets, 8);
//! assert_eq!(report.tester.errors, 0);
//! ```

use crate::error::{SimError, SimResult};
use crate::loopback::{LoopbackConfig, LoopbackLink};
use hylink_core::aligner::{AlignStatus, AlignedBlock, AlignerStats, StreamAligner};
use hylink_core::deframer::{Deframer, DeframerStats};
use hylink_core::framer::Framer;
use hylink_core::hard_switch::{RxHardSwitch, TxHardSwitch};
use hylink_core::hysteresis::HysteresisGate;
use hylink_core::link_tester::{LinkTester, LinkTesterStats};
use hylink_core::parallel_switch::{ParallelSwitchConfig, TxParallelSwitch};
use hylink_core::soft_switch::{RxSoftSwitch, TxSoftSwitch};
use hylink_core::source::BitSource;
use hylink_core::types::{LinkId, LinkTriple};
use hylink_core::HybridConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How the transmitter shares traffic between the links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// Each packet goes to exactly one link
    Hard,
    /// Each packet is split between both links by the allocation table
    Soft,
    /// Both links carry every packet; the receiver picks one
    Parallel,
}

impl Default for SwitchMode {
    fn default() -> Self {
        SwitchMode::Hard
    }
}

/// Testbed scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbedConfig {
    /// Block configuration shared by both ends
    pub core: HybridConfig,
    pub mode: SwitchMode,
    pub link_1: LoopbackConfig,
    pub link_2: LoopbackConfig,
    /// Packets to transmit
    pub packets: usize,
    /// Per-packet switching metric, repeated cyclically
    pub schedule: Vec<f64>,
    /// Treat the schedule as a level difference and gate it
    pub use_hysteresis: bool,
    /// Samples handed to each streaming block per call
    pub chunk_size: usize,
}

impl Default for TestbedConfig {
    fn default() -> Self {
        Self {
            core: HybridConfig::default(),
            mode: SwitchMode::Hard,
            link_1: LoopbackConfig::default(),
            link_2: LoopbackConfig::default(),
            packets: 16,
            schedule: vec![-1.0],
            use_hysteresis: false,
            chunk_size: 4096,
        }
    }
}

/// Outcome of one testbed run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestbedReport {
    pub packets_sent: usize,
    /// Final aligner delay (link 1 minus link 2), if locked
    pub delay: Option<i64>,
    pub aligner: AlignerStats,
    pub deframer: [DeframerStats; 2],
    /// Samples each loopback link inverted
    pub flipped: [u64; 2],
    /// Packets delivered to the Rx switch
    pub aligned_packets: usize,
    /// Counter of every delivered packet, in order
    pub counters: Vec<u32>,
    /// Rx link choice per delivered packet (hard and parallel modes)
    pub choices: Vec<LinkId>,
    /// Allocation bucket per delivered packet (soft mode)
    pub buckets: Vec<usize>,
    pub tester: LinkTesterStats,
}

impl TestbedReport {
    /// Packets sent but never delivered.
    pub fn missing_packets(&self) -> usize {
        self.packets_sent.saturating_sub(self.aligned_packets)
    }
}

enum Receiver {
    Hard(RxHardSwitch<u8>),
    Soft(RxSoftSwitch<u8>),
}

pub struct HybridTestbed {
    config: TestbedConfig,
}

impl HybridTestbed {
    pub fn new(config: TestbedConfig) -> SimResult<Self> {
        config.core.validate()?;
        if config.schedule.is_empty() {
            return Err(SimError::InvalidScenario("schedule is empty".to_string()));
        }
        if config.chunk_size == 0 {
            return Err(SimError::InvalidScenario("chunk size must be at least 1".to_string()));
        }
        let counters = 1u64 << config.core.link_1.counter_width;
        if config.packets as u64 > counters {
            return Err(SimError::InvalidScenario(format!(
                "{} packets would wrap the {}-bit counter",
                config.packets, config.core.link_1.counter_width
            )));
        }
        let hard = &config.core.hard_switch;
        if hard.samples_per_bit != [1, 1] || hard.output_samples_per_bit.is_some() {
            return Err(SimError::InvalidScenario(
                "loopback links run at one sample per bit".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TestbedConfig {
        &self.config
    }

    pub fn run(&self) -> SimResult<TestbedReport> {
        let core = &self.config.core;
        let p = core.packet_size;
        let packets = self.config.packets;
        info!(
            mode = ?self.config.mode,
            packets,
            packet_size = p,
            "testbed run starting"
        );

        let sent = BitSource::<u8>::new(core.source())?.generate(packets, 1);
        let metrics = self.decisions()?;
        let control: Vec<f64> = metrics
            .iter()
            .flat_map(|&m| std::iter::repeat(m).take(p))
            .collect();

        let (tx_1, tx_2) = match self.config.mode {
            SwitchMode::Hard => {
                let out = TxHardSwitch::<u8>::new(core.hard_switch())?.process(&sent.data, &control);
                (out.link_1, out.link_2)
            }
            SwitchMode::Soft => {
                let out = TxSoftSwitch::<u8>::new(core.soft_switch())?.process(&sent.data, &control);
                (out.link_1, out.link_2)
            }
            SwitchMode::Parallel => {
                let out = TxParallelSwitch::<u8>::new(ParallelSwitchConfig::default())?
                    .process(&sent.data);
                (out.link_1, out.link_2)
            }
        };

        let (rx_1, flipped_1) = self.transmit(LinkId::Link1, &tx_1, &self.config.link_1)?;
        let (rx_2, flipped_2) = self.transmit(LinkId::Link2, &tx_2, &self.config.link_2)?;
        let (link_1, stats_1) = self.deframe(LinkId::Link1, &rx_1)?;
        let (link_2, stats_2) = self.deframe(LinkId::Link2, &rx_2)?;
        debug!(
            link_1 = stats_1.packets,
            link_2 = stats_2.packets,
            "links deframed"
        );

        let mut aligner = StreamAligner::<u8>::new(core.aligner())?;
        let aligned = self.align(&mut aligner, link_1, link_2);

        let mut receiver = match self.config.mode {
            SwitchMode::Soft => Receiver::Soft(RxSoftSwitch::new(core.soft_switch())?),
            SwitchMode::Hard | SwitchMode::Parallel => {
                Receiver::Hard(RxHardSwitch::new(core.hard_switch())?)
            }
        };
        let mut tester = LinkTester::<u8>::new(core.link_tester.clone())?;
        let up = vec![true; p];

        let mut report = TestbedReport {
            packets_sent: packets,
            delay: aligner.delay(),
            aligner: aligner.stats(),
            deframer: [stats_1, stats_2],
            flipped: [flipped_1, flipped_2],
            aligned_packets: 0,
            counters: Vec::new(),
            choices: Vec::new(),
            buckets: Vec::new(),
            tester: LinkTesterStats::default(),
        };

        for (k, status) in aligned.status.chunks_exact(p).enumerate() {
            let start = k * p;
            if !status.iter().all(AlignStatus::is_valid) {
                continue;
            }
            let counter = aligned.a.counter[start];
            if !aligned.a.sync[start] || aligned.b.counter[start] != counter {
                warn!(counter, "aligned packet does not start on a common pulse");
                continue;
            }
            let Some(&metric) = metrics.get(counter as usize) else {
                warn!(counter, "no packet with this counter was sent");
                continue;
            };

            let range = start..start + p;
            let l1 = &aligned.a.data[range.clone()];
            let l2 = &aligned.b.data[range];
            let select = vec![metric; p];
            let data = match &mut receiver {
                Receiver::Hard(rx) => {
                    let out = rx.process(l1, l2, &select);
                    report.choices.extend(out.choices);
                    out.data
                }
                Receiver::Soft(rx) => {
                    report.buckets.push(rx.table().lookup(metric).0);
                    rx.process(l1, l2, &select)
                }
            };

            let sent_range = counter as usize * p..(counter as usize + 1) * p;
            tester.process(
                &sent.data[sent_range.clone()],
                &data,
                &up,
                &sent.samples_per_bit[sent_range],
            );
            report.counters.push(counter);
            report.aligned_packets += 1;
        }
        report.tester = *tester.stats();

        info!(
            delivered = report.aligned_packets,
            missing = report.missing_packets(),
            delay = ?report.delay,
            ber = report.tester.ber(),
            "testbed run complete"
        );
        Ok(report)
    }

    /// Per-packet metric for every transmitted packet.
    fn decisions(&self) -> SimResult<Vec<f64>> {
        let schedule = &self.config.schedule;
        let raw = (0..self.config.packets).map(|k| schedule[k % schedule.len()]);
        if !self.config.use_hysteresis {
            return Ok(raw.collect());
        }
        let mut gate = HysteresisGate::new(self.config.core.hysteresis())?;
        let gated: Vec<f64> = raw.map(|d| gate.decide(d)).collect();
        debug!(flips = gate.flips(), "schedule gated");
        Ok(gated)
    }

    /// Frame a link's payload and carry it over its loopback.
    fn transmit(
        &self,
        link: LinkId,
        payload: &[u8],
        loopback: &LoopbackConfig,
    ) -> SimResult<(Vec<u8>, u64)> {
        let mut framer = Framer::<u8>::new(self.config.core.framer(link))?;
        let mut channel = LoopbackLink::new(loopback.clone())?;
        let mut out = Vec::new();
        for chunk in payload.chunks(self.config.chunk_size) {
            out.extend(channel.transmit(&framer.process(chunk)));
        }
        let dropped = framer.finish();
        if dropped > 0 {
            warn!(?link, dropped, "partial packet left in framer");
        }
        Ok((out, channel.flipped()))
    }

    fn deframe(&self, link: LinkId, stream: &[u8]) -> SimResult<(LinkTriple<u8>, DeframerStats)> {
        let mut deframer = Deframer::<u8>::new(self.config.core.deframer(link))?;
        let mut triple = LinkTriple::new();
        for chunk in stream.chunks(self.config.chunk_size) {
            triple.extend_from(&deframer.process(chunk));
        }
        deframer.finish();
        Ok((triple, deframer.stats()))
    }

    fn align(
        &self,
        aligner: &mut StreamAligner<u8>,
        mut link_1: LinkTriple<u8>,
        mut link_2: LinkTriple<u8>,
    ) -> AlignedBlock<u8> {
        let mut aligned = AlignedBlock::default();
        while !link_1.is_empty() || !link_2.is_empty() {
            let a = link_1.drain_front(self.config.chunk_size);
            let b = link_2.drain_front(self.config.chunk_size);
            let block = aligner.process(&a, &b);
            aligned.a.extend_from(&block.a);
            aligned.b.extend_from(&block.b);
            aligned.status.extend(block.status);
        }
        aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(packet_size: usize, packets: usize) -> TestbedConfig {
        let mut config = TestbedConfig {
            packets,
            chunk_size: 333,
            ..Default::default()
        };
        config.core.packet_size = packet_size;
        config
    }

    #[test]
    fn test_clean_hard_run() {
        let report = HybridTestbed::new(config(100, 6)).unwrap().run().unwrap();
        assert_eq!(report.delay, Some(0));
        assert_eq!(report.aligned_packets, 6);
        assert_eq!(report.counters, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(report.choices, vec![LinkId::Link1; 6]);
        assert_eq!(report.tester.bits, 600);
        assert_eq!(report.tester.errors, 0);
        assert_eq!(report.missing_packets(), 0);
    }

    #[test]
    fn test_hysteresis_schedule() {
        let mut config = config(50, 4);
        // 2.0 is clamped to the ceiling and flips the gate
        config.schedule = vec![-1.0, 2.0, 0.5, -0.5];
        config.use_hysteresis = true;
        let report = HybridTestbed::new(config).unwrap().run().unwrap();
        assert_eq!(
            report.choices,
            vec![LinkId::Link1, LinkId::Link2, LinkId::Link2, LinkId::Link1]
        );
        assert_eq!(report.tester.errors, 0);
    }

    /// Header (16 + 16 + 16) plus payload.
    fn frame_len(packet_size: usize) -> usize {
        48 + packet_size
    }

    fn run(config: TestbedConfig) -> TestbedReport {
        HybridTestbed::new(config).unwrap().run().unwrap()
    }

    #[test]
    fn test_alternating_hard_switch() {
        let mut config = config(100, 6);
        config.schedule = vec![-1.0, 1.0];
        let report = run(config);
        assert_eq!(
            report.choices,
            [LinkId::Link1, LinkId::Link2].repeat(3)
        );
        assert_eq!(report.tester.errors, 0);
        assert_eq!(report.tester.availability(), 1.0);
    }

    #[test]
    fn test_link_1_joins_late() {
        let mut config = config(100, 10);
        // lands 10 samples into the header of packet 2
        config.link_1.skip = 2 * frame_len(100) + 10;
        let report = run(config);
        assert_eq!(report.delay, Some(3));
        assert_eq!(report.counters, vec![3, 4, 5, 6]);
        assert_eq!(report.aligner.locks, 1);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_link_2_joins_late() {
        let mut config = config(100, 10);
        config.link_2.skip = frame_len(100);
        let report = run(config);
        assert_eq!(report.delay, Some(-1));
        assert_eq!(report.counters, (1..=8).collect::<Vec<u32>>());
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_prefix_junk_and_delay() {
        let mut config = config(100, 10);
        config.link_1.junk = 37;
        config.link_1.delay = 20;
        config.link_2.delay = 5;
        let report = run(config);
        assert_eq!(report.delay, Some(0));
        assert_eq!(report.aligned_packets, 10);
        assert!(report.deframer[0].skipped_samples >= 57);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_label_corruption_relocks() {
        let mut config = config(100, 10);
        // first label bit of packet 3
        config.link_1.flips = vec![3 * frame_len(100) + 16];
        let report = run(config);
        assert!(report.deframer[0].rejected_labels >= 1);
        assert_eq!(report.deframer[0].packets, 9);
        assert_eq!(report.aligner.discontinuities, 1);
        assert_eq!(report.aligner.locks, 2);
        assert_eq!(report.delay, Some(1));
        assert_eq!(report.counters, vec![0, 1, 2, 4, 5, 6, 7, 8]);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_counter_corruption_drops_packet() {
        let mut config = config(100, 10);
        // counter LSB of packet 5 on the idle link
        config.link_2.flips = vec![5 * frame_len(100) + 32];
        let report = run(config);
        assert!(report.deframer[1].rejected_counters >= 1);
        assert_eq!(report.delay, Some(-1));
        assert_eq!(report.counters, vec![0, 1, 2, 3, 4, 6, 7, 8]);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_payload_flips_counted() {
        let mut config = config(100, 10);
        let p = frame_len(100);
        config.link_1.flips = vec![p + 48, 4 * p + 48 + 50, 7 * p + 48 + 99];
        let report = run(config);
        assert_eq!(report.flipped[0], 3);
        assert_eq!(report.aligned_packets, 10);
        assert_eq!(report.tester.bits, 1000);
        assert_eq!(report.tester.errors, 3);
        assert_abs_diff_eq!(report.tester.ber(), 0.003, epsilon = 1e-12);
    }

    #[test]
    fn test_flips_on_idle_link_ignored() {
        let mut config = config(100, 4);
        config.link_2.flips = vec![48, frame_len(100) + 60];
        let report = run(config);
        assert_eq!(report.flipped[1], 2);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_random_errors() {
        let mut config = config(500, 20);
        config.link_1.flip_probability = 0.002;
        config.link_1.seed = 7;
        let report = run(config);
        assert!(report.aligned_packets > 0);
        assert!(report.tester.errors > 0);
        assert!(report.tester.ber() < 0.05);
    }

    #[test]
    fn test_soft_switch_alternating_buckets() {
        let mut config = config(90, 6);
        config.mode = SwitchMode::Soft;
        config.schedule = vec![-0.5, 0.5];
        let report = run(config);
        assert_eq!(report.buckets, vec![0, 1, 0, 1, 0, 1]);
        assert!(report.choices.is_empty());
        assert_eq!(report.tester.bits, 540);
        assert_eq!(report.tester.errors, 0);
    }

    #[test]
    fn test_soft_switch_decides_on_run_centre() {
        let mut config = config(90, 3);
        config.mode = SwitchMode::Soft;
        config.schedule = vec![0.5];
        // bucket 1 stretches link 1 by 3: offset 0 is a run edge, offset 1 its centre
        let f = frame_len(90);
        config.link_1.flips = vec![48, f + 48 + 1];
        let report = run(config);
        assert_eq!(report.flipped[0], 2);
        assert_eq!(report.tester.errors, 1);
    }

    #[test]
    fn test_parallel_picks_clean_link() {
        let mut config = config(100, 4);
        config.mode = SwitchMode::Parallel;
        config.link_2.flips = vec![48, 49, 50];

        config.schedule = vec![-1.0];
        let clean = run(config.clone());
        assert_eq!(clean.choices, vec![LinkId::Link1; 4]);
        assert_eq!(clean.tester.errors, 0);

        config.schedule = vec![1.0];
        let noisy = run(config);
        assert_eq!(noisy.choices, vec![LinkId::Link2; 4]);
        assert_eq!(noisy.tester.errors, 3);
    }

    #[test]
    fn test_chunking_does_not_change_outcome() {
        let mut small = config(100, 8);
        small.link_1.skip = frame_len(100) + 3;
        small.link_2.flips = vec![2 * frame_len(100) + 20];
        small.chunk_size = 7;
        let mut large = small.clone();
        large.chunk_size = 100_000;
        assert_eq!(run(small), run(large));
    }

    #[test]
    fn test_invalid_scenarios() {
        let mut empty = config(10, 2);
        empty.schedule.clear();
        assert!(matches!(
            HybridTestbed::new(empty),
            Err(SimError::InvalidScenario(_))
        ));

        let mut chunk = config(10, 2);
        chunk.chunk_size = 0;
        assert!(HybridTestbed::new(chunk).is_err());

        let mut wrap = config(10, 20);
        wrap.core.link_1.counter_width = 4;
        wrap.core.link_2.counter_width = 4;
        assert!(HybridTestbed::new(wrap).is_err());

        let mut bad_core = config(10, 2);
        bad_core.core.packet_size = 0;
        assert!(matches!(HybridTestbed::new(bad_core), Err(SimError::Config(_))));
    }
}
