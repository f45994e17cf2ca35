//! Hard Switch (Rx / Tx)
//!
//! All-or-nothing, per-packet link selection driven by a select metric
//! sampled at the first sample of each packet:
//!
//! ```text
//!            select < threshold  ->  Link1
//!            select >= threshold ->  Link2
//!
//!  Rx:  link1 ──┐                    Tx:          ┌── link1 (or zeros)
//!               ├──▶ out                  in ──▶──┤
//!       link2 ──┘                                 └── link2 (or zeros)
//! ```
//!
//! The Rx switch copies the chosen packet verbatim. When an output
//! samples-per-bit is configured, the chosen packet is re-bitted from its
//! link's rate to the output rate instead. Both variants emit a
//! samples-per-bit metadata stream describing the chosen link, which the
//! [`LinkTester`](crate::link_tester::LinkTester) consumes.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::hard_switch::{HardSwitchConfig, RxHardSwitch};
//! use hylink_core::types::LinkId;
//!
//! let config = HardSwitchConfig { packet_size: 2, threshold: 0.5, ..Default::default() };
//! let mut switch = RxHardSwitch::<u8>::new(config).unwrap();
//!
//! let out = switch.process(&[1, 1, 2, 2], &[7, 7, 8, 8], &[0.0, 0.0, 0.9, 0.9]);
//! assert_eq!(out.data, vec![1, 1, 8, 8]);
//! assert_eq!(out.choices, vec![LinkId::Link1, LinkId::Link2]);
//! ```

use crate::resample::rebit;
use crate::stream::{packet_heads, PacketBuffer};
use crate::types::{check_packet_size, HybridError, HybridResult, LinkId, Sample};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Hard switch configuration, shared by the Rx and Tx variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardSwitchConfig {
    pub packet_size: usize,
    /// Select metric below this routes to link 1
    pub threshold: f64,
    /// Samples per bit of link 1 and link 2
    pub samples_per_bit: [u8; 2],
    /// Rx only: re-bit the chosen packet to this rate
    pub output_samples_per_bit: Option<u8>,
}

impl Default for HardSwitchConfig {
    fn default() -> Self {
        Self {
            packet_size: 1000,
            threshold: 0.0,
            samples_per_bit: [1, 1],
            output_samples_per_bit: None,
        }
    }
}

impl HardSwitchConfig {
    fn validate(&self) -> HybridResult<()> {
        check_packet_size(self.packet_size)?;
        if let Some(&zero) = self.samples_per_bit.iter().find(|&&s| s == 0) {
            return Err(HybridError::InvalidSamplesPerBit(zero as usize));
        }
        if self.output_samples_per_bit == Some(0) {
            return Err(HybridError::InvalidSamplesPerBit(0));
        }
        Ok(())
    }

    fn spb(&self, link: LinkId) -> u8 {
        match link {
            LinkId::Link1 => self.samples_per_bit[0],
            LinkId::Link2 => self.samples_per_bit[1],
        }
    }
}

#[inline]
fn choose(select: f64, threshold: f64) -> LinkId {
    if select < threshold {
        LinkId::Link1
    } else {
        LinkId::Link2
    }
}

/// Output of [`RxHardSwitch::process`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RxSwitchOutput<T> {
    pub data: Vec<T>,
    /// Samples per bit of `data`, per sample
    pub samples_per_bit: Vec<u8>,
    /// Chosen link, per packet
    pub choices: Vec<LinkId>,
}

/// Receive-side hard switch: two links in, one stream out.
#[derive(Debug, Clone)]
pub struct RxHardSwitch<T: Sample> {
    config: HardSwitchConfig,
    link_1: PacketBuffer<T>,
    link_2: PacketBuffer<T>,
    select: PacketBuffer<f64>,
}

impl<T: Sample> RxHardSwitch<T> {
    pub fn new(config: HardSwitchConfig) -> HybridResult<Self> {
        config.validate()?;
        Ok(Self {
            link_1: PacketBuffer::new(config.packet_size),
            link_2: PacketBuffer::new(config.packet_size),
            select: PacketBuffer::new(config.packet_size),
            config,
        })
    }

    pub fn process(&mut self, link_1: &[T], link_2: &[T], select: &[f64]) -> RxSwitchOutput<T> {
        self.link_1.push(link_1);
        self.link_2.push(link_2);
        self.select.push(select);

        let packets = self
            .link_1
            .packets()
            .min(self.link_2.packets())
            .min(self.select.packets());
        let l1 = self.link_1.take(packets);
        let l2 = self.link_2.take(packets);
        let sel = self.select.take(packets);

        let p = self.config.packet_size;
        let mut out = RxSwitchOutput {
            data: Vec::with_capacity(packets * p),
            samples_per_bit: Vec::with_capacity(packets * p),
            choices: Vec::with_capacity(packets),
        };

        for (k, s) in packet_heads(&sel, p).enumerate() {
            let link = choose(s, self.config.threshold);
            let range = k * p..(k + 1) * p;
            let packet = match link {
                LinkId::Link1 => &l1[range],
                LinkId::Link2 => &l2[range],
            };
            let link_spb = self.config.spb(link);
            let out_spb = match self.config.output_samples_per_bit {
                Some(target) => {
                    out.data.extend(rebit(packet, link_spb as usize, target as usize, p));
                    target
                }
                None => {
                    out.data.extend_from_slice(packet);
                    link_spb
                }
            };
            out.samples_per_bit.extend(std::iter::repeat(out_spb).take(p));
            out.choices.push(link);
            trace!(select = s, ?link, "rx hard switch");
        }
        out
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.config.threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.link_1.clear();
        self.link_2.clear();
        self.select.clear();
    }
}

/// Output of [`TxHardSwitch::process`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSwitchOutput<T> {
    pub link_1: Vec<T>,
    pub link_2: Vec<T>,
    /// Samples per bit of the link carrying each sample
    pub samples_per_bit: Vec<u8>,
    pub choices: Vec<LinkId>,
}

/// Transmit-side hard switch: one stream in, two fixed-rate links out.
///
/// The link not chosen for a packet receives a packet of zeros.
#[derive(Debug, Clone)]
pub struct TxHardSwitch<T: Sample> {
    config: HardSwitchConfig,
    input: PacketBuffer<T>,
    select: PacketBuffer<f64>,
}

impl<T: Sample> TxHardSwitch<T> {
    pub fn new(config: HardSwitchConfig) -> HybridResult<Self> {
        config.validate()?;
        Ok(Self {
            input: PacketBuffer::new(config.packet_size),
            select: PacketBuffer::new(config.packet_size),
            config,
        })
    }

    pub fn process(&mut self, input: &[T], select: &[f64]) -> TxSwitchOutput<T> {
        self.input.push(input);
        self.select.push(select);
        let packets = self.input.packets().min(self.select.packets());
        let data = self.input.take(packets);
        let sel = self.select.take(packets);

        let p = self.config.packet_size;
        let zeros = vec![T::default(); p];
        let mut out = TxSwitchOutput {
            link_1: Vec::with_capacity(packets * p),
            link_2: Vec::with_capacity(packets * p),
            samples_per_bit: Vec::with_capacity(packets * p),
            choices: Vec::with_capacity(packets),
        };

        for (packet, s) in data.chunks_exact(p).zip(packet_heads(&sel, p)) {
            let link = choose(s, self.config.threshold);
            let (active, idle) = match link {
                LinkId::Link1 => (&mut out.link_1, &mut out.link_2),
                LinkId::Link2 => (&mut out.link_2, &mut out.link_1),
            };
            active.extend_from_slice(packet);
            idle.extend_from_slice(&zeros);
            out.samples_per_bit
                .extend(std::iter::repeat(self.config.spb(link)).take(p));
            out.choices.push(link);
        }
        out
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.config.threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.select.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(p: usize, threshold: f64) -> HardSwitchConfig {
        HardSwitchConfig {
            packet_size: p,
            threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_rx_selection_is_deterministic() {
        let p = 3;
        let select = [0.2, 0.8, 0.5, 0.49];
        let link_1: Vec<u8> = (0..12).map(|i| i as u8).collect();
        let link_2: Vec<u8> = (0..12).map(|i| 100 + i as u8).collect();
        let sel: Vec<f64> = select.iter().flat_map(|&s| vec![s; p]).collect();

        let mut switch = RxHardSwitch::new(config(p, 0.5)).unwrap();
        let out = switch.process(&link_1, &link_2, &sel);

        for (i, &s) in select.iter().enumerate() {
            let expected = if s < 0.5 { &link_1 } else { &link_2 };
            assert_eq!(&out.data[i * p..(i + 1) * p], &expected[i * p..(i + 1) * p]);
        }
        assert_eq!(
            out.choices,
            vec![LinkId::Link1, LinkId::Link2, LinkId::Link2, LinkId::Link1]
        );
    }

    #[test]
    fn test_rx_reports_chosen_link_rate() {
        let mut cfg = config(4, 0.0);
        cfg.samples_per_bit = [1, 2];
        let mut switch = RxHardSwitch::<u8>::new(cfg).unwrap();
        let out = switch.process(&[0; 8], &[0; 8], &[-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(out.samples_per_bit, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_rx_rebits_to_output_rate() {
        let mut cfg = config(6, 0.0);
        cfg.samples_per_bit = [1, 3];
        cfg.output_samples_per_bit = Some(2);
        let mut switch = RxHardSwitch::<u8>::new(cfg).unwrap();
        let link_1 = [1u8, 0, 1, 1, 0, 0];
        let link_2 = [1u8, 1, 1, 0, 0, 0];
        let out = switch.process(&link_1, &link_2, &[1.0; 6]);
        assert_eq!(out.data, vec![1, 1, 0, 0, 0, 0]);
        assert!(out.samples_per_bit.iter().all(|&s| s == 2));

        let out = switch.process(&link_1, &link_2, &[-1.0; 6]);
        assert_eq!(out.data, vec![1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn test_rx_waits_for_all_inputs() {
        let mut switch = RxHardSwitch::<u8>::new(config(2, 0.5)).unwrap();
        let out = switch.process(&[1, 1, 1, 1], &[2, 2], &[0.0]);
        assert!(out.data.is_empty());
        let out = switch.process(&[], &[2, 2], &[0.0, 1.0, 1.0]);
        assert_eq!(out.data, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_tx_zero_fills_idle_link() {
        let mut switch = TxHardSwitch::<u8>::new(config(2, 0.5)).unwrap();
        let out = switch.process(&[5, 6, 7, 8, 9, 10], &[0.0, 0.0, 1.0, 1.0, 0.1, 0.1]);
        assert_eq!(out.link_1, vec![5, 6, 0, 0, 9, 10]);
        assert_eq!(out.link_2, vec![0, 0, 7, 8, 0, 0]);
        assert_eq!(out.link_1.len(), out.link_2.len());
    }

    #[test]
    fn test_runtime_threshold() {
        let mut switch = TxHardSwitch::<u8>::new(config(1, 0.5)).unwrap();
        assert_eq!(switch.process(&[3], &[0.7]).choices, vec![LinkId::Link2]);
        switch.set_threshold(1.0);
        assert_eq!(switch.threshold(), 1.0);
        assert_eq!(switch.process(&[3], &[0.7]).choices, vec![LinkId::Link1]);
    }

    #[test]
    fn test_invalid_rate() {
        let mut cfg = config(4, 0.0);
        cfg.samples_per_bit = [0, 1];
        assert!(RxHardSwitch::<u8>::new(cfg.clone()).is_err());
        assert!(TxHardSwitch::<u8>::new(cfg).is_err());
    }
}
