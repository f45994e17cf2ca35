//! Packet counter arithmetic modulo 2^width
//!
//! Packet counters are transmitted in a fixed number of bits and wrap
//! around. Comparing two counters therefore has to be done on the ring:
//! the distance from 65535 to 1 in a 16-bit space is +2, not -65534.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::counter::CounterSpace;
//!
//! let space = CounterSpace::new(16).unwrap();
//! assert_eq!(space.next(0xFFFF), 0);
//! assert_eq!(space.signed_diff(1, 0xFFFF), 2);
//! assert_eq!(space.signed_diff(0xFFFF, 1), -2);
//! ```

use crate::types::{HybridError, HybridResult};

/// A counter ring of `width` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSpace {
    width: u8,
}

impl CounterSpace {
    pub fn new(width: u8) -> HybridResult<Self> {
        if width == 0 || width > 32 {
            return Err(HybridError::InvalidCounterWidth(width));
        }
        Ok(Self { width })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of distinct counter values (2^width).
    pub fn modulus(&self) -> u64 {
        1u64 << self.width
    }

    pub fn mask(&self) -> u32 {
        (self.modulus() - 1) as u32
    }

    /// Reduce an arbitrary value onto the ring.
    #[inline]
    pub fn wrap(&self, value: u64) -> u32 {
        (value & (self.modulus() - 1)) as u32
    }

    #[inline]
    pub fn next(&self, counter: u32) -> u32 {
        self.advance(counter, 1)
    }

    /// Counter value `steps` packets after `counter`.
    #[inline]
    pub fn advance(&self, counter: u32, steps: u64) -> u32 {
        self.wrap((counter as u64).wrapping_add(steps))
    }

    /// Shortest signed distance `a - b` on the ring, in `(-m/2, m/2]`.
    pub fn signed_diff(&self, a: u32, b: u32) -> i64 {
        let m = self.modulus() as i64;
        let raw = (self.wrap(a as u64) as i64 - self.wrap(b as u64) as i64).rem_euclid(m);
        if raw > m / 2 {
            raw - m
        } else {
            raw
        }
    }
}

impl Default for CounterSpace {
    fn default() -> Self {
        Self { width: 16 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_limits() {
        assert!(CounterSpace::new(0).is_err());
        assert!(CounterSpace::new(33).is_err());
        assert!(CounterSpace::new(1).is_ok());
        assert!(CounterSpace::new(32).is_ok());
    }

    #[test]
    fn test_wrapping() {
        let space = CounterSpace::new(4).unwrap();
        assert_eq!(space.mask(), 0xF);
        assert_eq!(space.next(14), 15);
        assert_eq!(space.next(15), 0);
        assert_eq!(space.advance(10, 20), 14);
        assert_eq!(space.wrap(0x123), 0x3);
    }

    #[test]
    fn test_full_width() {
        let space = CounterSpace::new(32).unwrap();
        assert_eq!(space.mask(), u32::MAX);
        assert_eq!(space.next(u32::MAX), 0);
        assert_eq!(space.signed_diff(0, u32::MAX), 1);
        assert_eq!(space.signed_diff(u32::MAX, 0), -1);
    }

    #[test]
    fn test_signed_diff() {
        let space = CounterSpace::new(16).unwrap();
        assert_eq!(space.signed_diff(10, 7), 3);
        assert_eq!(space.signed_diff(7, 10), -3);
        assert_eq!(space.signed_diff(2, 0xFFFE), 4);
        assert_eq!(space.signed_diff(5, 5), 0);
    }

    #[test]
    fn test_signed_diff_half_ring() {
        let space = CounterSpace::new(2).unwrap();
        // Exactly half the ring resolves to the positive side.
        assert_eq!(space.signed_diff(2, 0), 2);
        assert_eq!(space.signed_diff(0, 2), 2);
        assert_eq!(space.signed_diff(3, 0), -1);
    }
}
