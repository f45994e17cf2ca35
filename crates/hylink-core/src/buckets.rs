//! Sorted threshold tables
//!
//! A table of `n` strictly increasing thresholds splits the real line into
//! `n + 1` buckets with strict interval membership:
//!
//! ```text
//!   bucket 0        bucket 1        ...      bucket n
//! ───────────── T0 ───────────── T1 ... T(n-1) ──────────────
//!  metric < T0    T0 <= m < T1            m >= T(n-1)
//! ```
//!
//! A metric exactly on a threshold belongs to the bucket above it. NaN maps
//! to bucket 0.
//!
//! ## Example
//!
//! ```rust
//! use hylink_core::buckets::ThresholdTable;
//!
//! let table = ThresholdTable::new(vec![0.0, 1.0, 2.5]).unwrap();
//! assert_eq!(table.index_of(-3.0), 0);
//! assert_eq!(table.index_of(0.0), 1);
//! assert_eq!(table.index_of(2.4), 2);
//! assert_eq!(table.index_of(9.0), 3);
//! ```

use crate::types::{HybridError, HybridResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    thresholds: Vec<f64>,
}

impl ThresholdTable {
    /// Validate and wrap a threshold list. An empty list is one bucket.
    pub fn new(thresholds: Vec<f64>) -> HybridResult<Self> {
        for (index, t) in thresholds.iter().enumerate() {
            if !t.is_finite() {
                return Err(HybridError::NonFiniteThreshold { index });
            }
            if index > 0 && *t <= thresholds[index - 1] {
                return Err(HybridError::UnorderedThresholds { index });
            }
        }
        Ok(Self { thresholds })
    }

    #[inline]
    pub fn index_of(&self, metric: f64) -> usize {
        if metric.is_nan() {
            return 0;
        }
        self.thresholds.partition_point(|t| *t <= metric)
    }

    /// Number of buckets (thresholds + 1).
    pub fn buckets(&self) -> usize {
        self.thresholds.len() + 1
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}
