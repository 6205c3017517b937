//! Knee threshold estimation from the droplet UMI distribution.

use crate::error::{QcError, Result};
use crate::stats::quantile::quantile_sorted;
use serde::{Deserialize, Serialize};

/// Percentile of the top-N barcodes taken as the robust maximum.
pub const KNEE_PERCENTILE: f64 = 0.99;

/// Divisor applied to the robust maximum to get the threshold.
pub const KNEE_SCALE: f64 = 10.0;

/// A knee threshold together with the values it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KneeEstimate {
    /// Expected number of cells (top-N barcodes considered).
    pub expected_cells: usize,
    /// Number of droplets the estimate was computed over.
    pub n_droplets: usize,
    /// 99th percentile of the top-N UMI counts.
    pub robust_max: f64,
    /// UMI threshold: `robust_max / 10`.
    pub threshold: f64,
}

impl KneeEstimate {
    /// Estimate the knee threshold of `counts` for `expected_cells` cells.
    ///
    /// The counts are sorted descending, the top `expected_cells` values are
    /// kept, and their 99th percentile (linear interpolation) divided by 10
    /// is the threshold. Input order does not affect the result.
    ///
    /// # Errors
    /// * `InvalidParameter` if `expected_cells` is zero
    /// * `OutOfRange` if `expected_cells` exceeds the number of droplets
    pub fn estimate(counts: &[u64], expected_cells: usize) -> Result<Self> {
        if expected_cells == 0 {
            return Err(QcError::InvalidParameter(
                "Expected cell count must be at least 1".to_string(),
            ));
        }
        if expected_cells > counts.len() {
            return Err(QcError::OutOfRange {
                requested: expected_cells,
                available: counts.len(),
            });
        }

        let mut sorted = counts.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        // Ascending order for the quantile
        let mut top: Vec<f64> = sorted[..expected_cells].iter().map(|&c| c as f64).collect();
        top.reverse();

        let robust_max = quantile_sorted(&top, KNEE_PERCENTILE);
        Ok(Self {
            expected_cells,
            n_droplets: counts.len(),
            robust_max,
            threshold: robust_max / KNEE_SCALE,
        })
    }
}

/// Knee threshold of `counts` for `expected_cells` cells.
///
/// See [`KneeEstimate::estimate`].
pub fn knee_threshold(counts: &[u64], expected_cells: usize) -> Result<f64> {
    KneeEstimate::estimate(counts, expected_cells).map(|k| k.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descending_counts() -> Vec<u64> {
        vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]
    }

    #[test]
    fn test_worked_example() {
        let est = KneeEstimate::estimate(&descending_counts(), 5).unwrap();
        assert!((est.robust_max - 9.96).abs() < 1e-12);
        assert!((est.threshold - 0.996).abs() < 1e-12);
        assert_eq!(est.n_droplets, 10);
    }

    #[test]
    fn test_expected_cells_out_of_range() {
        let result = knee_threshold(&descending_counts(), 11);
        assert!(matches!(
            result,
            Err(QcError::OutOfRange {
                requested: 11,
                available: 10
            })
        ));
        assert!(knee_threshold(&[], 1).is_err());
    }

    #[test]
    fn test_zero_expected_cells() {
        assert!(matches!(
            knee_threshold(&descending_counts(), 0),
            Err(QcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_all_zero_top_n() {
        let counts = vec![0u64; 20];
        assert_eq!(knee_threshold(&counts, 5).unwrap(), 0.0);
    }

    #[test]
    fn test_all_droplets_selected() {
        // N equal to the droplet count is allowed
        let t = knee_threshold(&descending_counts(), 10).unwrap();
        // h = 9 * 0.99 = 8.91 -> 9 + 0.91 * (10 - 9)
        assert!((t - 0.991).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_non_negative_and_monotone_in_n() {
        let counts: Vec<u64> = vec![5000, 4200, 3900, 3100, 2500, 800, 120, 40, 12, 3, 0, 0];
        let mut previous = f64::INFINITY;
        for n in 1..=counts.len() {
            let t = knee_threshold(&counts, n).unwrap();
            assert!(t >= 0.0);
            // A larger top-N subset can only lower the 99th percentile
            assert!(t <= previous, "threshold rose from {} to {} at N={}", previous, t, n);
            previous = t;
        }
    }

    #[test]
    fn test_order_independence() {
        let ordered = vec![900, 850, 700, 30, 20, 10, 5, 1];
        let shuffled = vec![5, 850, 1, 20, 900, 10, 700, 30];
        for n in 1..=ordered.len() {
            assert_eq!(
                knee_threshold(&ordered, n).unwrap(),
                knee_threshold(&shuffled, n).unwrap()
            );
        }

        // Only the top-N multiset matters: reshuffling the tail changes nothing
        let tail_changed = vec![900, 850, 700, 1, 5, 10, 20, 30];
        assert_eq!(
            knee_threshold(&ordered, 3).unwrap(),
            knee_threshold(&tail_changed, 3).unwrap()
        );
    }

    #[test]
    fn test_deterministic() {
        let counts = descending_counts();
        let a = KneeEstimate::estimate(&counts, 7).unwrap();
        let b = KneeEstimate::estimate(&counts, 7).unwrap();
        assert_eq!(a, b);
    }
}
