//! MAD-based outlier bands.

use crate::error::{QcError, Result};
use crate::stats::{mad, median, MAD_NORMAL_CONSISTENCY};
use serde::{Deserialize, Serialize};

/// Acceptance band `[lower, upper]` around the median of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBand {
    /// Median of the values.
    pub center: f64,
    /// Scaled median absolute deviation.
    pub mad: f64,
    /// `max(center - k * mad, 0)`.
    pub lower: f64,
    /// `center + k * mad`.
    pub upper: f64,
    /// Number of values the band was computed from.
    pub n: usize,
}

impl OutlierBand {
    /// Compute the band of `values` with `nmads` MADs on either side of the
    /// median. The MAD is multiplied by `constant` (use
    /// [`MAD_NORMAL_CONSISTENCY`] for the normal-consistent MAD, `1.0` for
    /// the raw MAD).
    ///
    /// The lower bound is clamped at zero since every QC metric is
    /// non-negative. With a single value, or identical values, the MAD is
    /// zero and the band collapses to the median.
    pub fn from_values(values: &[f64], nmads: f64, constant: f64) -> Result<Self> {
        if !nmads.is_finite() || nmads < 0.0 {
            return Err(QcError::InvalidParameter(format!(
                "MAD multiplier must be non-negative, got {}",
                nmads
            )));
        }
        if !constant.is_finite() || constant <= 0.0 {
            return Err(QcError::InvalidParameter(format!(
                "MAD constant must be positive, got {}",
                constant
            )));
        }
        let center = median(values)?;
        let spread = mad(values, center, constant)?;
        Ok(Self {
            center,
            mad: spread,
            lower: (center - nmads * spread).max(0.0),
            upper: center + nmads * spread,
            n: values.len(),
        })
    }

    /// Whether `value` lies inside the closed band.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Whether `value` lies outside the band.
    #[inline]
    pub fn is_outlier(&self, value: f64) -> bool {
        !self.contains(value)
    }
}

/// Band of `values` using the normal-consistent MAD.
pub fn mad_band(values: &[f64], nmads: f64) -> Result<OutlierBand> {
    OutlierBand::from_values(values, nmads, MAD_NORMAL_CONSISTENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];

    #[test]
    fn test_band_flags_extreme_value() {
        let band = mad_band(&VALUES, 5.0).unwrap();
        assert_eq!(band.center, 3.5);
        assert!(band.is_outlier(100.0));
        for v in &VALUES[..5] {
            assert!(band.contains(*v), "{} should be inside {:?}", v, band);
        }
    }

    #[test]
    fn test_band_keeps_bulk_for_usual_multipliers() {
        for k in 2..=10 {
            let band = mad_band(&VALUES, k as f64).unwrap();
            assert!(band.is_outlier(100.0), "k = {}", k);
            assert!(VALUES[..5].iter().all(|v| band.contains(*v)), "k = {}", k);
        }
    }

    #[test]
    fn test_lower_bound_clamped_at_zero() {
        let band = mad_band(&VALUES, 5.0).unwrap();
        assert_eq!(band.lower, 0.0);
        assert!((band.upper - (3.5 + 5.0 * 1.5 * MAD_NORMAL_CONSISTENCY)).abs() < 1e-12);
    }

    #[test]
    fn test_raw_mad_convention() {
        let band = OutlierBand::from_values(&VALUES, 2.0, 1.0).unwrap();
        assert_eq!(band.mad, 1.5);
        assert_eq!(band.lower, 0.5);
        assert_eq!(band.upper, 6.5);
    }

    #[test]
    fn test_single_value_collapses() {
        let band = mad_band(&[42.0], 3.0).unwrap();
        assert_eq!(band.lower, 42.0);
        assert_eq!(band.upper, 42.0);
        assert!(band.contains(42.0));
        assert!(band.is_outlier(42.5));
    }

    #[test]
    fn test_zero_multiplier_collapses() {
        let band = mad_band(&VALUES, 0.0).unwrap();
        assert_eq!(band.lower, 3.5);
        assert_eq!(band.upper, 3.5);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(mad_band(&[], 3.0).is_err());
        assert!(mad_band(&VALUES, -1.0).is_err());
        assert!(OutlierBand::from_values(&VALUES, 3.0, 0.0).is_err());
    }
}
