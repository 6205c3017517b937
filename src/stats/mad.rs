//! Median and median absolute deviation.

use crate::error::{QcError, Result};

/// Scale factor making the MAD a consistent estimator of the standard
/// deviation for normally distributed data (R's `mad()` default).
pub const MAD_NORMAL_CONSISTENCY: f64 = 1.4826;

/// Median of `values`. Even-length inputs average the two middle values.
pub fn median(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(QcError::EmptyData(
            "Cannot compute the median of no values".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(median_sorted(&sorted))
}

/// Median absolute deviation around `center`, multiplied by `constant`.
///
/// Pass [`MAD_NORMAL_CONSISTENCY`] for the normal-consistent MAD or `1.0`
/// for the raw MAD. A single value has a MAD of zero.
pub fn mad(values: &[f64], center: f64, constant: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(QcError::EmptyData(
            "Cannot compute the MAD of no values".to_string(),
        ));
    }
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    deviations.sort_by(|a, b| a.total_cmp(b));
    Ok(constant * median_sorted(&deviations))
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap(), 3.5);
    }

    #[test]
    fn test_raw_mad() {
        // |x - 3.5| = 2.5, 1.5, 0.5, 0.5, 1.5, 96.5 -> median 1.5
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert!((mad(&values, 3.5, 1.0).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_scaled_mad() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let scaled = mad(&values, 3.5, MAD_NORMAL_CONSISTENCY).unwrap();
        assert!((scaled - 1.5 * 1.4826).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_mad_is_zero() {
        assert_eq!(mad(&[7.0], 7.0, MAD_NORMAL_CONSISTENCY).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(median(&[]).is_err());
        assert!(mad(&[], 0.0, 1.0).is_err());
    }
}
