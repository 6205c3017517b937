//! Sample quantiles.

use crate::error::{QcError, Result};

/// Quantile of `values` at probability `p` by linear interpolation between
/// closest ranks.
///
/// With the values sorted ascending as `x[0..n]`, the position is
/// `h = (n - 1) * p` and the result is
/// `x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])`.
/// This is the default (type 7) definition used by R and NumPy.
///
/// The input order does not matter; the slice is copied and sorted.
pub fn quantile(values: &[f64], p: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(QcError::EmptyData(
            "Cannot compute a quantile of no values".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(QcError::InvalidParameter(format!(
            "Quantile probability must be between 0 and 1, got {}",
            p
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(quantile_sorted(&sorted, p))
}

/// Same as [`quantile`] for a slice already sorted ascending and non-empty.
pub(crate) fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
