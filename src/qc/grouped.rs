//! Per-group outlier bands: partition, fold, broadcast.

use crate::error::{QcError, Result};
use crate::qc::band::OutlierBand;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Compute one band per distinct key.
///
/// `values[i]` belongs to the group `keys[i]`. Groups are independent: a
/// band only ever sees the values of its own group.
pub fn group_bands<K>(
    values: &[f64],
    keys: &[K],
    nmads: f64,
    constant: f64,
) -> Result<BTreeMap<K, OutlierBand>>
where
    K: Ord + Clone + Send + Sync,
{
    if values.len() != keys.len() {
        return Err(QcError::DimensionMismatch {
            what: "group keys".to_string(),
            expected: values.len(),
            actual: keys.len(),
        });
    }

    let mut partitions: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for (key, &value) in keys.iter().zip(values) {
        partitions.entry(key.clone()).or_default().push(value);
    }

    partitions
        .into_par_iter()
        .map(|(key, group)| OutlierBand::from_values(&group, nmads, constant).map(|b| (key, b)))
        .collect()
}

/// Flag each value that falls outside its own group's band.
///
/// Keys without a band are never flagged.
pub fn flag_group_outliers<K>(values: &[f64], keys: &[K], bands: &BTreeMap<K, OutlierBand>) -> Vec<bool>
where
    K: Ord,
{
    values
        .iter()
        .zip(keys)
        .map(|(&value, key)| bands.get(key).map(|b| b.is_outlier(value)).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MAD_NORMAL_CONSISTENCY;

    #[test]
    fn test_groups_are_independent() {
        // Group "a" sits around 10, group "b" around 1000
        let values = vec![9.0, 10.0, 11.0, 10.0, 990.0, 1000.0, 1010.0, 1000.0];
        let keys = vec!["a", "a", "a", "a", "b", "b", "b", "b"];

        let bands = group_bands(&values, &keys, 3.0, MAD_NORMAL_CONSISTENCY).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands["a"].center, 10.0);
        assert_eq!(bands["b"].center, 1000.0);

        // Nothing is an outlier within its own group even though the pooled
        // distribution is bimodal
        let flags = flag_group_outliers(&values, &keys, &bands);
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn test_outlier_within_group() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 50.0, 51.0];
        let keys = vec![0, 0, 0, 0, 0, 0, 1, 1];

        let bands = group_bands(&values, &keys, 5.0, MAD_NORMAL_CONSISTENCY).unwrap();
        let flags = flag_group_outliers(&values, &keys, &bands);
        assert_eq!(flags, vec![false, false, false, false, false, true, false, false]);
    }

    #[test]
    fn test_singleton_group_passes() {
        let values = vec![3.0, 4.0, 5.0, 77.0];
        let keys = vec![Some("x"), Some("x"), Some("x"), None];

        let bands = group_bands(&values, &keys, 3.0, MAD_NORMAL_CONSISTENCY).unwrap();
        let singleton = bands[&None];
        assert_eq!((singleton.lower, singleton.upper), (77.0, 77.0));
        assert_eq!(flag_group_outliers(&values, &keys, &bands), vec![false; 4]);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(group_bands(&[1.0, 2.0], &[0], 3.0, 1.0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64).collect();
        let keys: Vec<usize> = (0..200).map(|i| i % 7).collect();
        let a = group_bands(&values, &keys, 3.0, MAD_NORMAL_CONSISTENCY).unwrap();
        let b = group_bands(&values, &keys, 3.0, MAD_NORMAL_CONSISTENCY).unwrap();
        assert_eq!(a, b);
    }
}
