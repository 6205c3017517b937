//! Externally assigned cluster labels.

use crate::error::{QcError, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Mapping from barcode to cluster label.
///
/// Clustering happens outside this crate; the labels are joined onto the
/// barcode records before per-cluster QC.
#[derive(Debug, Clone, Default)]
pub struct ClusterLabels {
    labels: HashMap<String, String>,
}

impl ClusterLabels {
    /// Create empty labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (barcode, cluster) pairs. Later pairs overwrite earlier ones.
    pub fn from_pairs<I, B, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (B, C)>,
        B: Into<String>,
        C: Into<String>,
    {
        Self {
            labels: pairs
                .into_iter()
                .map(|(b, c)| (b.into(), c.into()))
                .collect(),
        }
    }

    /// Load labels from a two-column TSV file: `barcode<TAB>cluster`.
    ///
    /// A header row is skipped when its second field is `cluster`
    /// (case-insensitive). Duplicate barcodes are rejected.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut labels = HashMap::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let (barcode, cluster) = match (record.get(0), record.get(1)) {
                (Some(b), Some(c)) => (b.trim(), c.trim()),
                _ => {
                    return Err(QcError::InvalidParameter(format!(
                        "Cluster label row {} needs a barcode and a cluster",
                        row_idx + 1
                    )))
                }
            };
            if row_idx == 0 && cluster.eq_ignore_ascii_case("cluster") {
                continue;
            }
            if barcode.is_empty() {
                continue;
            }
            if labels
                .insert(barcode.to_string(), cluster.to_string())
                .is_some()
            {
                return Err(QcError::InvalidParameter(format!(
                    "Barcode '{}' has more than one cluster label",
                    barcode
                )));
            }
        }

        if labels.is_empty() {
            return Err(QcError::EmptyData("No cluster labels in file".to_string()));
        }
        Ok(Self { labels })
    }

    /// Cluster label of a barcode, if assigned.
    pub fn get(&self, barcode: &str) -> Option<&str> {
        self.labels.get(barcode).map(String::as_str)
    }

    /// Number of labelled barcodes.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no barcode is labelled.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct cluster labels, sorted.
    pub fn levels(&self) -> Vec<String> {
        self.labels
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
