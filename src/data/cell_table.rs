//! Per-barcode metric records and the annotated cell table.

use crate::data::{ClusterLabels, CountMatrix};
use crate::error::{QcError, Result};
use crate::qc::QcFlags;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Default pattern for mitochondrial gene symbols (mouse `mt-`, human `MT-`).
pub const DEFAULT_MITO_PATTERN: &str = "(?i)^mt-";

/// Metrics and annotations for one droplet barcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Droplet barcode.
    pub barcode: String,
    /// Total UMI count.
    pub umi_count: u64,
    /// Number of detected genes.
    pub n_genes: u64,
    /// Fraction of UMIs from mitochondrial genes, in [0, 1].
    pub mito_fraction: f64,
    /// Batch label taken from the barcode suffix.
    pub batch: String,
    /// Externally assigned cluster label.
    pub cluster: Option<String>,
    /// Whether the barcode passed cell calling.
    pub is_cell: bool,
    /// Whether the cell belongs to the control population.
    pub is_control: bool,
    /// QC classification; only set for called cells.
    pub qc: Option<QcFlags>,
}

impl CellRecord {
    /// Create an unannotated record.
    pub fn new(barcode: &str, umi_count: u64, n_genes: u64, mito_fraction: f64) -> Self {
        Self {
            barcode: barcode.to_string(),
            umi_count,
            n_genes,
            mito_fraction,
            batch: batch_from_barcode(barcode),
            cluster: None,
            is_cell: false,
            is_control: false,
            qc: None,
        }
    }

    /// Whether the record is a called cell that failed QC.
    pub fn fails_qc(&self) -> bool {
        self.qc.map(|q| q.fail).unwrap_or(false)
    }
}

/// Batch label of a barcode: the suffix after the last `-`.
///
/// Barcodes without a suffix belong to batch `"1"`, the label assigned to
/// single-library runs.
pub fn batch_from_barcode(barcode: &str) -> String {
    match barcode.rsplit_once('-') {
        Some((_, suffix)) if !suffix.is_empty() => suffix.to_string(),
        _ => "1".to_string(),
    }
}

/// An ordered table of barcode records.
///
/// Every annotation step returns a new table; records are never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellTable {
    records: Vec<CellRecord>,
}

impl CellTable {
    /// Wrap existing records.
    pub fn from_records(records: Vec<CellRecord>) -> Self {
        Self { records }
    }

    /// Compute per-barcode metrics from a count matrix.
    ///
    /// Mitochondrial genes are the features whose name matches `mito_pattern`.
    pub fn from_counts(counts: &CountMatrix, mito_pattern: &str) -> Result<Self> {
        let re = Regex::new(mito_pattern)?;
        let mito_rows: Vec<usize> = counts
            .feature_names()
            .iter()
            .enumerate()
            .filter(|(_, name)| re.is_match(name))
            .map(|(i, _)| i)
            .collect();
        if mito_rows.is_empty() {
            info!(pattern = mito_pattern, "no mitochondrial genes matched");
        } else {
            debug!(n = mito_rows.len(), "mitochondrial genes matched");
        }

        let umi = counts.col_sums();
        let genes = counts.col_nnz();
        let mito = counts.col_sums_of(&mito_rows);

        let records = counts
            .barcodes()
            .iter()
            .enumerate()
            .map(|(i, bc)| {
                let fraction = if umi[i] > 0 {
                    mito[i] as f64 / umi[i] as f64
                } else {
                    0.0
                };
                CellRecord::new(bc, umi[i], genes[i], fraction)
            })
            .collect();
        Ok(Self { records })
    }

    /// Load a table previously written with [`CellTable::to_json`].
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// All records in barcode order.
    #[inline]
    pub fn records(&self) -> &[CellRecord] {
        &self.records
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records.
    pub fn iter(&self) -> impl Iterator<Item = &CellRecord> {
        self.records.iter()
    }

    /// UMI counts of all records.
    pub fn umi_counts(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.umi_count).collect()
    }

    /// UMI counts of records that are not controls.
    pub fn umi_counts_excluding_controls(&self) -> Vec<u64> {
        self.records
            .iter()
            .filter(|r| !r.is_control)
            .map(|r| r.umi_count)
            .collect()
    }

    /// Called cells.
    pub fn called_cells(&self) -> impl Iterator<Item = &CellRecord> {
        self.records.iter().filter(|r| r.is_cell)
    }

    /// Number of called cells.
    pub fn n_cells(&self) -> usize {
        self.called_cells().count()
    }

    /// Barcodes of the control population, in table order.
    pub fn control_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_control)
            .map(|r| r.barcode.clone())
            .collect()
    }

    /// Join cluster labels onto the records. Unlabelled barcodes keep `None`.
    ///
    /// QC flags are cleared because the per-cluster bands they came from no
    /// longer apply.
    pub fn with_clusters(&self, labels: &ClusterLabels) -> Self {
        let records: Vec<CellRecord> = self
            .records
            .iter()
            .map(|r| CellRecord {
                cluster: labels.get(&r.barcode).map(str::to_string),
                qc: None,
                ..r.clone()
            })
            .collect();
        let n_labelled = records.iter().filter(|r| r.cluster.is_some()).count();
        debug!(labelled = n_labelled, total = records.len(), "joined cluster labels");
        Self { records }
    }

    /// Mark the given barcodes as controls.
    pub fn with_controls(&self, control_ids: &[String]) -> Self {
        let ids: HashSet<&str> = control_ids.iter().map(String::as_str).collect();
        Self {
            records: self
                .records
                .iter()
                .map(|r| CellRecord {
                    is_control: ids.contains(r.barcode.as_str()),
                    ..r.clone()
                })
                .collect(),
        }
    }

    /// Replace the QC flags, one entry per record.
    pub fn with_qc(&self, flags: Vec<Option<QcFlags>>) -> Result<Self> {
        if flags.len() != self.records.len() {
            return Err(QcError::DimensionMismatch {
                what: "QC flags".to_string(),
                expected: self.records.len(),
                actual: flags.len(),
            });
        }
        Ok(Self {
            records: self
                .records
                .iter()
                .zip(flags)
                .map(|(r, qc)| CellRecord { qc, ..r.clone() })
                .collect(),
        })
    }

    pub(crate) fn map_records<F>(&self, f: F) -> Self
    where
        F: Fn(&CellRecord) -> CellRecord,
    {
        Self {
            records: self.records.iter().map(f).collect(),
        }
    }

    /// Write the table as TSV, one row per record.
    ///
    /// QC columns are empty for barcodes that were not called as cells.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(BufWriter::new(File::create(path)?));

        writer.write_record([
            "barcode",
            "umi_count",
            "n_genes",
            "mito_fraction",
            "batch",
            "cluster",
            "is_cell",
            "is_control",
            "low_genes",
            "umi_outlier",
            "mito_outlier",
            "qc_fail",
        ])?;

        let flag = |v: Option<bool>| v.map(|b| b.to_string()).unwrap_or_default();
        for r in &self.records {
            writer.write_record([
                r.barcode.clone(),
                r.umi_count.to_string(),
                r.n_genes.to_string(),
                format!("{:.6}", r.mito_fraction),
                r.batch.clone(),
                r.cluster.clone().unwrap_or_default(),
                r.is_cell.to_string(),
                r.is_control.to_string(),
                flag(r.qc.map(|q| q.low_genes)),
                flag(r.qc.map(|q| q.umi_outlier)),
                flag(r.qc.map(|q| q.mito_outlier)),
                flag(r.qc.map(|q| q.fail)),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table as a JSON object.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
