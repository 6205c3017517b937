//! Per-cluster QC classification of called cells.

use crate::data::CellTable;
use crate::error::{QcError, Result};
use crate::qc::band::OutlierBand;
use crate::qc::flags::{CompositeRule, QcFlags};
use crate::qc::grouped::{flag_group_outliers, group_bands};
use crate::stats::MAD_NORMAL_CONSISTENCY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label used in summaries for cells without a cluster assignment.
pub const UNASSIGNED_CLUSTER: &str = "unassigned";

/// Thresholds for cell QC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    /// Absolute minimum number of detected genes.
    pub min_genes: u64,
    /// MAD multiplier for the UMI-count band.
    pub umi_nmads: f64,
    /// MAD multiplier for the mitochondrial-fraction band.
    pub mito_nmads: f64,
    /// Scale applied to the MAD of both metrics.
    pub mad_constant: f64,
    /// Flags feeding the composite failure.
    pub composite: CompositeRule,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            min_genes: 200,
            umi_nmads: 5.0,
            mito_nmads: 5.0,
            mad_constant: MAD_NORMAL_CONSISTENCY,
            composite: CompositeRule::All,
        }
    }
}

/// QC outcome for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQc {
    /// Cluster label.
    pub cluster: String,
    /// Number of called cells in the cluster.
    pub n_cells: usize,
    /// UMI-count band.
    pub umi_band: OutlierBand,
    /// Mitochondrial-fraction band.
    pub mito_band: OutlierBand,
    /// Cells failing the composite rule.
    pub n_fail: usize,
}

/// Counts of QC failures across all called cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcSummary {
    /// Number of called cells classified.
    pub n_cells: usize,
    /// Cells below the gene-count minimum.
    pub n_low_genes: usize,
    /// Cells outside their cluster's UMI band.
    pub n_umi_outliers: usize,
    /// Cells outside their cluster's mitochondrial band.
    pub n_mito_outliers: usize,
    /// Cells failing the composite rule.
    pub n_fail: usize,
    /// Per-cluster breakdown, sorted by label.
    pub clusters: Vec<ClusterQc>,
}

impl QcSummary {
    /// Number of cells passing QC.
    pub fn n_pass(&self) -> usize {
        self.n_cells - self.n_fail
    }
}

impl std::fmt::Display for QcSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cell QC")?;
        writeln!(f, "  Cells classified: {}", self.n_cells)?;
        writeln!(f, "  Low gene count:   {}", self.n_low_genes)?;
        writeln!(f, "  UMI outliers:     {}", self.n_umi_outliers)?;
        writeln!(f, "  Mito outliers:    {}", self.n_mito_outliers)?;
        writeln!(f, "  Failed QC:        {}", self.n_fail)?;
        writeln!(f, "  Passed QC:        {}", self.n_pass())?;
        if !self.clusters.is_empty() {
            writeln!(
                f,
                "  {:<12} {:>6} {:>21} {:>19} {:>6}",
                "cluster", "cells", "umi band", "mito band", "fail"
            )?;
            for c in &self.clusters {
                writeln!(
                    f,
                    "  {:<12} {:>6} {:>10.0}-{:<10.0} {:>9.4}-{:<9.4} {:>6}",
                    c.cluster,
                    c.n_cells,
                    c.umi_band.lower,
                    c.umi_band.upper,
                    c.mito_band.lower,
                    c.mito_band.upper,
                    c.n_fail
                )?;
            }
        }
        Ok(())
    }
}

/// Classify every called cell against its own cluster's bands.
///
/// Bands are computed over called cells only. Barcodes that were not called
/// keep `qc = None`; no record is removed. With no called cells the table is
/// returned with empty QC and an empty summary.
pub fn classify_cells(table: &CellTable, config: &QcConfig) -> Result<(CellTable, QcSummary)> {
    if config.umi_nmads < 0.0 || config.mito_nmads < 0.0 {
        return Err(QcError::InvalidParameter(
            "MAD multipliers must be non-negative".to_string(),
        ));
    }

    let cell_idx: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_cell)
        .map(|(i, _)| i)
        .collect();
    if cell_idx.is_empty() {
        info!("no called cells; skipping QC");
        return Ok((table.with_qc(vec![None; table.len()])?, QcSummary::default()));
    }

    let records = table.records();
    let keys: Vec<Option<String>> = cell_idx.iter().map(|&i| records[i].cluster.clone()).collect();
    let umi: Vec<f64> = cell_idx.iter().map(|&i| records[i].umi_count as f64).collect();
    let mito: Vec<f64> = cell_idx.iter().map(|&i| records[i].mito_fraction).collect();

    let umi_bands = group_bands(&umi, &keys, config.umi_nmads, config.mad_constant)?;
    let mito_bands = group_bands(&mito, &keys, config.mito_nmads, config.mad_constant)?;
    let umi_flags = flag_group_outliers(&umi, &keys, &umi_bands);
    let mito_flags = flag_group_outliers(&mito, &keys, &mito_bands);

    let mut flags: Vec<Option<QcFlags>> = vec![None; table.len()];
    let mut summary = QcSummary {
        n_cells: cell_idx.len(),
        ..QcSummary::default()
    };
    let mut per_cluster: BTreeMap<&Option<String>, (usize, usize)> = BTreeMap::new();

    for (j, &i) in cell_idx.iter().enumerate() {
        let low_genes = records[i].n_genes < config.min_genes;
        let qc = QcFlags::new(low_genes, umi_flags[j], mito_flags[j], config.composite);
        summary.n_low_genes += qc.low_genes as usize;
        summary.n_umi_outliers += qc.umi_outlier as usize;
        summary.n_mito_outliers += qc.mito_outlier as usize;
        summary.n_fail += qc.fail as usize;

        let entry = per_cluster.entry(&keys[j]).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += qc.fail as usize;
        flags[i] = Some(qc);
    }

    for (key, (n_cells, n_fail)) in per_cluster {
        let cluster = key.clone().unwrap_or_else(|| UNASSIGNED_CLUSTER.to_string());
        let umi_band = umi_bands[key];
        let mito_band = mito_bands[key];
        debug!(
            cluster = %cluster,
            cells = n_cells,
            fail = n_fail,
            umi_lower = umi_band.lower,
            umi_upper = umi_band.upper,
            mito_upper = mito_band.upper,
            "cluster QC bands"
        );
        summary.clusters.push(ClusterQc {
            cluster,
            n_cells,
            umi_band,
            mito_band,
            n_fail,
        });
    }

    info!(
        cells = summary.n_cells,
        fail = summary.n_fail,
        rule = config.composite.name(),
        "classified cells"
    );
    Ok((table.with_qc(flags)?, summary))
}
