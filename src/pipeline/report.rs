//! Analysis report: thresholds, counts, and the annotated table.

use crate::calling::{CellCallSummary, KneeEstimate};
use crate::data::CellTable;
use crate::error::Result;
use crate::qc::QcSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the cell-calling threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Knee estimate over all droplets.
    Knee,
    /// Threshold given in the configuration.
    Manual,
}

impl ThresholdSource {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Knee => "knee",
            Self::Manual => "manual",
        }
    }
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Name of the analysis run.
    pub name: String,
    /// Number of droplet barcodes read.
    pub n_droplets: usize,
    /// Knee estimate over all droplets.
    pub knee: KneeEstimate,
    /// Source of the threshold used for calling.
    pub threshold_source: ThresholdSource,
    /// Cell calling outcome.
    pub calling: CellCallSummary,
    /// Knee estimate with the control population excluded.
    pub knee_without_controls: Option<KneeEstimate>,
    /// Control-cell barcodes, handed to downstream enrichment and DE.
    pub control_ids: Vec<String>,
    /// Called cells per batch label.
    pub cells_per_batch: BTreeMap<String, usize>,
    /// QC outcome.
    pub qc: QcSummary,
    /// Fully annotated barcode table.
    pub table: CellTable,
}

/// Paths written by [`AnalysisReport::write_outputs`].
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Annotated table, one TSV row per barcode.
    pub table_tsv: PathBuf,
    /// Annotated table as JSON.
    pub table_json: PathBuf,
    /// Control barcodes, one per line.
    pub controls: PathBuf,
    /// Report text.
    pub report: PathBuf,
}

impl AnalysisReport {
    fn cells_above(&self, threshold: f64) -> usize {
        self.table
            .iter()
            .filter(|r| r.umi_count as f64 >= threshold)
            .count()
    }

    /// Write the control barcodes, one per line.
    pub fn write_control_ids<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for id in &self.control_ids {
            writeln!(writer, "{}", id)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table (TSV and JSON), control barcodes, and report text
    /// into `dir`, prefixing file names with the analysis name.
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P) -> Result<OutputPaths> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let paths = OutputPaths {
            table_tsv: dir.join(format!("{}_cells.tsv", self.name)),
            table_json: dir.join(format!("{}_cells.json", self.name)),
            controls: dir.join(format!("{}_controls.txt", self.name)),
            report: dir.join(format!("{}_report.txt", self.name)),
        };

        self.table.to_tsv(&paths.table_tsv)?;
        self.table.to_json(&paths.table_json)?;
        self.write_control_ids(&paths.controls)?;
        std::fs::write(&paths.report, self.to_string())?;

        info!(dir = %dir.display(), "wrote analysis outputs");
        Ok(paths)
    }
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Analysis: {}", self.name)?;
        writeln!(f, "  Droplets: {}", self.n_droplets)?;
        writeln!(f)?;
        writeln!(f, "Knee Threshold")?;
        writeln!(f, "  Expected cells:      {}", self.knee.expected_cells)?;
        writeln!(f, "  99th pct of top-N:   {:.2}", self.knee.robust_max)?;
        writeln!(f, "  Threshold:           {:.2}", self.knee.threshold)?;
        writeln!(f, "  Cells above knee:    {}", self.cells_above(self.knee.threshold))?;
        if let Some(without) = &self.knee_without_controls {
            writeln!(f, "  Without controls:    {:.2}", without.threshold)?;
            writeln!(
                f,
                "  Cells above (no ctl): {}",
                self.table
                    .iter()
                    .filter(|r| !r.is_control && r.umi_count as f64 >= without.threshold)
                    .count()
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.calling)?;
        writeln!(f, "  Threshold source: {}", self.threshold_source.name())?;
        for (batch, n) in &self.cells_per_batch {
            writeln!(f, "  Batch {:<8} {} cells", batch, n)?;
        }
        writeln!(f)?;
        writeln!(f, "Control Cells: {}", self.control_ids.len())?;
        writeln!(f)?;
        write!(f, "{}", self.qc)?;
        Ok(())
    }
}
