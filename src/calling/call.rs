//! Applying a UMI threshold to the barcode table.

use crate::data::{CellRecord, CellTable};
use crate::error::{QcError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of cell calling at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellCallSummary {
    /// UMI threshold applied.
    pub threshold: f64,
    /// Number of barcodes considered.
    pub n_droplets: usize,
    /// Number of barcodes with `umi_count >= threshold`.
    pub n_cells: usize,
    /// Total UMIs in called cells divided by total UMIs.
    pub fraction_umis_in_cells: f64,
}

impl std::fmt::Display for CellCallSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cell Calling")?;
        writeln!(f, "  UMI threshold:  {:.2}", self.threshold)?;
        writeln!(f, "  Droplets:       {}", self.n_droplets)?;
        writeln!(f, "  Called cells:   {}", self.n_cells)?;
        writeln!(
            f,
            "  UMIs in cells:  {:.1}%",
            self.fraction_umis_in_cells * 100.0
        )?;
        Ok(())
    }
}

/// Mark every barcode with `umi_count >= threshold` as a cell.
///
/// QC flags from an earlier classification are cleared, since they only
/// hold for the previous cell set. Returns the annotated table and a summary. A threshold of zero calls
/// every barcode; callers relying on the knee estimate should check
/// `n_cells` for the degenerate all-zero case.
pub fn call_cells(table: &CellTable, threshold: f64) -> Result<(CellTable, CellCallSummary)> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(QcError::InvalidParameter(format!(
            "UMI threshold must be a non-negative number, got {}",
            threshold
        )));
    }

    let called = table.map_records(|r| CellRecord {
        is_cell: r.umi_count as f64 >= threshold,
        qc: None,
        ..r.clone()
    });

    let total_umis: u64 = called.iter().map(|r| r.umi_count).sum();
    let cell_umis: u64 = called.called_cells().map(|r| r.umi_count).sum();
    let summary = CellCallSummary {
        threshold,
        n_droplets: called.len(),
        n_cells: called.n_cells(),
        fraction_umis_in_cells: if total_umis > 0 {
            cell_umis as f64 / total_umis as f64
        } else {
            0.0
        },
    };
    info!(
        threshold = summary.threshold,
        cells = summary.n_cells,
        droplets = summary.n_droplets,
        "called cells"
    );
    Ok((called, summary))
}
