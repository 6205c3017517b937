//! Cell calling and per-cluster quality control for droplet scRNA-seq.
//!
//! This library separates cell-containing droplets from empty ones and flags
//! low-quality cells, working from a 10x-style sparse count matrix.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (CountMatrix, CellTable, ClusterLabels)
//! - **stats**: Quantiles, median, and MAD
//! - **calling**: Knee threshold estimation and cell calling
//! - **control**: Control-cell population selection
//! - **qc**: Per-cluster MAD outlier bands and composite QC flags
//! - **profile**: Barcode rank profile
//! - **pipeline**: Analysis configuration, execution, and reporting
//!
//! # Example
//!
//! ```no_run
//! use scrna_qc::prelude::*;
//!
//! // Load data
//! let counts = CountMatrix::from_10x_dir("raw_feature_bc_matrix").unwrap();
//! let labels = ClusterLabels::from_tsv("clusters.tsv").unwrap();
//!
//! // Call cells, find controls, and classify
//! let report = Analysis::new()
//!     .name("healthy")
//!     .expected_cells(10000)
//!     .controls(ControlConfig::cluster("7").with_marker("NeoR", 1))
//!     .run(&counts, Some(&labels))
//!     .unwrap();
//!
//! println!("{}", report);
//! ```

pub mod calling;
pub mod control;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod qc;
pub mod stats;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::calling::{call_cells, knee_threshold, CellCallSummary, KneeEstimate};
    pub use crate::control::{select_controls, ControlConfig};
    pub use crate::data::{
        batch_from_barcode, CellRecord, CellTable, ClusterLabels, CountMatrix,
        DEFAULT_MITO_PATTERN,
    };
    pub use crate::error::{QcError, Result};
    pub use crate::pipeline::{Analysis, AnalysisConfig, AnalysisReport, ThresholdSource};
    pub use crate::profile::{profile_barcode_ranks, BarcodeRankProfile, RankPoint};
    pub use crate::qc::{
        classify_cells, flag_group_outliers, group_bands, mad_band, ClusterQc, CompositeRule,
        OutlierBand, QcConfig, QcFlags, QcSummary,
    };
    pub use crate::stats::{mad, median, quantile, MAD_NORMAL_CONSISTENCY};
}
