//! Quality control of called cells.
//!
//! Each called cell is compared only against the cells of its own cluster:
//! the UMI count and mitochondrial fraction must fall inside a MAD band
//! around the cluster median, and the detected-gene count must reach an
//! absolute minimum.

pub mod band;
pub mod classify;
pub mod flags;
pub mod grouped;

pub use band::{mad_band, OutlierBand};
pub use classify::{classify_cells, ClusterQc, QcConfig, QcSummary, UNASSIGNED_CLUSTER};
pub use flags::{CompositeRule, QcFlags};
pub use grouped::{flag_group_outliers, group_bands};
