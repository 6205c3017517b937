//! Data structures for droplet-level quality control.

mod cell_table;
mod count_matrix;
mod labels;

pub use cell_table::{batch_from_barcode, CellRecord, CellTable, DEFAULT_MITO_PATTERN};
pub use count_matrix::CountMatrix;
pub use labels::ClusterLabels;
