//! Cell calling: separating cell-containing droplets from empty ones.

pub mod call;
pub mod knee;

pub use call::{call_cells, CellCallSummary};
pub use knee::{knee_threshold, KneeEstimate, KNEE_PERCENTILE, KNEE_SCALE};
