//! Robust summary statistics shared by cell calling and QC.

pub mod mad;
pub mod quantile;

pub use mad::{mad, median, MAD_NORMAL_CONSISTENCY};
pub use quantile::quantile;
