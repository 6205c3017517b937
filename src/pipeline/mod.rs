//! Analysis composition and execution.

mod report;
mod runner;

pub use report::{AnalysisReport, OutputPaths, ThresholdSource};
pub use runner::{Analysis, AnalysisConfig};
