//! Per-cell QC flags and how they combine.

use serde::{Deserialize, Serialize};

/// Which per-metric flags feed the composite QC failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeRule {
    /// Gene-count minimum, UMI band, and mitochondrial band.
    #[default]
    All,
    /// UMI band and mitochondrial band only.
    UmiAndMito,
}

impl CompositeRule {
    /// Combine the individual flags into the overall failure flag.
    pub fn combine(&self, low_genes: bool, umi_outlier: bool, mito_outlier: bool) -> bool {
        match self {
            Self::All => low_genes || umi_outlier || mito_outlier,
            Self::UmiAndMito => umi_outlier || mito_outlier,
        }
    }

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "genes | umi | mito",
            Self::UmiAndMito => "umi | mito",
        }
    }
}

/// QC classification of one called cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcFlags {
    /// Fewer detected genes than the absolute minimum.
    pub low_genes: bool,
    /// UMI count outside the cluster's band.
    pub umi_outlier: bool,
    /// Mitochondrial fraction outside the cluster's band.
    pub mito_outlier: bool,
    /// Composite failure under the configured rule.
    pub fail: bool,
}

impl QcFlags {
    /// Build flags and derive the composite from `rule`.
    pub fn new(low_genes: bool, umi_outlier: bool, mito_outlier: bool, rule: CompositeRule) -> Self {
        Self {
            low_genes,
            umi_outlier,
            mito_outlier,
            fail: rule.combine(low_genes, umi_outlier, mito_outlier),
        }
    }
}
