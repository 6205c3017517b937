//! Identification of the spiked-in control-cell population.

use crate::data::{CellTable, CountMatrix};
use crate::error::{QcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// How control cells are recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Cluster label of the control population.
    pub cluster: String,
    /// Marker gene (e.g. a resistance gene) the controls express.
    #[serde(default)]
    pub marker: Option<String>,
    /// Minimum marker UMI count for a cell to count as a control.
    #[serde(default = "default_min_marker_umi")]
    pub min_marker_umi: u64,
}

fn default_min_marker_umi() -> u64 {
    1
}

impl ControlConfig {
    /// Controls defined by cluster membership alone.
    pub fn cluster(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            marker: None,
            min_marker_umi: default_min_marker_umi(),
        }
    }

    /// Additionally require expression of `marker`.
    pub fn with_marker(mut self, marker: &str, min_umi: u64) -> Self {
        self.marker = Some(marker.to_string());
        self.min_marker_umi = min_umi;
        self
    }
}

/// Barcodes of called cells that belong to the control population.
///
/// A control is a called cell labelled with the control cluster and, when a
/// marker gene is configured, with at least `min_marker_umi` marker UMIs.
/// Barcodes are returned in table order.
pub fn select_controls(
    table: &CellTable,
    counts: &CountMatrix,
    config: &ControlConfig,
) -> Result<Vec<String>> {
    let marker_counts = match &config.marker {
        Some(marker) => {
            let row = counts
                .feature_index(marker)
                .ok_or_else(|| QcError::MissingFeature(marker.clone()))?;
            let column: HashMap<&str, usize> = counts
                .barcodes()
                .iter()
                .enumerate()
                .map(|(i, bc)| (bc.as_str(), i))
                .collect();
            Some((counts.feature_counts(row)?, column))
        }
        None => None,
    };

    let mut in_cluster = 0usize;
    let controls: Vec<String> = table
        .called_cells()
        .filter(|r| r.cluster.as_deref() == Some(config.cluster.as_str()))
        .inspect(|_| in_cluster += 1)
        .filter(|r| match &marker_counts {
            Some((values, column)) => column
                .get(r.barcode.as_str())
                .map(|&col| values[col] >= config.min_marker_umi)
                .unwrap_or(false),
            None => true,
        })
        .map(|r| r.barcode.clone())
        .collect();

    info!(
        cluster = %config.cluster,
        marker = config.marker.as_deref().unwrap_or("-"),
        in_cluster,
        controls = controls.len(),
        "selected control cells"
    );
    Ok(controls)
}
