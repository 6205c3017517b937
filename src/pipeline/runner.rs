//! Analysis runner: cell calling, control selection, and per-cluster QC.

use crate::calling::{call_cells, KneeEstimate};
use crate::control::{select_controls, ControlConfig};
use crate::data::{CellTable, ClusterLabels, CountMatrix, DEFAULT_MITO_PATTERN};
use crate::error::{QcError, Result};
use crate::pipeline::report::{AnalysisReport, ThresholdSource};
use crate::qc::{classify_cells, QcConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_expected_cells() -> usize {
    3000
}

fn default_mito_pattern() -> String {
    DEFAULT_MITO_PATTERN.to_string()
}

/// Analysis configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Name of the analysis run.
    #[serde(default = "default_name")]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Expected number of cells, used by the knee estimator.
    #[serde(default = "default_expected_cells")]
    pub expected_cells: usize,
    /// UMI threshold overriding the knee estimate.
    #[serde(default)]
    pub manual_umi_threshold: Option<f64>,
    /// Regex selecting mitochondrial genes by name.
    #[serde(default = "default_mito_pattern")]
    pub mito_pattern: String,
    /// Control population; no controls are selected when absent.
    #[serde(default)]
    pub control: Option<ControlConfig>,
    /// QC thresholds.
    #[serde(default)]
    pub qc: QcConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            expected_cells: default_expected_cells(),
            manual_umi_threshold: None,
            mito_pattern: default_mito_pattern(),
            control: None,
            qc: QcConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(QcError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(QcError::from)
    }
}

/// Builder for configuring and running the analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    config: AnalysisConfig,
}

impl Default for Analysis {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis {
    /// Create an analysis with default settings.
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Set the analysis name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Set the expected number of cells.
    pub fn expected_cells(mut self, n: usize) -> Self {
        self.config.expected_cells = n;
        self
    }

    /// Call cells at a fixed UMI threshold instead of the knee estimate.
    pub fn manual_threshold(mut self, threshold: f64) -> Self {
        self.config.manual_umi_threshold = Some(threshold);
        self
    }

    /// Set the mitochondrial gene pattern.
    pub fn mito_pattern(mut self, pattern: &str) -> Self {
        self.config.mito_pattern = pattern.to_string();
        self
    }

    /// Select a control population.
    pub fn controls(mut self, control: ControlConfig) -> Self {
        self.config.control = Some(control);
        self
    }

    /// Set the QC thresholds.
    pub fn qc(mut self, qc: QcConfig) -> Self {
        self.config.qc = qc;
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> AnalysisConfig {
        AnalysisConfig {
            description: description.map(String::from),
            ..self.config.clone()
        }
    }

    /// Run the analysis.
    ///
    /// Stages, each producing a new table:
    /// 1. per-barcode metrics from the count matrix
    /// 2. knee threshold over all droplets and cell calling
    /// 3. cluster labels joined onto the records
    /// 4. control selection and the knee threshold without controls
    /// 5. per-cluster QC of the called cells
    ///
    /// Without labels every called cell is classified in a single partition.
    pub fn run(&self, counts: &CountMatrix, labels: Option<&ClusterLabels>) -> Result<AnalysisReport> {
        let config = &self.config;
        info!(name = %config.name, "running analysis");

        let table = CellTable::from_counts(counts, &config.mito_pattern)?;
        let knee = KneeEstimate::estimate(&table.umi_counts(), config.expected_cells)?;
        info!(
            expected_cells = knee.expected_cells,
            threshold = knee.threshold,
            "knee threshold over all droplets"
        );

        let (threshold, threshold_source) = match config.manual_umi_threshold {
            Some(t) => (t, ThresholdSource::Manual),
            None => (knee.threshold, ThresholdSource::Knee),
        };
        let (table, calling) = call_cells(&table, threshold)?;
        if calling.n_cells == 0 {
            warn!(threshold, "no barcodes passed cell calling");
        }

        let table = match labels {
            Some(labels) => {
                info!(
                    labelled = labels.len(),
                    clusters = labels.levels().len(),
                    "joining cluster labels"
                );
                table.with_clusters(labels)
            }
            None => table,
        };

        let (table, knee_without_controls) = match &config.control {
            Some(control) => {
                let ids = select_controls(&table, counts, control)?;
                let table = table.with_controls(&ids);
                let knee = KneeEstimate::estimate(
                    &table.umi_counts_excluding_controls(),
                    config.expected_cells,
                )?;
                info!(
                    controls = ids.len(),
                    threshold = knee.threshold,
                    "knee threshold without controls"
                );
                (table, Some(knee))
            }
            None => (table, None),
        };

        let (table, qc) = classify_cells(&table, &config.qc)?;

        let mut cells_per_batch: BTreeMap<String, usize> = BTreeMap::new();
        for r in table.called_cells() {
            *cells_per_batch.entry(r.batch.clone()).or_insert(0) += 1;
        }

        Ok(AnalysisReport {
            name: config.name.clone(),
            n_droplets: table.len(),
            knee,
            threshold_source,
            calling,
            knee_without_controls,
            control_ids: table.control_ids(),
            cells_per_batch,
            qc,
            table,
        })
    }
}
