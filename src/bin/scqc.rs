//! scqc - droplet scRNA-seq cell calling and QC CLI
//!
//! Command-line interface for knee-threshold cell calling and per-cluster
//! MAD quality control.

use clap::{Parser, Subcommand, ValueEnum};
use scrna_qc::calling::KneeEstimate;
use scrna_qc::control::ControlConfig;
use scrna_qc::data::{ClusterLabels, CountMatrix};
use scrna_qc::error::Result;
use scrna_qc::pipeline::{Analysis, AnalysisConfig};
use scrna_qc::profile::profile_barcode_ranks;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Output format for summaries
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

/// Droplet scRNA-seq cell calling and quality control
#[derive(Parser)]
#[command(name = "scqc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the knee UMI threshold of a count matrix
    Call {
        /// Path to the 10x matrix directory
        #[arg(short, long)]
        matrix: PathBuf,

        /// Expected number of cells
        #[arg(short = 'n', long)]
        expected_cells: usize,

        /// File of barcodes (one per line) to exclude before estimating
        #[arg(long)]
        exclude: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the barcode rank curve as TSV
    Rank {
        /// Path to the 10x matrix directory
        #[arg(short, long)]
        matrix: PathBuf,

        /// Output path for the rank TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the full analysis from a YAML configuration file
    Run {
        /// Path to analysis configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the 10x matrix directory
        #[arg(short, long)]
        matrix: PathBuf,

        /// Path to cluster label TSV (barcode, cluster)
        #[arg(short = 'l', long)]
        clusters: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example analysis configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "analysis.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Call {
            matrix,
            expected_cells,
            exclude,
            format,
        } => cmd_call(&matrix, expected_cells, exclude.as_deref(), format),

        Commands::Rank { matrix, output } => cmd_rank(&matrix, &output),

        Commands::Run {
            config,
            matrix,
            clusters,
            output,
        } => cmd_run(&config, &matrix, clusters.as_deref(), &output),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "scrna_qc=debug,scqc=debug"
    } else {
        "scrna_qc=info,scqc=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Estimate the knee threshold, optionally excluding listed barcodes
fn cmd_call(
    matrix_path: &Path,
    expected_cells: usize,
    exclude_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let counts = CountMatrix::from_10x_dir(matrix_path)?;
    let umis = match exclude_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let excluded: HashSet<&str> = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            info!(excluded = excluded.len(), "excluding barcodes");
            counts.col_sums_excluding(&excluded)
        }
        None => counts.col_sums(),
    };

    let knee = KneeEstimate::estimate(&umis, expected_cells)?;
    let n_above = umis.iter().filter(|&&u| u as f64 >= knee.threshold).count();

    match format {
        OutputFormat::Text => {
            println!("Knee Threshold");
            println!("  Droplets:          {}", knee.n_droplets);
            println!("  Expected cells:    {}", knee.expected_cells);
            println!("  99th pct of top-N: {:.2}", knee.robust_max);
            println!("  Threshold:         {:.2}", knee.threshold);
            println!("  Cells above:       {}", n_above);
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "knee": knee,
                "n_cells": n_above,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

/// Write the barcode rank curve
fn cmd_rank(matrix_path: &Path, output_path: &Path) -> Result<()> {
    let counts = CountMatrix::from_10x_dir(matrix_path)?;
    let profile = profile_barcode_ranks(&counts.col_sums());
    profile.to_tsv(output_path)?;
    print!("{}", profile);
    info!(path = %output_path.display(), points = profile.points.len(), "wrote rank curve");
    Ok(())
}

/// Run the analysis from configuration
fn cmd_run(
    config_path: &Path,
    matrix_path: &Path,
    clusters_path: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    info!(path = %config_path.display(), "loading analysis configuration");
    let config_str = std::fs::read_to_string(config_path)?;
    let config = AnalysisConfig::from_yaml(&config_str)?;

    let counts = CountMatrix::from_10x_dir(matrix_path)?;
    let labels = clusters_path.map(ClusterLabels::from_tsv).transpose()?;

    let report = Analysis::from_config(&config).run(&counts, labels.as_ref())?;
    let paths = report.write_outputs(output_dir)?;

    print!("{}", report);
    info!(
        table = %paths.table_tsv.display(),
        controls = %paths.controls.display(),
        "done"
    );
    Ok(())
}

/// Generate an example configuration
fn cmd_example(output_path: &Path) -> Result<()> {
    let config = Analysis::new()
        .name("healthy")
        .expected_cells(10000)
        .controls(ControlConfig::cluster("7").with_marker("NeoR", 1))
        .to_config(Some(
            "Knee cell calling, control exclusion, and per-cluster MAD QC",
        ));

    std::fs::write(output_path, config.to_yaml()?)?;
    info!(path = %output_path.display(), "wrote example configuration");
    Ok(())
}
