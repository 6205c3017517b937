//! Integration tests for the full cell calling and QC analysis.

use flate2::write::GzEncoder;
use flate2::Compression;
use scrna_qc::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const N_REAL: usize = 80;
const N_CONTROL: usize = 60;
const N_EMPTY: usize = 2000;
const HIGH_MITO_CELL: usize = 10;

/// Write a synthetic 10x directory.
///
/// Genes: Actb, mt-Co1, NeoR (control marker), Gapdh.
/// - 80 real cells with 3000..4975 UMIs, 4% mitochondrial; one at 50%
/// - 60 homogeneous control cells with 20000 UMIs expressing NeoR
/// - 2000 empty droplets with 1..50 UMIs
fn write_synthetic_10x(dir: &Path) {
    let mut barcodes = Vec::new();
    let mut entries: Vec<(usize, usize, u64)> = Vec::new();

    for i in 0..N_REAL {
        let col = barcodes.len();
        barcodes.push(format!("R{:03}-1", i));
        let umi = 3000 + 25 * i as u64;
        let mito = if i == HIGH_MITO_CELL { umi / 2 } else { umi / 25 };
        entries.push((0, col, umi - mito - 100));
        entries.push((1, col, mito));
        entries.push((3, col, 100));
    }
    for j in 0..N_CONTROL {
        let col = barcodes.len();
        barcodes.push(format!("C{:03}-1", j));
        entries.push((0, col, 20000 - 400 - 5 - 100));
        entries.push((1, col, 400));
        entries.push((2, col, 5));
        entries.push((3, col, 100));
    }
    for k in 0..N_EMPTY {
        let col = barcodes.len();
        barcodes.push(format!("E{:04}-2", k));
        entries.push((0, col, 1 + (k % 50) as u64));
    }

    let mut mtx = String::from("%%MatrixMarket matrix coordinate integer general\n");
    mtx.push_str(&format!("4 {} {}\n", barcodes.len(), entries.len()));
    for (row, col, value) in &entries {
        mtx.push_str(&format!("{} {} {}\n", row + 1, col + 1, value));
    }
    let file = File::create(dir.join("matrix.mtx.gz")).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(mtx.as_bytes()).unwrap();
    enc.finish().unwrap();

    std::fs::write(
        dir.join("features.tsv"),
        "ENSMUSG01\tActb\tGene Expression\n\
         ENSMUSG02\tmt-Co1\tGene Expression\n\
         NEO\tNeoR\tGene Expression\n\
         ENSMUSG04\tGapdh\tGene Expression\n",
    )
    .unwrap();
    std::fs::write(dir.join("barcodes.tsv"), barcodes.join("\n") + "\n").unwrap();
}

/// Write cluster labels for the called cells.
fn write_labels(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "barcode\tcluster").unwrap();
    for i in 0..N_REAL {
        let cluster = if i < N_REAL / 2 { "0" } else { "1" };
        writeln!(file, "R{:03}-1\t{}", i, cluster).unwrap();
    }
    for j in 0..N_CONTROL {
        writeln!(file, "C{:03}-1\t7", j).unwrap();
    }
}

fn load_fixture() -> (TempDir, CountMatrix, ClusterLabels) {
    let dir = TempDir::new().unwrap();
    write_synthetic_10x(dir.path());
    write_labels(&dir.path().join("clusters.tsv"));
    let counts = CountMatrix::from_10x_dir(dir.path()).unwrap();
    let labels = ClusterLabels::from_tsv(dir.path().join("clusters.tsv")).unwrap();
    (dir, counts, labels)
}

fn example_analysis() -> Analysis {
    Analysis::new()
        .name("synthetic")
        .expected_cells(100)
        .controls(ControlConfig::cluster("7").with_marker("NeoR", 1))
        .qc(QcConfig {
            min_genes: 2,
            ..QcConfig::default()
        })
}

#[test]
fn test_full_analysis() {
    let (_dir, counts, labels) = load_fixture();
    assert_eq!(counts.n_barcodes(), N_REAL + N_CONTROL + N_EMPTY);

    let report = example_analysis().run(&counts, Some(&labels)).unwrap();

    // Top 100 are dominated by the 20000-UMI controls
    assert_eq!(report.knee.robust_max, 20000.0);
    assert_eq!(report.knee.threshold, 2000.0);
    assert_eq!(report.calling.n_cells, N_REAL + N_CONTROL);
    assert_eq!(report.table.len(), N_REAL + N_CONTROL + N_EMPTY);
    assert_eq!(report.cells_per_batch.get("1"), Some(&(N_REAL + N_CONTROL)));
    assert_eq!(report.cells_per_batch.get("2"), None);

    assert_eq!(report.control_ids.len(), N_CONTROL);
    assert!(report.control_ids.iter().all(|id| id.starts_with('C')));
}

#[test]
fn test_controls_skew_threshold_upward() {
    let (_dir, counts, labels) = load_fixture();
    let report = example_analysis().run(&counts, Some(&labels)).unwrap();

    // Without controls the top 100 are the 80 real cells and 20 empties;
    // the 99th percentile falls between the two largest real cells
    let without = report.knee_without_controls.unwrap();
    assert_eq!(without.n_droplets, N_REAL + N_EMPTY);
    assert!((without.robust_max - 4950.25).abs() < 1e-9);
    assert!((without.threshold - 495.025).abs() < 1e-9);
    assert!(without.threshold < report.knee.threshold);
}

#[test]
fn test_qc_flags_high_mito_cell_only() {
    let (_dir, counts, labels) = load_fixture();
    let report = example_analysis().run(&counts, Some(&labels)).unwrap();

    assert_eq!(report.qc.n_cells, N_REAL + N_CONTROL);
    assert_eq!(report.qc.n_fail, 1);
    assert_eq!(report.qc.n_mito_outliers, 1);
    assert_eq!(report.qc.clusters.len(), 3);

    let failed: Vec<&str> = report
        .table
        .iter()
        .filter(|r| r.fails_qc())
        .map(|r| r.barcode.as_str())
        .collect();
    assert_eq!(failed, vec![format!("R{:03}-1", HIGH_MITO_CELL)]);

    // Empty droplets are kept but never classified
    let empties: Vec<&CellRecord> = report.table.iter().filter(|r| !r.is_cell).collect();
    assert_eq!(empties.len(), N_EMPTY);
    assert!(empties.iter().all(|r| r.qc.is_none() && r.cluster.is_none()));
}

#[test]
fn test_analysis_is_reproducible() {
    let (_dir, counts, labels) = load_fixture();
    let a = example_analysis().run(&counts, Some(&labels)).unwrap();
    let b = example_analysis().run(&counts, Some(&labels)).unwrap();

    assert_eq!(a.knee, b.knee);
    assert_eq!(a.knee_without_controls, b.knee_without_controls);
    assert_eq!(a.table, b.table);
    assert_eq!(a.qc, b.qc);
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn test_run_from_yaml_and_write_outputs() {
    let (dir, counts, labels) = load_fixture();
    let yaml = "\
name: from_yaml
expected_cells: 100
manual_umi_threshold: 1000
control:
  cluster: '7'
qc:
  min_genes: 2
  composite: umi_and_mito
";
    let config = AnalysisConfig::from_yaml(yaml).unwrap();
    let report = Analysis::from_config(&config)
        .run(&counts, Some(&labels))
        .unwrap();

    assert_eq!(report.threshold_source, ThresholdSource::Manual);
    assert_eq!(report.calling.threshold, 1000.0);
    assert_eq!(report.calling.n_cells, N_REAL + N_CONTROL);
    assert_eq!(report.control_ids.len(), N_CONTROL);

    let out = dir.path().join("out");
    let paths = report.write_outputs(&out).unwrap();
    let controls = std::fs::read_to_string(&paths.controls).unwrap();
    assert_eq!(controls.lines().count(), N_CONTROL);

    let reloaded = CellTable::from_json(&paths.table_json).unwrap();
    assert_eq!(reloaded, report.table);

    let text = std::fs::read_to_string(&paths.report).unwrap();
    assert!(text.contains("Analysis: from_yaml"));
    assert!(text.contains("Threshold source: manual"));
}

#[test]
fn test_expected_cells_exceeding_droplets() {
    let (_dir, counts, labels) = load_fixture();
    let result = Analysis::new()
        .expected_cells(N_REAL + N_CONTROL + N_EMPTY + 1)
        .run(&counts, Some(&labels));
    assert!(matches!(result, Err(QcError::OutOfRange { .. })));
}

#[test]
fn test_barcode_rank_profile_of_fixture() {
    let (_dir, counts, _) = load_fixture();
    let profile = profile_barcode_ranks(&counts.col_sums());

    assert_eq!(profile.n_droplets, N_REAL + N_CONTROL + N_EMPTY);
    assert_eq!(profile.max_umi, 20000);
    // All 60 controls share a count and collapse to one point at rank 60
    assert_eq!(profile.points[0], RankPoint { rank: 60, umi_count: 20000 });
    assert_eq!(profile.n_above(2000.0), N_REAL + N_CONTROL);
}
