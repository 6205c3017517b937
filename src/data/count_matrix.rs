//! Sparse genes × barcodes count matrix read from a 10x-style directory.

use crate::error::{QcError, Result};
use flate2::read::GzDecoder;
use rayon::prelude::*;
use sprs::io::IoError;
use sprs::{CsMat, TriMat};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A sparse count matrix of UMI counts.
///
/// Rows represent features (genes), columns represent droplet barcodes.
/// Stored in CSC (Compressed Sparse Column) format because every per-barcode
/// metric is a reduction over one column.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Sparse matrix in CSC format (features × barcodes)
    data: CsMat<u64>,
    /// Feature identifiers, e.g. Ensembl IDs
    feature_ids: Vec<String>,
    /// Feature display names (gene symbols)
    feature_names: Vec<String>,
    /// Droplet barcodes (column names)
    barcodes: Vec<String>,
}

impl CountMatrix {
    /// Create a new CountMatrix from a sparse matrix and identifiers.
    ///
    /// The matrix is converted to CSC storage if needed.
    pub fn new(
        data: CsMat<u64>,
        feature_ids: Vec<String>,
        feature_names: Vec<String>,
        barcodes: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(QcError::DimensionMismatch {
                what: "feature ids".to_string(),
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if nrows != feature_names.len() {
            return Err(QcError::DimensionMismatch {
                what: "feature names".to_string(),
                expected: nrows,
                actual: feature_names.len(),
            });
        }
        if ncols != barcodes.len() {
            return Err(QcError::DimensionMismatch {
                what: "barcodes".to_string(),
                expected: ncols,
                actual: barcodes.len(),
            });
        }
        let data = if data.is_csc() { data } else { data.to_csc() };
        Ok(Self {
            data,
            feature_ids,
            feature_names,
            barcodes,
        })
    }

    /// Load a count matrix from a 10x-style directory.
    ///
    /// Expected files (each optionally gzip-compressed with a `.gz` suffix):
    /// - `matrix.mtx`: Matrix Market coordinate file, genes × barcodes
    /// - `features.tsv` (or legacy `genes.tsv`): feature id, name[, type]
    /// - `barcodes.tsv`: one barcode per line
    pub fn from_10x_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        info!(dir = %dir.display(), "reading count matrix");

        let (features_path, features_reader) = open_first(dir, &["features.tsv", "genes.tsv"])?;
        let (feature_ids, feature_names) = read_features(features_reader)?;
        debug!(path = %features_path.display(), n = feature_ids.len(), "read features");

        let (barcodes_path, barcodes_reader) = open_first(dir, &["barcodes.tsv"])?;
        let barcodes = read_barcodes(barcodes_reader)?;
        debug!(path = %barcodes_path.display(), n = barcodes.len(), "read barcodes");

        let (matrix_path, counts) = read_matrix(dir)?;
        debug!(path = %matrix_path.display(), nnz = counts.nnz(), "read matrix");

        let matrix = Self::new(counts.to_csc(), feature_ids, feature_names, barcodes)?;
        info!(
            features = matrix.n_features(),
            barcodes = matrix.n_barcodes(),
            nnz = matrix.nnz(),
            "loaded count matrix"
        );
        Ok(matrix)
    }

    /// Get the value at (feature, barcode), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of barcodes (columns).
    #[inline]
    pub fn n_barcodes(&self) -> usize {
        self.data.cols()
    }

    /// Total number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Feature names (gene symbols).
    #[inline]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Barcodes.
    #[inline]
    pub fn barcodes(&self) -> &[String] {
        &self.barcodes
    }

    /// Row index of a feature, matched by name first and then by id.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .or_else(|| self.feature_ids.iter().position(|id| id == name))
    }

    /// Total UMI count per barcode.
    pub fn col_sums(&self) -> Vec<u64> {
        (0..self.n_barcodes())
            .into_par_iter()
            .map(|col| {
                self.data
                    .outer_view(col)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Total UMI count per barcode, leaving out the `excluded` barcodes.
    pub fn col_sums_excluding(&self, excluded: &HashSet<&str>) -> Vec<u64> {
        self.barcodes
            .iter()
            .zip(self.col_sums())
            .filter(|(bc, _)| !excluded.contains(bc.as_str()))
            .map(|(_, umi)| umi)
            .collect()
    }

    /// Number of detected (non-zero) features per barcode.
    pub fn col_nnz(&self) -> Vec<u64> {
        (0..self.n_barcodes())
            .into_par_iter()
            .map(|col| {
                self.data
                    .outer_view(col)
                    .map(|v| v.nnz() as u64)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// UMI count per barcode restricted to the features in `rows`.
    pub fn col_sums_of(&self, rows: &[usize]) -> Vec<u64> {
        let mut mask = vec![false; self.n_features()];
        for &row in rows {
            if row < mask.len() {
                mask[row] = true;
            }
        }
        (0..self.n_barcodes())
            .into_par_iter()
            .map(|col| {
                self.data
                    .outer_view(col)
                    .map(|v| {
                        v.iter()
                            .filter(|(row, _)| mask[*row])
                            .map(|(_, &val)| val)
                            .sum()
                    })
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Counts of one feature across all barcodes.
    pub fn feature_counts(&self, row: usize) -> Result<Vec<u64>> {
        if row >= self.n_features() {
            return Err(QcError::InvalidParameter(format!(
                "Feature index {} out of bounds",
                row
            )));
        }
        Ok((0..self.n_barcodes()).map(|col| self.get(row, col)).collect())
    }
}

/// Open the first of `names` present in `dir`, preferring the `.gz` variant.
fn open_first(dir: &Path, names: &[&str]) -> Result<(PathBuf, Box<dyn BufRead>)> {
    for name in names {
        let gz = dir.join(format!("{}.gz", name));
        if gz.is_file() {
            let reader = BufReader::new(GzDecoder::new(File::open(&gz)?));
            return Ok((gz, Box::new(reader)));
        }
        let plain = dir.join(name);
        if plain.is_file() {
            let reader = BufReader::new(File::open(&plain)?);
            return Ok((plain, Box::new(reader)));
        }
    }
    Err(QcError::MissingFile(format!(
        "{} (or .gz) in {}",
        names.join(" / "),
        dir.display()
    )))
}

/// Read `matrix.mtx[.gz]` as counts.
///
/// 10x writes `integer` files; `real` files are accepted and rounded.
fn read_matrix(dir: &Path) -> Result<(PathBuf, TriMat<u64>)> {
    let (path, mut reader) = open_first(dir, &["matrix.mtx"])?;
    let integer: std::result::Result<TriMat<i64>, IoError> =
        sprs::io::read_matrix_market_from_bufread(&mut reader);
    let counts = match integer {
        Ok(raw) => non_negative_counts(&raw, |v| v as u64)?,
        Err(IoError::MismatchedMatrixMarketRead(..)) => {
            debug!(path = %path.display(), "matrix is not integer typed, reading as real");
            let (_, mut reader) = open_first(dir, &["matrix.mtx"])?;
            let raw: TriMat<f64> = sprs::io::read_matrix_market_from_bufread(&mut reader)?;
            non_negative_counts(&raw, |v| v.round() as u64)?
        }
        Err(e) => return Err(e.into()),
    };
    Ok((path, counts))
}

fn non_negative_counts<N, F>(raw: &TriMat<N>, to_count: F) -> Result<TriMat<u64>>
where
    N: Copy + Default + PartialOrd + std::fmt::Display,
    F: Fn(N) -> u64,
{
    let zero = N::default();
    let mut counts = TriMat::with_capacity((raw.rows(), raw.cols()), raw.nnz());
    for (&value, (row, col)) in raw.triplet_iter() {
        if value < zero {
            return Err(QcError::InvalidParameter(format!(
                "Negative count {} at feature {}, barcode {}",
                value, row, col
            )));
        }
        let count = if value > zero { to_count(value) } else { 0 };
        if count > 0 {
            counts.add_triplet(row, col, count);
        }
    }
    Ok(counts)
}

fn tsv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

fn read_features<R: std::io::Read>(reader: R) -> Result<(Vec<String>, Vec<String>)> {
    let mut ids = Vec::new();
    let mut names = Vec::new();
    for record in tsv_reader(reader).records() {
        let record = record?;
        let id = match record.get(0) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };
        // Single-column files reuse the id as the display name
        let name = record.get(1).unwrap_or(id.as_str()).to_string();
        ids.push(id);
        names.push(name);
    }
    if ids.is_empty() {
        return Err(QcError::EmptyData("No features in features file".to_string()));
    }
    Ok((ids, names))
}

fn read_barcodes<R: std::io::Read>(reader: R) -> Result<Vec<String>> {
    let mut barcodes = Vec::new();
    for record in tsv_reader(reader).records() {
        let record = record?;
        if let Some(bc) = record.get(0).filter(|bc| !bc.is_empty()) {
            barcodes.push(bc.to_string());
        }
    }
    if barcodes.is_empty() {
        return Err(QcError::EmptyData("No barcodes in barcodes file".to_string()));
    }
    Ok(barcodes)
}
