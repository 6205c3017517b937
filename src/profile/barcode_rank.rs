//! Barcode rank profile: the sorted UMI curve used to eyeball the knee.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One point of the barcode rank curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankPoint {
    /// 1-based rank of the barcode by descending UMI count.
    pub rank: usize,
    /// UMI count at this rank.
    pub umi_count: u64,
}

/// Profile of the droplet UMI distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeRankProfile {
    /// Number of droplets.
    pub n_droplets: usize,
    /// Droplets with at least one UMI.
    pub n_nonzero: usize,
    /// Largest UMI count.
    pub max_umi: u64,
    /// Median UMI count over non-empty droplets.
    pub median_nonzero_umi: f64,
    /// Rank curve over non-empty droplets. Runs of equal counts are
    /// collapsed to their last rank.
    pub points: Vec<RankPoint>,
}

impl BarcodeRankProfile {
    /// Number of droplets with at least `threshold` UMIs.
    pub fn n_above(&self, threshold: f64) -> usize {
        self.points
            .iter()
            .filter(|p| p.umi_count as f64 >= threshold)
            .map(|p| p.rank)
            .max()
            .unwrap_or(0)
    }

    /// Write the rank curve as TSV (`rank`, `umi_count`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "rank\tumi_count")?;
        for p in &self.points {
            writeln!(writer, "{}\t{}", p.rank, p.umi_count)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for BarcodeRankProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Barcode Rank Profile")?;
        writeln!(f, "  Droplets:          {}", self.n_droplets)?;
        writeln!(f, "  Non-empty:         {}", self.n_nonzero)?;
        writeln!(f, "  Max UMI:           {}", self.max_umi)?;
        writeln!(f, "  Median non-empty:  {:.0}", self.median_nonzero_umi)?;
        Ok(())
    }
}

/// Profile the UMI distribution of `counts` (one value per droplet).
pub fn profile_barcode_ranks(counts: &[u64]) -> BarcodeRankProfile {
    let mut sorted: Vec<u64> = counts.iter().copied().filter(|&c| c > 0).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let n_nonzero = sorted.len();
    let median_nonzero_umi = if n_nonzero == 0 {
        0.0
    } else if n_nonzero % 2 == 0 {
        (sorted[n_nonzero / 2 - 1] + sorted[n_nonzero / 2]) as f64 / 2.0
    } else {
        sorted[n_nonzero / 2] as f64
    };

    let mut points = Vec::new();
    for (i, &umi) in sorted.iter().enumerate() {
        let last_of_run = sorted.get(i + 1).map_or(true, |&next| next != umi);
        if last_of_run {
            points.push(RankPoint {
                rank: i + 1,
                umi_count: umi,
            });
        }
    }

    BarcodeRankProfile {
        n_droplets: counts.len(),
        n_nonzero,
        max_umi: sorted.first().copied().unwrap_or(0),
        median_nonzero_umi,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_profile_barcode_ranks() {
        let counts = vec![0, 5, 900, 5, 0, 1200, 5, 30];
        let profile = profile_barcode_ranks(&counts);

        assert_eq!(profile.n_droplets, 8);
        assert_eq!(profile.n_nonzero, 6);
        assert_eq!(profile.max_umi, 1200);
        // sorted non-empty: 1200, 900, 30, 5, 5, 5
        assert_eq!(profile.median_nonzero_umi, 17.5);
        assert_eq!(
            profile.points,
            vec![
                RankPoint { rank: 1, umi_count: 1200 },
                RankPoint { rank: 2, umi_count: 900 },
                RankPoint { rank: 3, umi_count: 30 },
                RankPoint { rank: 6, umi_count: 5 },
            ]
        );
    }

    #[test]
    fn test_n_above() {
        let profile = profile_barcode_ranks(&[0, 5, 900, 5, 0, 1200, 5, 30]);
        assert_eq!(profile.n_above(100.0), 2);
        assert_eq!(profile.n_above(5.0), 6);
        assert_eq!(profile.n_above(5000.0), 0);
    }

    #[test]
    fn test_empty_profile() {
        let profile = profile_barcode_ranks(&[0, 0]);
        assert_eq!(profile.n_nonzero, 0);
        assert_eq!(profile.max_umi, 0);
        assert!(profile.points.is_empty());
    }

    #[test]
    fn test_to_tsv() {
        let profile = profile_barcode_ranks(&[10, 20, 20]);
        let file = NamedTempFile::new().unwrap();
        profile.to_tsv(file.path()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "rank\tumi_count\n2\t20\n3\t10\n");
    }
}
