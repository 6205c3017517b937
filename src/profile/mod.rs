//! Profiling of the droplet UMI distribution.

mod barcode_rank;

pub use barcode_rank::{profile_barcode_ranks, BarcodeRankProfile, RankPoint};
