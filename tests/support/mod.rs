#![allow(dead_code)]

pub mod creditlab_env;

use creditlab::dataset::split::{SplitOptions, train_test_split};
use creditlab::dataset::synthetic::{SyntheticOptions, credit_dataset};
use creditlab::dataset::{Dataset, DatasetSplit};

/// Synthetic credit rows with the default signal strength.
pub fn credit_rows(rows: usize, seed: u64) -> Dataset {
    credit_dataset(&SyntheticOptions {
        rows,
        seed,
        ..SyntheticOptions::default()
    })
    .expect("generate synthetic dataset")
}

/// The reference experiment split: 1000 rows, stratified 80/20, seed 42.
pub fn reference_split() -> DatasetSplit {
    train_test_split(&credit_rows(1000, 42), &SplitOptions::default()).expect("split dataset")
}
