//! Seeded train/test splitting and stratified cross-validation folds.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{Dataset, DatasetError, DatasetSplit};

/// Options for [`train_test_split`].
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Fraction of rows assigned to the test side.
    pub test_ratio: f64,
    /// Seed for the row shuffle.
    pub seed: u64,
    /// Keep the label balance identical on both sides.
    pub stratify: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            stratify: true,
        }
    }
}

/// Partition a dataset into disjoint train and test sides.
pub fn train_test_split(
    data: &Dataset,
    options: &SplitOptions,
) -> Result<DatasetSplit, DatasetError> {
    if !(options.test_ratio > 0.0 && options.test_ratio < 1.0) {
        return Err(DatasetError::InvalidSplit(format!(
            "test ratio must be in (0, 1), got {}",
            options.test_ratio
        )));
    }
    let groups = if options.stratify {
        label_groups(data.labels())
    } else {
        vec![(0..data.len()).collect()]
    };

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut train_rows = Vec::with_capacity(data.len());
    let mut test_rows = Vec::new();
    for mut rows in groups {
        rows.shuffle(&mut rng);
        let test_n = ((rows.len() as f64) * options.test_ratio).round() as usize;
        let test_n = test_n.min(rows.len());
        test_rows.extend_from_slice(&rows[..test_n]);
        train_rows.extend_from_slice(&rows[test_n..]);
    }
    if train_rows.is_empty() || test_rows.is_empty() {
        return Err(DatasetError::InvalidSplit(format!(
            "{} rows cannot be split with test ratio {}",
            data.len(),
            options.test_ratio
        )));
    }
    train_rows.sort_unstable();
    test_rows.sort_unstable();
    DatasetSplit::new(data.subset(&train_rows), data.subset(&test_rows))
}

/// One cross-validation fold as row indices into the training data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Stratified k-fold assignment.
///
/// Rows of each label are dealt round-robin across folds, continuing the
/// rotation from one label to the next so fold sizes differ by at most one.
/// Without a shuffle seed the assignment follows row order.
pub fn stratified_k_fold(
    labels: &[u8],
    k: usize,
    shuffle_seed: Option<u64>,
) -> Result<Vec<Fold>, DatasetError> {
    if k < 2 {
        return Err(DatasetError::InvalidSplit(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if k > labels.len() {
        return Err(DatasetError::InvalidSplit(format!(
            "{k} folds requested for {} rows",
            labels.len()
        )));
    }
    let mut rng = shuffle_seed.map(StdRng::seed_from_u64);
    let mut fold_of = vec![0usize; labels.len()];
    let mut next = 0usize;
    for mut rows in label_groups(labels) {
        if let Some(rng) = rng.as_mut() {
            rows.shuffle(rng);
        }
        for row in rows {
            fold_of[row] = next % k;
            next += 1;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&row| fold_of[row] == fold);
            Fold { train, validation }
        })
        .collect())
}

fn label_groups(labels: &[u8]) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(), Vec::new()];
    for (row, &label) in labels.iter().enumerate() {
        groups[usize::from(label.min(1))].push(row);
    }
    groups.retain(|rows| !rows.is_empty());
    groups
}
