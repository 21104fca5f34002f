//! Tabular credit datasets: feature tables, label vectors and train/test splits.
//!
//! Labels are binary: `0` marks good credit and `1` marks bad credit (default).
//! Every feature is numeric-encoded before it reaches this module.

pub mod export;
pub mod loader;
pub mod split;
pub mod synthetic;

use std::path::PathBuf;

use ndarray::{Array2, ArrayView2, Axis};
use thiserror::Error;

/// Display names for the two label values, indexed by label.
pub const CLASS_NAMES: [&str; 2] = ["good", "bad"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing artifact {0}")]
    MissingArtifact(PathBuf),
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("feature blob {path} holds {actual} values, expected {expected}")]
    FeatureBlobSizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error("{names} column names for a table with {width} feature columns")]
    ColumnCount { names: usize, width: usize },
    #[error("feature table has {rows} rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("train/test columns are not aligned: {0}")]
    ColumnMismatch(String),
    #[error("label {value} at row {row} is not binary (expected 0 or 1)")]
    InvalidLabel { row: usize, value: i64 },
    #[error("non-finite feature value at row {row}, column {column}")]
    NonFinite { row: usize, column: String },
    #[error("invalid split: {0}")]
    InvalidSplit(String),
}

/// Named feature columns over a dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Array2<f32>,
}

impl FeatureTable {
    /// Build a table, checking that every column is named and every value is finite.
    pub fn new(columns: Vec<String>, values: Array2<f32>) -> Result<Self, DatasetError> {
        if columns.len() != values.ncols() {
            return Err(DatasetError::ColumnCount {
                names: columns.len(),
                width: values.ncols(),
            });
        }
        for ((row, col), value) in values.indexed_iter() {
            if !value.is_finite() {
                return Err(DatasetError::NonFinite {
                    row,
                    column: columns[col].clone(),
                });
            }
        }
        Ok(Self { columns, values })
    }

    /// Build a table from row vectors of equal length.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f32>]) -> Result<Self, DatasetError> {
        let width = columns.len();
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(DatasetError::ColumnCount {
                    names: width,
                    width: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|err| DatasetError::InvalidSplit(err.to_string()))?;
        Self::new(columns, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Copy the given rows (in the given order) into a new table.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}

/// A feature table with its aligned label vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: FeatureTable,
    labels: Vec<u8>,
}

impl Dataset {
    /// Pair features with labels; row count must equal label count and labels must be 0/1.
    pub fn new(features: FeatureTable, labels: Vec<u8>) -> Result<Self, DatasetError> {
        if features.n_rows() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                rows: features.n_rows(),
                labels: labels.len(),
            });
        }
        if let Some((row, &value)) = labels.iter().enumerate().find(|(_, label)| **label > 1) {
            return Err(DatasetError::InvalidLabel {
                row,
                value: i64::from(value),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    /// Feature matrix view, rows aligned with [`Dataset::labels`].
    pub fn records(&self) -> ArrayView2<'_, f32> {
        self.features.values()
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.n_features()
    }

    /// Number of rows per label value (`[good, bad]`).
    pub fn class_counts(&self) -> [usize; 2] {
        let bad = self.labels.iter().filter(|&&label| label == 1).count();
        [self.labels.len() - bad, bad]
    }

    /// Fraction of rows labelled bad credit.
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.class_counts()[1] as f64 / self.labels.len() as f64
    }

    /// Copy the given rows into a new dataset, keeping features and labels aligned.
    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(rows),
            labels: rows.iter().map(|&row| self.labels[row]).collect(),
        }
    }
}

/// Immutable train/test pair sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    train: Dataset,
    test: Dataset,
}

impl DatasetSplit {
    /// Pair train and test data; feature columns must match by name and position.
    pub fn new(train: Dataset, test: Dataset) -> Result<Self, DatasetError> {
        let train_cols = train.features().columns();
        let test_cols = test.features().columns();
        if train_cols.len() != test_cols.len() {
            return Err(DatasetError::ColumnMismatch(format!(
                "train has {} columns, test has {}",
                train_cols.len(),
                test_cols.len()
            )));
        }
        if let Some((idx, (a, b))) = train_cols
            .iter()
            .zip(test_cols)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(DatasetError::ColumnMismatch(format!(
                "column {idx} is {a:?} in train but {b:?} in test"
            )));
        }
        Ok(Self { train, test })
    }

    pub fn train(&self) -> &Dataset {
        &self.train
    }

    pub fn test(&self) -> &Dataset {
        &self.test
    }

    pub fn columns(&self) -> &[String] {
        self.train.features().columns()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    pub(crate) fn tiny_dataset() -> Dataset {
        let features = FeatureTable::new(
            vec!["a".into(), "b".into()],
            array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 0.0]],
        )
        .unwrap();
        Dataset::new(features, vec![0, 0, 1, 1]).unwrap()
    }

    #[test]
    fn rejects_mismatched_lengths_and_labels() {
        let features = FeatureTable::new(vec!["a".into()], array![[0.0], [1.0]]).unwrap();
        let err = Dataset::new(features.clone(), vec![0]).unwrap_err();
        assert!(matches!(err, DatasetError::LengthMismatch { rows: 2, labels: 1 }));
        let err = Dataset::new(features, vec![0, 2]).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { row: 1, value: 2 }));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = FeatureTable::new(vec!["a".into()], array![[0.0], [f32::NAN]]).unwrap_err();
        assert!(matches!(err, DatasetError::NonFinite { row: 1, .. }));
    }

    #[test]
    fn subset_keeps_rows_aligned() {
        let data = tiny_dataset();
        let sub = data.subset(&[3, 0]);
        assert_eq!(sub.labels(), &[1, 0]);
        assert_eq!(sub.records()[[0, 0]], 3.0);
        assert_eq!(sub.records()[[1, 1]], 1.0);
        assert_eq!(data.class_counts(), [2, 2]);
    }

    #[test]
    fn split_requires_aligned_columns() {
        let train = tiny_dataset();
        let other = FeatureTable::new(vec!["b".into(), "a".into()], array![[0.0, 1.0]]).unwrap();
        let test = Dataset::new(other, vec![0]).unwrap();
        let err = DatasetSplit::new(train, test).unwrap_err();
        assert!(matches!(err, DatasetError::ColumnMismatch(_)));
    }
}
