//! Dataset loader for persisted train/test artifacts.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::Deserialize;

use super::export::{DATASET_FORMAT_VERSION, MANIFEST_FILE_NAME};
use super::{Dataset, DatasetError, DatasetSplit, FeatureTable};

/// Parsed contents of `manifest.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Dataset format version.
    pub format_version: i64,
    /// Feature columns per row.
    pub n_features: usize,
    /// Artifact file names (relative to the dataset directory).
    pub files: ManifestFiles,
}

/// File names referenced by the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFiles {
    pub train_features: String,
    pub test_features: String,
    pub train_labels: String,
    pub test_labels: String,
}

/// Paths of the four artifacts that make up a split.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub train_features: PathBuf,
    pub test_features: PathBuf,
    pub train_labels: PathBuf,
    pub test_labels: PathBuf,
}

impl ArtifactPaths {
    /// Resolve manifest entries against the dataset directory.
    pub fn from_manifest(dir: &Path, manifest: &Manifest) -> Self {
        Self {
            train_features: dir.join(&manifest.files.train_features),
            test_features: dir.join(&manifest.files.test_features),
            train_labels: dir.join(&manifest.files.train_labels),
            test_labels: dir.join(&manifest.files.test_labels),
        }
    }
}

/// Header describing one feature table blob.
#[derive(Debug, Clone, Deserialize)]
struct FeatureHeader {
    format_version: i64,
    #[serde(default = "default_encoding")]
    encoding: String,
    columns: Vec<String>,
    n_rows: usize,
    blob: String,
}

fn default_encoding() -> String {
    "f32le".to_string()
}

/// Load a dataset directory written by [`super::export::write_split`].
pub fn load_split(dir: &Path) -> Result<DatasetSplit, DatasetError> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let manifest: Manifest = serde_json::from_slice(&read_bytes(&manifest_path)?)?;
    if manifest.format_version != DATASET_FORMAT_VERSION {
        return Err(DatasetError::InvalidManifest(format!(
            "unsupported format_version {}",
            manifest.format_version
        )));
    }
    let split = load_split_from_paths(&ArtifactPaths::from_manifest(dir, &manifest))?;
    if split.train().n_features() != manifest.n_features {
        return Err(DatasetError::InvalidManifest(format!(
            "manifest declares {} features but tables have {}",
            manifest.n_features,
            split.train().n_features()
        )));
    }
    Ok(split)
}

/// Load the four artifacts of a split from explicit paths.
pub fn load_split_from_paths(paths: &ArtifactPaths) -> Result<DatasetSplit, DatasetError> {
    let train = Dataset::new(
        load_feature_table(&paths.train_features)?,
        load_labels(&paths.train_labels)?,
    )?;
    let test = Dataset::new(
        load_feature_table(&paths.test_features)?,
        load_labels(&paths.test_labels)?,
    )?;
    let split = DatasetSplit::new(train, test)?;
    tracing::info!(
        "Loaded dataset: {} train rows, {} test rows, {} features",
        split.train().len(),
        split.test().len(),
        split.train().n_features()
    );
    Ok(split)
}

/// Load a feature table from its JSON header and the blob it references.
pub fn load_feature_table(header_path: &Path) -> Result<FeatureTable, DatasetError> {
    let header: FeatureHeader = serde_json::from_slice(&read_bytes(header_path)?)?;
    if header.format_version != DATASET_FORMAT_VERSION || header.encoding != "f32le" {
        return Err(DatasetError::InvalidManifest(format!(
            "{}: unsupported feature header (version {}, encoding {})",
            header_path.display(),
            header.format_version,
            header.encoding
        )));
    }
    let blob_path = header_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&header.blob);
    let values = load_f32le(&blob_path)?;
    let expected = header.n_rows * header.columns.len();
    if values.len() != expected {
        return Err(DatasetError::FeatureBlobSizeMismatch {
            path: blob_path,
            expected,
            actual: values.len(),
        });
    }
    let matrix = Array2::from_shape_vec((header.n_rows, header.columns.len()), values)
        .map_err(|err| DatasetError::InvalidManifest(err.to_string()))?;
    FeatureTable::new(header.columns, matrix)
}

/// Load a JSON array of 0/1 labels.
pub fn load_labels(path: &Path) -> Result<Vec<u8>, DatasetError> {
    let raw: Vec<i64> = serde_json::from_slice(&read_bytes(path)?)?;
    raw.into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            0 | 1 => Ok(value as u8),
            _ => Err(DatasetError::InvalidLabel { row, value }),
        })
        .collect()
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::MissingArtifact(path.to_path_buf()));
    }
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn load_f32le(path: &Path) -> Result<Vec<f32>, DatasetError> {
    let bytes = read_bytes(path)?;
    if bytes.len() % 4 != 0 {
        return Err(DatasetError::FeatureBlobSizeMismatch {
            path: path.to_path_buf(),
            expected: bytes.len().div_ceil(4),
            actual: bytes.len() / 4,
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::export::{write_feature_table, write_split};
    use crate::dataset::tests::tiny_dataset;
    use tempfile::tempdir;

    fn written_split(root: &Path) -> DatasetSplit {
        let data = tiny_dataset();
        let split = DatasetSplit::new(data.subset(&[0, 1, 3]), data.subset(&[2])).unwrap();
        write_split(root, &split).unwrap();
        split
    }

    #[test]
    fn loads_what_was_written() {
        let dir = tempdir().unwrap();
        let split = written_split(dir.path());
        let loaded = load_split(dir.path()).unwrap();
        assert_eq!(loaded, split);
        assert_eq!(loaded.columns(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn loads_minimal_handwritten_artifacts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("x.f32le"),
            [0.0f32, 1.0, 2.0, 3.0]
                .into_iter()
                .flat_map(|v| v.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
        .unwrap();
        std::fs::write(
            root.join("x.json"),
            r#"{"format_version":1,"columns":["age","amount"],"n_rows":2,"blob":"x.f32le"}"#,
        )
        .unwrap();
        let table = load_feature_table(&root.join("x.json")).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.values()[[1, 0]], 2.0);
        assert_eq!(table.values()[[1, 1]], 3.0);
    }

    #[test]
    fn rejects_truncated_blob() {
        let dir = tempdir().unwrap();
        written_split(dir.path());
        let blob = dir.path().join("train_features.f32le");
        let bytes = std::fs::read(&blob).unwrap();
        std::fs::write(&blob, &bytes[..bytes.len() - 4]).unwrap();
        let err = load_split(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::FeatureBlobSizeMismatch { .. }));
    }

    #[test]
    fn rejects_label_count_mismatch() {
        let dir = tempdir().unwrap();
        written_split(dir.path());
        std::fs::write(dir.path().join("test_labels.json"), "[1, 0]").unwrap();
        let err = load_split(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::LengthMismatch { rows: 1, labels: 2 }));
    }

    #[test]
    fn rejects_non_binary_labels() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("y.json"), "[0, 1, 3]").unwrap();
        let err = load_labels(&dir.path().join("y.json")).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { row: 2, value: 3 }));
    }

    #[test]
    fn rejects_misaligned_test_columns() {
        let dir = tempdir().unwrap();
        written_split(dir.path());
        let swapped = FeatureTable::new(
            vec!["b".into(), "a".into()],
            ndarray::array![[2.0, 1.0]],
        )
        .unwrap();
        write_feature_table(&dir.path().join("test_features.json"), &swapped).unwrap();
        let err = load_split(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::ColumnMismatch(_)));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempdir().unwrap();
        let err = load_split(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingArtifact(_)));
    }
}
