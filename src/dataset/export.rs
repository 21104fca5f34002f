//! Writers for the persisted train/test artifacts read by [`super::loader`].
//!
//! A dataset directory holds four artifacts plus `manifest.json`:
//! - `<split>_features.json`: column names, row count and the blob file name.
//! - `<split>_features.f32le`: row-major little-endian `f32` values.
//! - `<split>_labels.json`: JSON array of 0/1 labels.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{Dataset, DatasetError, DatasetSplit, FeatureTable};

pub(crate) const DATASET_FORMAT_VERSION: i64 = 1;
pub(crate) const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Serialize)]
struct FeatureHeaderOut<'a> {
    format_version: i64,
    encoding: &'static str,
    columns: &'a [String],
    n_rows: usize,
    blob: String,
}

#[derive(Debug, Serialize)]
struct ManifestOut {
    format_version: i64,
    n_features: usize,
    train_rows: usize,
    test_rows: usize,
    files: ManifestFilesOut,
}

#[derive(Debug, Serialize)]
struct ManifestFilesOut {
    train_features: String,
    test_features: String,
    train_labels: String,
    test_labels: String,
}

/// Write both sides of a split plus a manifest into `dir` (created if missing).
pub fn write_split(dir: &Path, split: &DatasetSplit) -> Result<PathBuf, DatasetError> {
    std::fs::create_dir_all(dir)?;
    let (train_features, train_labels) = write_dataset_side(dir, "train", split.train())?;
    let (test_features, test_labels) = write_dataset_side(dir, "test", split.test())?;
    let files = ManifestFilesOut {
        train_features,
        test_features,
        train_labels,
        test_labels,
    };
    let manifest = ManifestOut {
        format_version: DATASET_FORMAT_VERSION,
        n_features: split.train().n_features(),
        train_rows: split.train().len(),
        test_rows: split.test().len(),
        files,
    };
    let path = dir.join(MANIFEST_FILE_NAME);
    std::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
    tracing::info!(
        "Wrote dataset ({} train / {} test rows, {} features) to {}",
        manifest.train_rows,
        manifest.test_rows,
        manifest.n_features,
        dir.display()
    );
    Ok(path)
}

fn write_dataset_side(
    dir: &Path,
    name: &str,
    data: &Dataset,
) -> Result<(String, String), DatasetError> {
    let header = format!("{name}_features.json");
    let labels = format!("{name}_labels.json");
    write_feature_table(&dir.join(&header), data.features())?;
    write_labels(&dir.join(&labels), data.labels())?;
    Ok((header, labels))
}

/// Write a feature table as a JSON header next to its `.f32le` blob.
pub fn write_feature_table(header_path: &Path, table: &FeatureTable) -> Result<(), DatasetError> {
    let blob_path = header_path.with_extension("f32le");
    let blob_name = blob_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DatasetError::InvalidManifest(format!("bad path {}", blob_path.display())))?
        .to_string();

    let mut writer = BufWriter::new(File::create(&blob_path)?);
    for value in table.values().iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;

    let header = FeatureHeaderOut {
        format_version: DATASET_FORMAT_VERSION,
        encoding: "f32le",
        columns: table.columns(),
        n_rows: table.n_rows(),
        blob: blob_name,
    };
    std::fs::write(header_path, serde_json::to_vec_pretty(&header)?)?;
    Ok(())
}

/// Write labels as a JSON array.
pub fn write_labels(path: &Path, labels: &[u8]) -> Result<(), DatasetError> {
    std::fs::write(path, serde_json::to_vec(labels)?)?;
    Ok(())
}
