//! Experiment configuration loaded from `creditlab.toml`.
//!
//! Every field has a default, so a missing file or a partial file both work.
//! Relative paths are resolved against the directory holding the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::dataset::split::SplitOptions;
use crate::ml::forest::ForestParams;
use crate::ml::gbdt::GbdtParams;
use crate::ml::logreg::LogRegParams;
use crate::ml::params::ParamValue;
use crate::ml::tuning::{self, GridSearch, ParamGrid, Scoring, WorkerCount};
use crate::ml::{ModelKind, ModelSpec};

/// Default filename of the experiment configuration.
pub const CONFIG_FILE_NAME: &str = "creditlab.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("No suitable config directory found: {0}")]
    AppDir(#[from] AppDirError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Directory holding `manifest.json` and the four dataset artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub split: SplitSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub tuning: TuningSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            split: SplitSettings::default(),
            models: ModelSettings::default(),
            tuning: TuningSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

/// Train/test split used when generating a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSettings {
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub stratify: bool,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            test_ratio: default_test_ratio(),
            seed: default_seed(),
            stratify: true,
        }
    }
}

impl SplitSettings {
    pub fn options(&self) -> SplitOptions {
        SplitOptions {
            test_ratio: self.test_ratio,
            seed: self.seed,
            stratify: self.stratify,
        }
    }
}

/// Baseline hyperparameters per model family.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub logistic_regression: LogRegParams,
    #[serde(default)]
    pub random_forest: ForestParams,
    #[serde(default)]
    pub gradient_boosting: GbdtParams,
}

impl ModelSettings {
    pub fn spec(&self, kind: ModelKind) -> ModelSpec {
        match kind {
            ModelKind::LogisticRegression => {
                ModelSpec::LogisticRegression(self.logistic_regression.clone())
            }
            ModelKind::RandomForest => ModelSpec::RandomForest(self.random_forest.clone()),
            ModelKind::GradientBoosting => {
                ModelSpec::GradientBoosting(self.gradient_boosting.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tuning_model")]
    pub model: ModelKind,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default = "default_folds")]
    pub folds: usize,
    /// Worker threads; 0 uses every available core.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Dimensions searched, ordered by name. Empty means the built-in grid.
    #[serde(default)]
    pub grid: BTreeMap<String, Vec<ParamValue>>,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_tuning_model(),
            scoring: Scoring::default(),
            folds: default_folds(),
            workers: 0,
            shuffle: false,
            seed: default_seed(),
            grid: BTreeMap::new(),
        }
    }
}

impl TuningSettings {
    pub fn param_grid(&self) -> ParamGrid {
        if self.grid.is_empty() {
            tuning::default_grid(self.model)
        } else {
            ParamGrid::from_map(&self.grid)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Write the full experiment report as JSON here.
    #[serde(default)]
    pub json_path: Option<PathBuf>,
    /// Save the tuned model as JSON here.
    #[serde(default)]
    pub model_out: Option<PathBuf>,
}

impl ExperimentConfig {
    /// Grid search described by the tuning section.
    pub fn grid_search(&self) -> GridSearch {
        let tuning = &self.tuning;
        GridSearch::new(self.models.spec(tuning.model), tuning.param_grid())
            .scoring(tuning.scoring)
            .folds(tuning.folds)
            .workers(WorkerCount::from_config(tuning.workers))
            .shuffle_seed(tuning.shuffle.then_some(tuning.seed))
    }

    /// Range checks plus a dry expansion of the grid so bad names fail up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.split.test_ratio > 0.0 && self.split.test_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "split.test_ratio must be in (0, 1), got {}",
                self.split.test_ratio
            )));
        }
        if self.tuning.folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "tuning.folds must be at least 2, got {}",
                self.tuning.folds
            )));
        }
        for kind in ModelKind::ALL {
            self.models
                .spec(kind)
                .validate()
                .map_err(|err| ConfigError::Invalid(format!("models.{kind}: {err}")))?;
        }
        self.grid_search()
            .candidate_specs()
            .map_err(|err| ConfigError::Invalid(format!("tuning.grid: {err}")))?;
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.data_dir);
        if let Some(path) = self.report.json_path.as_mut() {
            resolve(path);
        }
        if let Some(path) = self.report.model_out.as_mut() {
            resolve(path);
        }
    }
}

/// Config path inside the application directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load a config file, returning defaults if it does not exist.
pub fn load(path: &Path) -> Result<ExperimentConfig, ConfigError> {
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let mut config = if path.exists() {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        ExperimentConfig::default()
    };
    config.resolve_paths(&base);
    config.validate()?;
    Ok(config)
}

/// Load the config named on the command line, else `./creditlab.toml`, else the
/// one in the application directory. Defaults resolve against the working directory.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ExperimentConfig, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
            });
        }
        return load(path);
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load(&local);
    }
    match config_path() {
        Ok(path) if path.exists() => load(&path),
        _ => load(&local),
    }
}

/// Write a config as TOML, creating parent directories as needed.
pub fn save_to_path(config: &ExperimentConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

fn default_folds() -> usize {
    tuning::DEFAULT_FOLDS
}

fn default_tuning_model() -> ModelKind {
    ModelKind::RandomForest
}
