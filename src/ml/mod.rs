//! Binary credit-default classifiers, evaluation metrics and hyperparameter search.
//!
//! Every model family is fitted through [`ModelSpec::fit`] and queried through
//! [`TrainedModel`], so the trainer, evaluator and tuner treat the algorithms
//! interchangeably. All learners are deterministic for a given seed.

pub mod forest;
pub mod gbdt;
pub mod logreg;
pub mod metrics;
pub mod params;
pub mod tree;
pub mod tuning;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use forest::{ForestModel, ForestParams};
use gbdt::{GbdtModel, GbdtParams};
use logreg::{LogRegModel, LogRegParams};
use metrics::{EvaluationResult, MetricError};
use params::{ParamSet, ParamValue};

/// Probability above which a row is predicted as bad credit.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("feature rows ({rows}) do not match label count ({labels})")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("label {value} at row {row} is not binary")]
    InvalidLabel { row: usize, value: u8 },
    #[error("non-finite feature value at row {row}, feature {feature}")]
    NonFinite { row: usize, feature: usize },
    #[error("model expects {expected} features but input has {actual}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("invalid hyperparameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("unknown hyperparameter {name} for {kind}")]
    UnknownParam { kind: ModelKind, name: String },
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("metric error: {0}")]
    Metric(#[from] MetricError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn invalid_param(name: &str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidParam {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "logistic_regression",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
        }
    }

    /// Human-readable name used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "Logistic Regression",
            Self::RandomForest => "Random Forest",
            Self::GradientBoosting => "Gradient Boosting (XGBoost-style)",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "logistic_regression" | "logreg" | "lr" => Ok(Self::LogisticRegression),
            "random_forest" | "rf" | "forest" => Ok(Self::RandomForest),
            "gradient_boosting" | "gbdt" | "xgboost" | "xgb" => Ok(Self::GradientBoosting),
            other => Err(format!(
                "Unknown model {other} (expected logistic_regression, random_forest or gradient_boosting)"
            )),
        }
    }
}

/// Non-fatal conditions raised while fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum FitWarning {
    /// The optimizer stopped at its iteration cap before meeting the tolerance.
    NotConverged { iterations: usize, gradient_norm: f64 },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged {
                iterations,
                gradient_norm,
            } => write!(
                f,
                "optimizer did not converge after {iterations} iterations (gradient norm {gradient_norm:.3e}); consider raising max_iter"
            ),
        }
    }
}

/// Row-level scoring shared by every fitted model family.
pub trait Classifier {
    /// Feature count the model was fitted on.
    fn n_features(&self) -> usize;

    /// Probability that the row is bad credit (class 1).
    fn probability(&self, row: ArrayView1<'_, f32>) -> f64;
}

/// A model family plus hyperparameters, ready to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogRegParams),
    RandomForest(ForestParams),
    GradientBoosting(GbdtParams),
}

impl ModelSpec {
    /// Spec with the family's default hyperparameters.
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LogisticRegression => Self::LogisticRegression(LogRegParams::default()),
            ModelKind::RandomForest => Self::RandomForest(ForestParams::default()),
            ModelKind::GradientBoosting => Self::GradientBoosting(GbdtParams::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Check hyperparameter ranges.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Self::LogisticRegression(p) => p.validate(),
            Self::RandomForest(p) => p.validate(),
            Self::GradientBoosting(p) => p.validate(),
        }
    }

    /// Set one hyperparameter by name; unknown names and mistyped values are errors.
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        let kind = self.kind();
        let known = match self {
            Self::LogisticRegression(p) => p.set(name, value)?,
            Self::RandomForest(p) => p.set(name, value)?,
            Self::GradientBoosting(p) => p.set(name, value)?,
        };
        if known {
            Ok(())
        } else {
            Err(ModelError::UnknownParam {
                kind,
                name: name.to_string(),
            })
        }
    }

    /// Copy of this spec with every value in `params` applied.
    pub fn with_params(&self, params: &ParamSet) -> Result<Self, ModelError> {
        let mut spec = self.clone();
        for (name, value) in params.iter() {
            spec.set_param(name, value)?;
        }
        Ok(spec)
    }

    /// Fit on a feature matrix and aligned 0/1 labels.
    pub fn fit(&self, x: ArrayView2<'_, f32>, y: &[u8]) -> Result<Fitted, ModelError> {
        self.validate()?;
        validate_training_inputs(x, y)?;
        let fitted = match self {
            Self::LogisticRegression(p) => {
                let (model, warnings) = logreg::train_logreg(x, y, p)?;
                Fitted {
                    model: TrainedModel::LogisticRegression(model),
                    warnings,
                }
            }
            Self::RandomForest(p) => Fitted {
                model: TrainedModel::RandomForest(forest::train_forest(x, y, p)?),
                warnings: Vec::new(),
            },
            Self::GradientBoosting(p) => Fitted {
                model: TrainedModel::GradientBoosting(gbdt::train_gbdt(x, y, p)?),
                warnings: Vec::new(),
            },
        };
        for warning in &fitted.warnings {
            tracing::warn!("{} fit warning: {warning}", self.kind());
        }
        Ok(fitted)
    }

    pub fn fit_dataset(&self, data: &Dataset) -> Result<Fitted, ModelError> {
        self.fit(data.records(), data.labels())
    }
}

/// A fitted model plus any non-fatal warnings raised while fitting it.
#[derive(Debug, Clone)]
pub struct Fitted {
    pub model: TrainedModel,
    pub warnings: Vec<FitWarning>,
}

/// A fitted classifier of any supported family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogRegModel),
    RandomForest(ForestModel),
    GradientBoosting(GbdtModel),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match self {
            Self::LogisticRegression(m) => m,
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
        }
    }

    pub fn n_features(&self) -> usize {
        self.classifier().n_features()
    }

    /// Total split gain per feature, for families that record it.
    pub fn feature_importance(&self) -> Option<Vec<f64>> {
        match self {
            Self::GradientBoosting(m) => Some(m.feature_importance()),
            Self::LogisticRegression(_) | Self::RandomForest(_) => None,
        }
    }

    /// Probability of bad credit for every row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Array1<f64>, ModelError> {
        let classifier = self.classifier();
        if x.ncols() != classifier.n_features() {
            return Err(ModelError::FeatureCount {
                expected: classifier.n_features(),
                actual: x.ncols(),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| classifier.probability(row))
            .collect())
    }

    /// Hard 0/1 label for every row.
    pub fn predict(&self, x: ArrayView2<'_, f32>) -> Result<Vec<u8>, ModelError> {
        let proba = self.predict_proba(x)?.to_vec();
        Ok(labels_from_proba(&proba))
    }

    /// Score this model on a labelled dataset.
    pub fn evaluate(&self, data: &Dataset) -> Result<EvaluationResult, ModelError> {
        let proba = self.predict_proba(data.records())?.to_vec();
        let predicted = labels_from_proba(&proba);
        Ok(metrics::evaluate(data.labels(), &predicted, &proba)?)
    }

    /// Save the model as pretty JSON, creating parent folders.
    pub fn save_json(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Threshold probabilities at [`DECISION_THRESHOLD`].
pub fn labels_from_proba(proba: &[f64]) -> Vec<u8> {
    proba
        .iter()
        .map(|&p| u8::from(p > DECISION_THRESHOLD))
        .collect()
}

/// Shape, label and finiteness checks shared by every learner.
pub fn validate_training_inputs(x: ArrayView2<'_, f32>, y: &[u8]) -> Result<(), ModelError> {
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if let Some((row, &value)) = y.iter().enumerate().find(|(_, label)| **label > 1) {
        return Err(ModelError::InvalidLabel { row, value });
    }
    if let Some(((row, feature), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::NonFinite { row, feature });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
