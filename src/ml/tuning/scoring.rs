use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ml::labels_from_proba;
use crate::ml::metrics::{self, ConfusionMatrix, MetricError, precision_recall_by_class};

/// Objective maximized by the grid search. Bad credit (label 1) is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    RocAuc,
    Accuracy,
    Precision,
    Recall,
    F1,
    /// Negated log loss, so larger is better like every other objective.
    NegLogLoss,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RocAuc => "roc_auc",
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
            Self::NegLogLoss => "neg_log_loss",
        }
    }

    /// Score probabilities against true labels; larger is better.
    pub fn score(&self, y_true: &[u8], proba: &[f64]) -> Result<f64, MetricError> {
        match self {
            Self::RocAuc => metrics::roc_auc(y_true, proba),
            Self::NegLogLoss => metrics::log_loss(y_true, proba).map(|loss| -loss),
            Self::Accuracy => {
                metrics::accuracy_score(y_true, &labels_from_proba(proba))
            }
            Self::Precision | Self::Recall | Self::F1 => {
                if y_true.is_empty() {
                    return Err(MetricError::Empty);
                }
                let cm = ConfusionMatrix::from_predictions(y_true, &labels_from_proba(proba))?;
                let positive = &precision_recall_by_class(&cm)[1];
                Ok(match self {
                    Self::Precision => positive.precision,
                    Self::Recall => positive.recall,
                    _ => positive.f1,
                })
            }
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roc_auc" | "auc" => Ok(Self::RocAuc),
            "accuracy" => Ok(Self::Accuracy),
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "f1" => Ok(Self::F1),
            "neg_log_loss" | "log_loss" => Ok(Self::NegLogLoss),
            other => Err(format!(
                "Unknown scoring {other} (expected roc_auc, accuracy, precision, recall, f1 or neg_log_loss)"
            )),
        }
    }
}
