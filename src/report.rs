//! Human-readable and JSON renderings of evaluation and tuning results.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::dataset::{CLASS_NAMES, Dataset, DatasetSplit};
use crate::ml::metrics::{self, AverageStats, ConfusionMatrix, EvaluationResult, RocPoint};
use crate::ml::tuning::GridSearchOutcome;
use crate::ml::{FitWarning, Fitted, ModelError, ModelKind, ModelSpec, labels_from_proba};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shape and balance of the loaded split.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_features: usize,
    pub train_positive_rate: f64,
    pub test_positive_rate: f64,
}

impl DatasetSummary {
    pub fn from_split(split: &DatasetSplit) -> Self {
        Self {
            train_rows: split.train().len(),
            test_rows: split.test().len(),
            n_features: split.train().n_features(),
            train_positive_rate: split.train().positive_rate(),
            test_positive_rate: split.test().positive_rate(),
        }
    }
}

/// Test-set result of one fitted model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub name: String,
    pub kind: ModelKind,
    pub spec: ModelSpec,
    pub warnings: Vec<FitWarning>,
    pub evaluation: EvaluationResult,
    /// Empty when the test split holds a single class.
    pub roc_curve: Vec<RocPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_importance: Vec<FeatureImportance>,
}

impl ModelReport {
    /// Score a fitted model on `test`, keeping its ROC curve and gain ranking.
    pub fn from_fit(spec: ModelSpec, fitted: Fitted, test: &Dataset) -> Result<Self, ModelError> {
        let kind = spec.kind();
        let proba = fitted.model.predict_proba(test.records())?.to_vec();
        let predicted = labels_from_proba(&proba);
        let evaluation = metrics::evaluate(test.labels(), &predicted, &proba)?;
        let roc_curve = metrics::roc_curve(test.labels(), &proba).unwrap_or_default();
        let feature_importance = fitted
            .model
            .feature_importance()
            .map(|gains| ranked_importance(test.features().columns(), &gains))
            .unwrap_or_default();
        Ok(Self {
            name: kind.label().to_string(),
            kind,
            spec,
            warnings: fitted.warnings,
            evaluation,
            roc_curve,
            feature_importance,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub gain: f64,
}

/// Features with non-zero gain, highest first.
pub fn ranked_importance(columns: &[String], gains: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = columns
        .iter()
        .zip(gains)
        .filter(|&(_, &gain)| gain > 0.0)
        .map(|(feature, &gain)| FeatureImportance {
            feature: feature.clone(),
            gain,
        })
        .collect();
    ranked.sort_by(|a, b| b.gain.total_cmp(&a.gain));
    ranked
}

#[derive(Debug, Clone, Serialize)]
pub struct TuningReport {
    pub search: GridSearchOutcome,
    /// Refit best model scored on the held-out test split.
    pub test_evaluation: EvaluationResult,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub dataset: DatasetSummary,
    pub models: Vec<ModelReport>,
    pub tuning: Option<TuningReport>,
}

impl ExperimentReport {
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let write_err = |source: std::io::Error| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?).map_err(write_err)?;
        Ok(())
    }
}

/// One line: accuracy, AUC (or why it is undefined) and log loss.
pub fn evaluation_summary(name: &str, result: &EvaluationResult) -> String {
    let auc = match result.roc_auc() {
        Ok(auc) => format!("{auc:.4}"),
        Err(err) => format!("n/a ({err})"),
    };
    format!(
        "{name}: accuracy={:.4}  auc={auc}  log_loss={:.4}  n={}",
        result.accuracy, result.log_loss, result.n_samples
    )
}

pub fn confusion_matrix_table(cm: &ConfusionMatrix) -> String {
    let mut out = String::from("confusion matrix (rows=true, cols=pred):\n");
    let _ = write!(out, "{:>8}", "");
    for pred in 0..cm.n_classes {
        let _ = write!(out, "{:>8}", class_name(pred));
    }
    out.push('\n');
    for truth in 0..cm.n_classes {
        let _ = write!(out, "{:>8}", class_name(truth));
        for pred in 0..cm.n_classes {
            let _ = write!(out, "{:>8}", cm.get(truth, pred));
        }
        out.push('\n');
    }
    out
}

/// Per-class precision/recall/F1/support table with accuracy and averages.
pub fn classification_report(result: &EvaluationResult) -> String {
    let mut out = format!(
        "{:>14}{:>11}{:>10}{:>10}{:>10}\n\n",
        "", "precision", "recall", "f1-score", "support"
    );
    for (idx, stats) in result.per_class.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>14}{:>11.3}{:>10.3}{:>10.3}{:>10}",
            class_name(idx),
            stats.precision,
            stats.recall,
            stats.f1,
            stats.support
        );
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "{:>14}{:>11}{:>10}{:>10.3}{:>10}",
        "accuracy", "", "", result.accuracy, result.n_samples
    );
    average_row(&mut out, "macro avg", &result.macro_avg);
    average_row(&mut out, "weighted avg", &result.weighted_avg);
    out
}

fn average_row(out: &mut String, label: &str, avg: &AverageStats) {
    let _ = writeln!(
        out,
        "{:>14}{:>11.3}{:>10.3}{:>10.3}{:>10}",
        label, avg.precision, avg.recall, avg.f1, avg.support
    );
}

/// Side-by-side test metrics for several models.
pub fn model_comparison(rows: &[(&str, &EvaluationResult)]) -> String {
    let mut out = format!(
        "{:<36}{:>10}{:>10}{:>10}{:>12}{:>10}\n",
        "model", "accuracy", "auc", "log_loss", "bad recall", "bad f1"
    );
    for (name, result) in rows {
        let auc = result
            .roc_auc
            .map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}"));
        let (recall, f1) = result
            .per_class
            .get(1)
            .map_or((0.0, 0.0), |bad| (bad.recall, bad.f1));
        let _ = writeln!(
            out,
            "{:<36}{:>10.4}{:>10}{:>10.4}{:>12.3}{:>10.3}",
            name, result.accuracy, auc, result.log_loss, recall, f1
        );
    }
    out
}

/// The `top` features by gain with their share of the total.
pub fn feature_importance_table(ranked: &[FeatureImportance], top: usize) -> String {
    let total: f64 = ranked.iter().map(|entry| entry.gain).sum();
    let mut out = format!("{:<32}{:>12}{:>8}\n", "feature", "gain", "share");
    for entry in ranked.iter().take(top) {
        let _ = writeln!(
            out,
            "{:<32}{:>12.3}{:>7.1}%",
            entry.feature,
            entry.gain,
            100.0 * entry.gain / total
        );
    }
    out
}

/// Ranked candidates (up to `top`) followed by excluded configurations.
pub fn grid_search_summary(outcome: &GridSearchOutcome, top: usize) -> String {
    let mut out = format!(
        "grid search: {} {} configurations, {}-fold CV, scoring={}\n",
        outcome.candidates.len(),
        outcome.model_kind,
        outcome.folds,
        outcome.scoring
    );
    let _ = writeln!(
        out,
        "best: {} = {:.4} with {}",
        outcome.scoring, outcome.best_score, outcome.best_params
    );
    for candidate in outcome.ranked().into_iter().take(top) {
        let _ = writeln!(
            out,
            "  #{:<3} {:.4} (+/- {:.4})  {}",
            candidate.rank.unwrap_or_default(),
            candidate.mean_score.unwrap_or_default(),
            candidate.std_score.unwrap_or_default(),
            candidate.params
        );
    }
    let excluded: Vec<_> = outcome.excluded().collect();
    if !excluded.is_empty() {
        let _ = writeln!(out, "excluded {} configurations:", excluded.len());
        for candidate in excluded {
            let _ = writeln!(
                out,
                "  {}: {}",
                candidate.params,
                candidate.error.as_deref().unwrap_or("no score")
            );
        }
    }
    out
}

fn class_name(idx: usize) -> &'static str {
    CLASS_NAMES.get(idx).copied().unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::evaluate;

    fn sample() -> EvaluationResult {
        evaluate(
            &[0, 0, 0, 1, 1],
            &[0, 1, 0, 1, 0],
            &[0.1, 0.6, 0.2, 0.9, 0.4],
        )
        .unwrap()
    }

    #[test]
    fn confusion_table_lists_counts_by_class() {
        let table = confusion_matrix_table(&sample().confusion);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "confusion matrix (rows=true, cols=pred):");
        assert!(lines[1].contains("good") && lines[1].contains("bad"));
        let good: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(good, vec!["good", "2", "1"]);
        let bad: Vec<&str> = lines[3].split_whitespace().collect();
        assert_eq!(bad, vec!["bad", "1", "1"]);
    }

    #[test]
    fn classification_report_has_class_and_average_rows() {
        let report = classification_report(&sample());
        assert!(report.contains("precision"));
        assert!(report.lines().any(|line| line.trim_start().starts_with("good")));
        assert!(report.lines().any(|line| line.trim_start().starts_with("weighted avg")));
        let accuracy = report
            .lines()
            .find(|line| line.trim_start().starts_with("accuracy"))
            .unwrap();
        assert!(accuracy.contains("0.600"));
    }

    #[test]
    fn summary_explains_undefined_auc() {
        let single = evaluate(&[0, 0], &[0, 0], &[0.2, 0.3]).unwrap();
        let line = evaluation_summary("baseline", &single);
        assert!(line.contains("auc=n/a"), "{line}");
        assert!(evaluation_summary("baseline", &sample()).contains("auc=0.8333"));
    }

    #[test]
    fn comparison_has_one_row_per_model() {
        let result = sample();
        let table = model_comparison(&[("a", &result), ("b", &result)]);
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn report_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = ExperimentReport {
            dataset: DatasetSummary {
                train_rows: 4,
                test_rows: 1,
                n_features: 2,
                train_positive_rate: 0.5,
                test_positive_rate: 1.0,
            },
            models: vec![ModelReport {
                name: "Logistic Regression".into(),
                kind: ModelKind::LogisticRegression,
                spec: ModelSpec::default_for(ModelKind::LogisticRegression),
                warnings: Vec::new(),
                evaluation: sample(),
                roc_curve: Vec::new(),
                feature_importance: Vec::new(),
            }],
            tuning: None,
        };
        let path = dir.path().join("out/report.json");
        report.write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["models"][0]["spec"]["kind"], "logistic_regression");
        assert_eq!(value["models"][0]["evaluation"]["confusion"]["counts"][0], 2);
        assert!(value["models"][0].get("feature_importance").is_none());
    }

    #[test]
    fn importance_drops_unused_features_and_sorts_by_gain() {
        let columns = vec!["age".to_string(), "amount".to_string(), "duration".to_string()];
        let ranked = ranked_importance(&columns, &[1.0, 0.0, 3.0]);
        let names: Vec<&str> = ranked.iter().map(|entry| entry.feature.as_str()).collect();
        assert_eq!(names, vec!["duration", "age"]);
        let table = feature_importance_table(&ranked, 1);
        assert_eq!(table.lines().count(), 2);
        assert!(table.lines().nth(1).unwrap().contains("75.0%"));
    }

    #[test]
    fn model_report_carries_curve_and_importance() {
        let x = ndarray::Array2::from_shape_fn((16, 2), |(i, j)| if j == 0 { i as f32 } else { 1.0 });
        let columns = vec!["signal".to_string(), "constant".to_string()];
        let labels = (0..16).map(|i| u8::from(i >= 8)).collect();
        let data = Dataset::new(
            crate::dataset::FeatureTable::new(columns, x).unwrap(),
            labels,
        )
        .unwrap();
        let spec = ModelSpec::default_for(ModelKind::GradientBoosting);
        let fitted = spec.fit_dataset(&data).unwrap();
        let report = ModelReport::from_fit(spec, fitted, &data).unwrap();
        assert_eq!(report.name, ModelKind::GradientBoosting.label());
        assert_eq!(report.roc_curve.first().unwrap().true_positive_rate, 0.0);
        assert_eq!(report.roc_curve.last().unwrap().true_positive_rate, 1.0);
        assert_eq!(report.feature_importance.len(), 1);
        assert_eq!(report.feature_importance[0].feature, "signal");
    }
}
