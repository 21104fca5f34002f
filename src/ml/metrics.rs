//! Evaluation metrics for binary credit classifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest probability used when computing log loss.
const LOG_LOSS_EPS: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum MetricError {
    #[error("AUC-ROC is undefined: every label is class {class}")]
    SingleClass { class: u8 },
    #[error("{truth} true labels but {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
    #[error("no samples to score")]
    Empty,
    #[error("non-finite score at index {index}")]
    NonFinite { index: usize },
    #[error("label {value} at index {index} is not binary")]
    InvalidLabel { index: usize, value: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Binary matrix from aligned true and predicted labels.
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self, MetricError> {
        check_labels(y_true, y_pred.len())?;
        check_labels(y_pred, y_true.len())?;
        let mut cm = Self::new(2);
        for (&truth, &predicted) in y_true.iter().zip(y_pred) {
            cm.add(usize::from(truth), usize::from(predicted));
        }
        Ok(cm)
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Number of samples whose true class is `truth`.
    pub fn row_sum(&self, truth: usize) -> u32 {
        (0..self.n_classes).map(|j| self.get(truth, j)).sum()
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Macro or support-weighted average of the per-class table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageStats {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u32,
}

/// Compute per-class precision, recall and F1 from a confusion matrix.
///
/// Undefined ratios (no predictions or no true examples) are reported as 0.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = f64::from(cm.get(class_idx, class_idx));
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += f64::from(v);
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += f64::from(cm.get(i, class_idx));
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        stats.push(PerClassStats {
            precision,
            recall,
            f1,
            support,
        });
    }
    stats
}

pub fn macro_average(stats: &[PerClassStats]) -> AverageStats {
    let n = stats.len().max(1) as f64;
    AverageStats {
        precision: stats.iter().map(|s| s.precision).sum::<f64>() / n,
        recall: stats.iter().map(|s| s.recall).sum::<f64>() / n,
        f1: stats.iter().map(|s| s.f1).sum::<f64>() / n,
        support: stats.iter().map(|s| s.support).sum(),
    }
}

pub fn weighted_average(stats: &[PerClassStats]) -> AverageStats {
    let support: u32 = stats.iter().map(|s| s.support).sum();
    let total = f64::from(support.max(1));
    let weighted = |value: fn(&PerClassStats) -> f64| {
        stats
            .iter()
            .map(|s| value(s) * f64::from(s.support))
            .sum::<f64>()
            / total
    };
    AverageStats {
        precision: weighted(|s| s.precision),
        recall: weighted(|s| s.recall),
        f1: weighted(|s| s.f1),
        support,
    }
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = u64::from(cm.get(truth, predicted));
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f64) / (total as f64)
    }
}

/// Fraction of exact label matches.
pub fn accuracy_score(y_true: &[u8], y_pred: &[u8]) -> Result<f64, MetricError> {
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }
    Ok(accuracy(&ConfusionMatrix::from_predictions(y_true, y_pred)?))
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores receive their average rank, so each tied positive/negative
/// pair counts one half.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64, MetricError> {
    check_scores(y_true, scores)?;
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(MetricError::SingleClass {
            class: u8::from(positives > 0),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie group [start, end) shares their mean.
        let rank = (start + end + 1) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        positive_rank_sum += rank * tied_positives as f64;
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// One point on the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// ROC curve points from the highest threshold down, starting at (0, 0).
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Result<Vec<RocPoint>, MetricError> {
    check_scores(y_true, scores)?;
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(MetricError::SingleClass {
            class: u8::from(positives > 0),
        });
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = order
            .get(pos + 1)
            .is_none_or(|&next| scores[next] != scores[idx]);
        if last_of_tie {
            points.push(RocPoint {
                threshold: scores[idx],
                false_positive_rate: fp as f64 / negatives as f64,
                true_positive_rate: tp as f64 / positives as f64,
            });
        }
    }
    Ok(points)
}

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1.
pub fn log_loss(y_true: &[u8], proba: &[f64]) -> Result<f64, MetricError> {
    check_scores(y_true, proba)?;
    let total: f64 = y_true
        .iter()
        .zip(proba)
        .map(|(&y, &p)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Metrics for one model on one labelled set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub n_samples: usize,
    pub accuracy: f64,
    /// `None` when AUC is undefined; see `roc_auc_error`.
    pub roc_auc: Option<f64>,
    pub roc_auc_error: Option<MetricError>,
    pub log_loss: f64,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<PerClassStats>,
    pub macro_avg: AverageStats,
    pub weighted_avg: AverageStats,
}

impl EvaluationResult {
    /// AUC, or the reason it could not be computed.
    pub fn roc_auc(&self) -> Result<f64, MetricError> {
        match (self.roc_auc, &self.roc_auc_error) {
            (Some(auc), _) => Ok(auc),
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Err(MetricError::Empty),
        }
    }
}

/// Score predicted labels and probabilities against the truth.
///
/// A single-class truth vector leaves AUC undefined without failing the
/// remaining metrics.
pub fn evaluate(
    y_true: &[u8],
    y_pred: &[u8],
    proba: &[f64],
) -> Result<EvaluationResult, MetricError> {
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }
    let confusion = ConfusionMatrix::from_predictions(y_true, y_pred)?;
    let log_loss = log_loss(y_true, proba)?;
    let (roc_auc, roc_auc_error) = match roc_auc(y_true, proba) {
        Ok(auc) => (Some(auc), None),
        Err(err @ MetricError::SingleClass { .. }) => (None, Some(err)),
        Err(err) => return Err(err),
    };
    let per_class = precision_recall_by_class(&confusion);
    Ok(EvaluationResult {
        n_samples: y_true.len(),
        accuracy: accuracy(&confusion),
        roc_auc,
        roc_auc_error,
        log_loss,
        macro_avg: macro_average(&per_class),
        weighted_avg: weighted_average(&per_class),
        per_class,
        confusion,
    })
}

fn check_labels(labels: &[u8], other_len: usize) -> Result<(), MetricError> {
    if labels.len() != other_len {
        return Err(MetricError::LengthMismatch {
            truth: labels.len(),
            predicted: other_len,
        });
    }
    match labels.iter().position(|&y| y > 1) {
        Some(index) => Err(MetricError::InvalidLabel {
            index,
            value: labels[index],
        }),
        None => Ok(()),
    }
}

fn check_scores(y_true: &[u8], scores: &[f64]) -> Result<(), MetricError> {
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }
    check_labels(y_true, scores.len())?;
    match scores.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(MetricError::NonFinite { index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Y_TRUE: [u8; 8] = [0, 0, 0, 0, 0, 1, 1, 1];
    const Y_PRED: [u8; 8] = [0, 0, 0, 1, 0, 1, 0, 1];

    #[test]
    fn accuracy_matches_confusion_diagonal() {
        let cm = ConfusionMatrix::from_predictions(&Y_TRUE, &Y_PRED).unwrap();
        let tn = cm.get(0, 0);
        let tp = cm.get(1, 1);
        let acc = accuracy_score(&Y_TRUE, &Y_PRED).unwrap();
        assert!((0.0..=1.0).contains(&acc));
        assert_eq!(acc, f64::from(tn + tp) / 8.0);
        assert_eq!(acc, 0.75);
    }

    #[test]
    fn confusion_rows_sum_to_class_counts() {
        let cm = ConfusionMatrix::from_predictions(&Y_TRUE, &Y_PRED).unwrap();
        assert_eq!(cm.row_sum(0), 5);
        assert_eq!(cm.row_sum(1), 3);
        assert_eq!(cm.total(), 8);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 1);
    }

    #[test]
    fn per_class_table_and_averages() {
        let cm = ConfusionMatrix::from_predictions(&Y_TRUE, &Y_PRED).unwrap();
        let stats = precision_recall_by_class(&cm);
        assert!((stats[0].precision - 0.8).abs() < 1e-12);
        assert!((stats[0].recall - 0.8).abs() < 1e-12);
        assert!((stats[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats[1].f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats[1].support, 3);
        let macro_avg = macro_average(&stats);
        assert!((macro_avg.recall - (0.8 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        let weighted = weighted_average(&stats);
        assert!((weighted.recall - 0.75).abs() < 1e-12);
        assert_eq!(weighted.support, 8);
    }

    #[test]
    fn precision_is_zero_without_positive_predictions() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 1], &[0, 0, 0]).unwrap();
        let stats = precision_recall_by_class(&cm);
        assert_eq!(stats[1].precision, 0.0);
        assert_eq!(stats[1].f1, 0.0);
    }

    #[test]
    fn constant_scores_give_half_auc() {
        let auc = roc_auc(&Y_TRUE, &[0.3; 8]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn perfect_and_inverted_rankings() {
        let scores = [0.1, 0.2, 0.3, 0.35, 0.4, 0.6, 0.7, 0.9];
        assert_eq!(roc_auc(&Y_TRUE, &scores).unwrap(), 1.0);
        let inverted: Vec<f64> = scores.iter().map(|s| 1.0 - s).collect();
        assert_eq!(roc_auc(&Y_TRUE, &inverted).unwrap(), 0.0);
    }

    #[test]
    fn ties_count_one_half() {
        // One positive tied with one of two negatives, above the other.
        let auc = roc_auc(&[0, 0, 1], &[0.2, 0.5, 0.5]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_class_auc_is_an_error() {
        assert_eq!(
            roc_auc(&[0, 0, 0], &[0.1, 0.2, 0.3]),
            Err(MetricError::SingleClass { class: 0 })
        );
        assert_eq!(
            roc_auc(&[1, 1], &[0.1, 0.2]),
            Err(MetricError::SingleClass { class: 1 })
        );
    }

    #[test]
    fn evaluate_keeps_other_metrics_when_auc_fails() {
        let result = evaluate(&[0, 0, 0], &[0, 1, 0], &[0.1, 0.7, 0.2]).unwrap();
        assert!(result.roc_auc.is_none());
        assert_eq!(
            result.roc_auc(),
            Err(MetricError::SingleClass { class: 0 })
        );
        assert!((result.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.confusion.row_sum(0), 3);
    }

    #[test]
    fn length_mismatches_are_rejected() {
        assert!(matches!(
            evaluate(&[0, 1], &[0], &[0.1, 0.9]),
            Err(MetricError::LengthMismatch { .. })
        ));
        assert!(matches!(
            roc_auc(&[0, 1], &[0.1]),
            Err(MetricError::LengthMismatch { .. })
        ));
        assert_eq!(accuracy_score(&[], &[]), Err(MetricError::Empty));
    }

    #[test]
    fn log_loss_clips_extremes() {
        let loss = log_loss(&[1, 0], &[1.0, 0.0]).unwrap();
        assert!(loss.is_finite() && loss < 1e-10);
        let worst = log_loss(&[1], &[0.0]).unwrap();
        assert!((worst - (-(LOG_LOSS_EPS).ln())).abs() < 1e-9);
        assert!((log_loss(&[1, 0], &[0.5, 0.5]).unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn roc_curve_ends_at_one_one() {
        let curve = roc_curve(&Y_TRUE, &[0.1, 0.2, 0.3, 0.35, 0.4, 0.6, 0.7, 0.9]).unwrap();
        let first = curve.first().unwrap();
        let last = curve.last().unwrap();
        assert_eq!((first.false_positive_rate, first.true_positive_rate), (0.0, 0.0));
        assert_eq!((last.false_positive_rate, last.true_positive_rate), (1.0, 1.0));
        assert_eq!(curve.len(), 9);
    }
}
