//! Exhaustive grid search over hyperparameters with stratified k-fold cross-validation.
//!
//! Every (configuration, fold) pair is an independent fit, so the search is a
//! batch of tasks run on [`pool::run_tasks`]. Results are reassembled in grid
//! order before ranking, which keeps the outcome independent of scheduling.

pub mod grid;
pub mod pool;
pub mod scoring;

pub use grid::ParamGrid;
pub use pool::WorkerCount;
pub use scoring::Scoring;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dataset::split::{Fold, stratified_k_fold};
use crate::dataset::{Dataset, DatasetError};
use crate::ml::params::{ParamSet, ParamValue};
use crate::ml::{FitWarning, Fitted, ModelError, ModelKind, ModelSpec};

pub const DEFAULT_FOLDS: usize = 5;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("cross-validation fold {fold} failed: {message}")]
    Fold { fold: usize, message: String },
    #[error("every one of the {tried} configurations failed; first error: {first_error}")]
    NoViableCandidate { tried: usize, first_error: String },
    #[error("refit on the full training data failed: {0}")]
    Refit(#[source] ModelError),
}

/// Cross-validated result of one grid configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    /// Position in grid enumeration order.
    pub index: usize,
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: Option<f64>,
    pub std_score: Option<f64>,
    /// 1 is best; tied means share a rank. `None` for excluded candidates.
    pub rank: Option<usize>,
    /// Why the candidate was excluded from comparison.
    pub error: Option<String>,
    pub warnings: Vec<FitWarning>,
}

impl CandidateResult {
    pub fn is_viable(&self) -> bool {
        self.error.is_none() && self.mean_score.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSearchOutcome {
    pub model_kind: ModelKind,
    pub scoring: Scoring,
    pub folds: usize,
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub best_spec: ModelSpec,
    pub candidates: Vec<CandidateResult>,
    /// Best configuration refit on all training rows.
    #[serde(skip)]
    pub best_model: Fitted,
}

impl GridSearchOutcome {
    /// Viable candidates ordered by rank, ties in grid order.
    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> =
            self.candidates.iter().filter(|c| c.is_viable()).collect();
        ranked.sort_by_key(|c| (c.rank, c.index));
        ranked
    }

    pub fn excluded(&self) -> impl Iterator<Item = &CandidateResult> {
        self.candidates.iter().filter(|c| !c.is_viable())
    }
}

/// Grid search configuration.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub base: ModelSpec,
    pub grid: ParamGrid,
    pub scoring: Scoring,
    pub folds: usize,
    pub workers: WorkerCount,
    /// Shuffle rows within each label before dealing folds.
    pub shuffle_seed: Option<u64>,
}

impl GridSearch {
    pub fn new(base: ModelSpec, grid: ParamGrid) -> Self {
        Self {
            base,
            grid,
            scoring: Scoring::default(),
            folds: DEFAULT_FOLDS,
            workers: WorkerCount::default(),
            shuffle_seed: None,
        }
    }

    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn workers(mut self, workers: WorkerCount) -> Self {
        self.workers = workers;
        self
    }

    pub fn shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Expand the grid into concrete specs. Unknown names and mistyped values fail here.
    pub fn candidate_specs(&self) -> Result<Vec<(ParamSet, ModelSpec)>, TuneError> {
        self.grid
            .candidates()?
            .into_iter()
            .map(|params| {
                let spec = self.base.with_params(&params)?;
                Ok((params, spec))
            })
            .collect()
    }

    /// Score every configuration, pick the best and refit it on all of `train`.
    pub fn run(&self, train: &Dataset) -> Result<GridSearchOutcome, TuneError> {
        let candidates = self.candidate_specs()?;
        let folds = stratified_k_fold(train.labels(), self.folds, self.shuffle_seed)?;
        let specs: Vec<&ModelSpec> = candidates.iter().map(|(_, spec)| spec).collect();
        info!(
            "Grid search over {} {} configurations x {} folds, scoring {}",
            candidates.len(),
            self.base.kind(),
            folds.len(),
            self.scoring
        );

        let per_fold = evaluate_folds(&specs, train, &folds, self.scoring, self.workers);
        let mut results: Vec<CandidateResult> = candidates
            .iter()
            .zip(per_fold)
            .enumerate()
            .map(|(index, ((params, _), fold_results))| {
                summarize_candidate(index, params.clone(), fold_results)
            })
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for result in &results {
            match (&result.error, result.mean_score) {
                (Some(err), _) => warn!(
                    "Excluding candidate {} ({}): {err}",
                    result.index, result.params
                ),
                (None, Some(mean)) => {
                    if best.is_none_or(|(_, best_mean)| mean > best_mean) {
                        best = Some((result.index, mean));
                    }
                }
                (None, None) => {}
            }
        }
        let Some((best_index, best_score)) = best else {
            let first_error = results
                .iter()
                .find_map(|r| r.error.clone())
                .unwrap_or_default();
            return Err(TuneError::NoViableCandidate {
                tried: results.len(),
                first_error,
            });
        };
        assign_ranks(&mut results);

        let (best_params, best_spec) = candidates[best_index].clone();
        info!(
            "Best {} = {best_score:.4} with {best_params}; refitting on {} rows",
            self.scoring,
            train.len()
        );
        let best_model = best_spec.fit_dataset(train).map_err(TuneError::Refit)?;

        Ok(GridSearchOutcome {
            model_kind: self.base.kind(),
            scoring: self.scoring,
            folds: folds.len(),
            best_index,
            best_params,
            best_score,
            best_spec,
            candidates: results,
            best_model,
        })
    }
}

/// Per-fold scores of one spec under stratified k-fold cross-validation.
pub fn cross_val_score(
    spec: &ModelSpec,
    data: &Dataset,
    scoring: Scoring,
    folds: usize,
    shuffle_seed: Option<u64>,
) -> Result<Vec<f64>, TuneError> {
    let folds = stratified_k_fold(data.labels(), folds, shuffle_seed)?;
    let per_fold = evaluate_folds(&[spec], data, &folds, scoring, WorkerCount::All);
    per_fold
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(fold, result)| {
            result
                .map(|(score, _)| score)
                .map_err(|message| TuneError::Fold { fold, message })
        })
        .collect()
}

type FoldResult = Result<(f64, Vec<FitWarning>), String>;

/// Fit and score every (spec, fold) pair on the pool; grouped per spec in fold order.
fn evaluate_folds(
    specs: &[&ModelSpec],
    data: &Dataset,
    folds: &[Fold],
    scoring: Scoring,
    workers: WorkerCount,
) -> Vec<Vec<FoldResult>> {
    let tasks: Vec<(usize, usize)> = (0..specs.len())
        .flat_map(|spec_idx| (0..folds.len()).map(move |fold_idx| (spec_idx, fold_idx)))
        .collect();
    let worker_count = workers.resolve(tasks.len());
    debug!("Running {} fits on {worker_count} workers", tasks.len());

    let outcomes = pool::run_tasks(tasks, worker_count, |(spec_idx, fold_idx)| {
        let result = fit_and_score(specs[spec_idx], data, &folds[fold_idx], scoring);
        match &result {
            Ok((score, _)) => debug!("Candidate {spec_idx} fold {fold_idx}: {score:.4}"),
            Err(err) => debug!("Candidate {spec_idx} fold {fold_idx} failed: {err}"),
        }
        result.map_err(|err| err.to_string())
    });

    let mut grouped: Vec<Vec<FoldResult>> = Vec::with_capacity(specs.len());
    let mut outcomes = outcomes.into_iter();
    for _ in 0..specs.len() {
        grouped.push(
            outcomes
                .by_ref()
                .take(folds.len())
                .map(|outcome| outcome.and_then(|inner| inner))
                .collect(),
        );
    }
    grouped
}

fn fit_and_score(
    spec: &ModelSpec,
    data: &Dataset,
    fold: &Fold,
    scoring: Scoring,
) -> Result<(f64, Vec<FitWarning>), ModelError> {
    let train = data.subset(&fold.train);
    let validation = data.subset(&fold.validation);
    let fitted = spec.fit_dataset(&train)?;
    let proba = fitted.model.predict_proba(validation.records())?.to_vec();
    let score = scoring.score(validation.labels(), &proba)?;
    if !score.is_finite() {
        return Err(ModelError::Numerical(format!("{scoring} score is {score}")));
    }
    Ok((score, fitted.warnings))
}

fn summarize_candidate(index: usize, params: ParamSet, folds: Vec<FoldResult>) -> CandidateResult {
    let mut fold_scores = Vec::with_capacity(folds.len());
    let mut warnings = Vec::new();
    let mut error = None;
    for (fold, outcome) in folds.into_iter().enumerate() {
        match outcome {
            Ok((score, fold_warnings)) => {
                fold_scores.push(score);
                warnings.extend(fold_warnings);
            }
            Err(err) => {
                if error.is_none() {
                    error = Some(format!("fold {fold}: {err}"));
                }
            }
        }
    }
    let (mean_score, std_score) = if error.is_none() && !fold_scores.is_empty() {
        let n = fold_scores.len() as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        (Some(mean), Some(var.sqrt()))
    } else {
        (None, None)
    };
    CandidateResult {
        index,
        params,
        fold_scores,
        mean_score,
        std_score,
        rank: None,
        error,
        warnings,
    }
}

fn assign_ranks(results: &mut [CandidateResult]) {
    let means: Vec<f64> = results
        .iter()
        .filter(|r| r.is_viable())
        .filter_map(|r| r.mean_score)
        .collect();
    for result in results.iter_mut() {
        if let (None, Some(mean)) = (&result.error, result.mean_score) {
            result.rank = Some(1 + means.iter().filter(|&&other| other > mean).count());
        }
    }
}

/// Search space used when the configuration names no grid.
pub fn default_grid(kind: ModelKind) -> ParamGrid {
    match kind {
        ModelKind::LogisticRegression => {
            ParamGrid::new().with("c", [0.01, 0.1, 1.0, 10.0, 100.0])
        }
        ModelKind::RandomForest => ParamGrid::new()
            .with("n_estimators", [100i64, 200, 300])
            .with(
                "max_depth",
                [ParamValue::from("none"), ParamValue::Int(10), ParamValue::Int(20)],
            )
            .with("min_samples_leaf", [1i64, 2, 4])
            .with("min_samples_split", [2i64, 5, 10]),
        ModelKind::GradientBoosting => ParamGrid::new()
            .with("n_estimators", [100i64, 200])
            .with("max_depth", [3i64, 5, 7])
            .with("learning_rate", [0.01, 0.1, 0.2])
            .with("subsample", [0.8, 1.0]),
    }
}
