//! Grid search behaviour on synthetic credit data.

mod support;

use std::num::NonZeroUsize;

use creditlab::ml::forest::ForestParams;
use creditlab::ml::params::ParamSet;
use creditlab::ml::tuning::pool::WORKERS_ENV;
use creditlab::ml::tuning::{
    GridSearch, ParamGrid, Scoring, TuneError, WorkerCount, cross_val_score,
};
use creditlab::ml::{ModelError, ModelKind, ModelSpec};
use support::creditlab_env::CreditlabEnvGuard;

fn logreg() -> ModelSpec {
    ModelSpec::default_for(ModelKind::LogisticRegression)
}

#[test]
fn single_configuration_keeps_its_cross_validated_score() {
    let data = support::credit_rows(300, 7);
    let search = GridSearch::new(logreg(), ParamGrid::new().with("c", [0.5]));
    let outcome = search.run(&data).unwrap();

    let spec = logreg()
        .with_params(&ParamSet::new().with("c", 0.5))
        .unwrap();
    let scores = cross_val_score(&spec, &data, Scoring::RocAuc, 5, None).unwrap();
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].fold_scores, scores);
    assert!((outcome.best_score - mean).abs() < 1e-12);
    assert_eq!(outcome.best_spec, spec);
    assert_eq!(outcome.best_model.model.n_features(), data.n_features());
}

#[test]
fn ties_go_to_the_first_configuration() {
    let data = support::credit_rows(200, 11);
    let outcome = GridSearch::new(logreg(), ParamGrid::new().with("c", [2.0, 2.0]))
        .run(&data)
        .unwrap();
    assert_eq!(outcome.best_index, 0);
    assert_eq!(outcome.candidates[0].mean_score, outcome.candidates[1].mean_score);
    assert_eq!(outcome.candidates[0].rank, Some(1));
    assert_eq!(outcome.candidates[1].rank, Some(1));
}

#[test]
fn failing_configurations_are_excluded() {
    let data = support::credit_rows(200, 3);
    let outcome = GridSearch::new(logreg(), ParamGrid::new().with("c", [-1.0, 1.0]))
        .run(&data)
        .unwrap();
    assert_eq!(outcome.best_index, 1);
    let excluded: Vec<_> = outcome.excluded().collect();
    assert_eq!(excluded.len(), 1);
    assert_eq!(excluded[0].index, 0);
    assert!(excluded[0].rank.is_none());
    assert!(excluded[0].error.as_deref().unwrap().contains("c"));
    assert_eq!(outcome.ranked().len(), 1);
}

#[test]
fn all_failing_configurations_is_an_error() {
    let data = support::credit_rows(200, 3);
    let err = GridSearch::new(logreg(), ParamGrid::new().with("c", [-1.0, 0.0]))
        .run(&data)
        .unwrap_err();
    assert!(matches!(err, TuneError::NoViableCandidate { tried: 2, .. }), "{err}");
}

#[test]
fn unknown_parameter_fails_before_fitting() {
    let data = support::credit_rows(100, 3);
    let err = GridSearch::new(logreg(), ParamGrid::new().with("depth", [3i64]))
        .run(&data)
        .unwrap_err();
    assert!(matches!(
        err,
        TuneError::Model(ModelError::UnknownParam {
            kind: ModelKind::LogisticRegression,
            ..
        })
    ));
}

#[test]
fn worker_count_does_not_change_the_outcome() {
    let data = support::credit_rows(240, 5);
    let base = ModelSpec::RandomForest(ForestParams {
        n_estimators: 15,
        ..ForestParams::default()
    });
    let grid = ParamGrid::new()
        .with("max_depth", [3i64, 6])
        .with("min_samples_leaf", [1i64, 4]);
    let search = GridSearch::new(base, grid).folds(3);

    let serial = search
        .clone()
        .workers(WorkerCount::Fixed(NonZeroUsize::MIN))
        .run(&data)
        .unwrap();
    let parallel = search
        .workers(WorkerCount::Fixed(NonZeroUsize::new(4).unwrap()))
        .run(&data)
        .unwrap();

    assert_eq!(serial.best_index, parallel.best_index);
    let scores = |outcome: &creditlab::ml::tuning::GridSearchOutcome| {
        outcome
            .candidates
            .iter()
            .map(|c| c.fold_scores.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(scores(&serial), scores(&parallel));
}

#[test]
fn worker_env_overrides_all() {
    let _guard = CreditlabEnvGuard::set(WORKERS_ENV, "3");
    assert_eq!(WorkerCount::All.resolve(100), 3);
    assert_eq!(WorkerCount::All.resolve(2), 2);
}

#[test]
fn shuffled_folds_follow_the_seed() {
    let data = support::credit_rows(200, 9);
    let a = cross_val_score(&logreg(), &data, Scoring::Accuracy, 4, Some(1)).unwrap();
    let b = cross_val_score(&logreg(), &data, Scoring::Accuracy, 4, Some(1)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);
    assert!(a.iter().all(|score| (0.0..=1.0).contains(score)));
}
