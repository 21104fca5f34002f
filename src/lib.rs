//! Library exports for the pipeline binaries, benchmarks and tests.
/// Application directory helpers.
pub mod app_dirs;
/// Experiment configuration.
pub mod config;
/// Credit dataset loading, splitting and export.
pub mod dataset;
/// Logging setup.
pub mod logging;
/// Classifiers, metrics and hyperparameter search.
pub mod ml;
/// Console tables and JSON experiment reports.
pub mod report;
