//! L2-regularized binary logistic regression.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::params::ParamValue;
use super::{Classifier, ModelError, invalid_param, sigmoid};

mod train;
pub use train::train_logreg;

/// Hyperparameters for [`train_logreg`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRegParams {
    /// Inverse regularization strength; smaller values shrink coefficients harder.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the largest per-sample gradient component drops below this.
    pub tol: f64,
    pub fit_intercept: bool,
    /// Center and scale features internally before fitting.
    pub standardize: bool,
}

impl Default for LogRegParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-6,
            fit_intercept: true,
            standardize: true,
        }
    }
}

impl LogRegParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(invalid_param("c", format!("must be > 0, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(invalid_param("max_iter", "must be at least 1"));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(invalid_param("tol", format!("must be > 0, got {}", self.tol)));
        }
        Ok(())
    }

    /// Returns `Ok(false)` when `name` is not a logistic regression parameter.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<bool, ModelError> {
        match name {
            "c" | "C" => self.c = value.as_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            "standardize" => self.standardize = value.as_bool(name)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Fitted logistic regression.
///
/// Coefficients live in the standardized feature space described by
/// `means` and `scales`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRegModel {
    pub n_features: usize,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl LogRegModel {
    /// Linear score before the sigmoid.
    pub fn decision_function(&self, row: ArrayView1<'_, f32>) -> f64 {
        let mut z = self.intercept;
        for (j, &value) in row.iter().enumerate() {
            z += self.coefficients[j] * (f64::from(value) - self.means[j]) / self.scales[j];
        }
        z
    }
}

impl Classifier for LogRegModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn probability(&self, row: ArrayView1<'_, f32>) -> f64 {
        sigmoid(self.decision_function(row))
    }
}
