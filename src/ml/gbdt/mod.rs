//! XGBoost-style gradient-boosted trees for binary classification.
//!
//! Each round fits a depth-limited regression tree to the gradient and
//! hessian of the logistic loss:
//! - Split search runs over per-feature histograms of `max_bin` uniform bins.
//! - Leaf weights are the Newton step `-G / (H + lambda)`, shrunk by `learning_rate`.
//! - Rows and columns can be subsampled per tree from a seeded generator.

mod model;
mod train;

pub use model::{GbdtModel, RegressionNode, RegressionTree};
pub use train::train_gbdt;

use serde::{Deserialize, Serialize};

use super::params::ParamValue;
use super::{ModelError, invalid_param};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtParams {
    /// Boosting rounds.
    pub n_estimators: usize,
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum required in each child.
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights.
    #[serde(alias = "reg_lambda")]
    pub lambda: f64,
    /// Minimum gain required to keep a split.
    #[serde(alias = "min_split_loss")]
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub max_bin: usize,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bin: 64,
            seed: 42,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(invalid_param("n_estimators", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid_param(
                "learning_rate",
                format!("must be > 0, got {}", self.learning_rate),
            ));
        }
        if self.max_depth == 0 {
            return Err(invalid_param("max_depth", "must be at least 1"));
        }
        for (name, value) in [
            ("min_child_weight", self.min_child_weight),
            ("lambda", self.lambda),
            ("gamma", self.gamma),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid_param(name, format!("must be >= 0, got {value}")));
            }
        }
        for (name, value) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid_param(name, format!("must be in (0, 1], got {value}")));
            }
        }
        if !(2..=256).contains(&self.max_bin) {
            return Err(invalid_param(
                "max_bin",
                format!("must be in 2..=256, got {}", self.max_bin),
            ));
        }
        Ok(())
    }

    /// Returns `Ok(false)` when `name` is not a boosting parameter.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<bool, ModelError> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "learning_rate" | "eta" => self.learning_rate = value.as_f64(name)?,
            "max_depth" => self.max_depth = value.as_usize(name)?,
            "min_child_weight" => self.min_child_weight = value.as_f64(name)?,
            "lambda" | "reg_lambda" => self.lambda = value.as_f64(name)?,
            "gamma" | "min_split_loss" => self.gamma = value.as_f64(name)?,
            "subsample" => self.subsample = value.as_f64(name)?,
            "colsample_bytree" => self.colsample_bytree = value.as_f64(name)?,
            "max_bin" => self.max_bin = value.as_usize(name)?,
            "seed" | "random_state" => self.seed = value.as_u64(name)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_set_the_same_fields() {
        let mut params = GbdtParams::default();
        assert!(params.set("eta", &ParamValue::Float(0.05)).unwrap());
        assert!(params.set("reg_lambda", &ParamValue::Int(3)).unwrap());
        assert_eq!(params.learning_rate, 0.05);
        assert_eq!(params.lambda, 3.0);
        let parsed: GbdtParams = toml::from_str("eta = 0.2\nmax_depth = 3").unwrap();
        assert_eq!(parsed.learning_rate, 0.2);
        assert_eq!(parsed.max_depth, 3);
        assert_eq!(parsed.n_estimators, 100);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad = [
            GbdtParams {
                subsample: 0.0,
                ..GbdtParams::default()
            },
            GbdtParams {
                max_bin: 1,
                ..GbdtParams::default()
            },
            GbdtParams {
                learning_rate: -0.1,
                ..GbdtParams::default()
            },
            GbdtParams {
                lambda: f64::NAN,
                ..GbdtParams::default()
            },
        ];
        for params in bad {
            assert!(params.validate().is_err(), "{params:?}");
        }
        GbdtParams::default().validate().unwrap();
    }
}
