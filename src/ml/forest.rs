//! Random forest of bootstrap-sampled CART trees.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::params::{MaxFeatures, ParamValue};
use super::tree::{DecisionTree, TreeParams};
use super::{Classifier, ModelError, invalid_param};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(invalid_param("n_estimators", "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(invalid_param("max_depth", "must be at least 1 or none"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid_param("min_samples_split", "must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid_param("min_samples_leaf", "must be at least 1"));
        }
        Ok(())
    }

    /// Returns `Ok(false)` when `name` is not a forest parameter.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<bool, ModelError> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "max_features" => self.max_features = MaxFeatures::try_from(value.clone())?,
            "bootstrap" => self.bootstrap = value.as_bool(name)?,
            "seed" | "random_state" => self.seed = value.as_u64(name)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl Classifier for ForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean of the trees' leaf probabilities.
    fn probability(&self, row: ArrayView1<'_, f32>) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        sum / self.trees.len() as f64
    }
}

/// Grow `n_estimators` trees, each from its own seed drawn off the forest seed.
pub fn train_forest(
    x: ArrayView2<'_, f32>,
    y: &[u8],
    params: &ForestParams,
) -> Result<ForestModel, ModelError> {
    let n = x.nrows();
    if n == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    let tree_params = TreeParams {
        max_depth: params.max_depth,
        min_samples_split: params.min_samples_split,
        min_samples_leaf: params.min_samples_leaf,
        max_features: params.max_features.resolve(x.ncols()),
    };
    let mut seeds = StdRng::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.n_estimators);
    for _ in 0..params.n_estimators {
        let mut rng = StdRng::seed_from_u64(seeds.random::<u64>());
        let rows: Vec<usize> = if params.bootstrap {
            (0..n).map(|_| rng.random_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        trees.push(DecisionTree::fit(x, y, rows, &tree_params, &mut rng));
    }
    tracing::debug!(
        "Grew {} trees (max_features {}, mean depth {:.1})",
        trees.len(),
        tree_params.max_features,
        trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64
    );
    Ok(ForestModel {
        n_features: x.ncols(),
        trees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn noisy_threshold_data() -> (Array2<f32>, Vec<u8>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f32,
            1 => ((i * 7) % 11) as f32,
            _ => ((i * 13) % 5) as f32,
        });
        let y = (0..n).map(|i| u8::from(i >= 30 || i % 10 == 0)).collect();
        (x, y)
    }

    #[test]
    fn same_seed_gives_identical_forests() {
        let (x, y) = noisy_threshold_data();
        let params = ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        };
        let a = train_forest(x.view(), &y, &params).unwrap();
        let b = train_forest(x.view(), &y, &params).unwrap();
        assert_eq!(a, b);
        let c = train_forest(x.view(), &y, &ForestParams { seed: 7, ..params }).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn probabilities_follow_the_signal() {
        let (x, y) = noisy_threshold_data();
        let params = ForestParams {
            n_estimators: 25,
            max_features: MaxFeatures::All,
            ..ForestParams::default()
        };
        let model = train_forest(x.view(), &y, &params).unwrap();
        assert_eq!(model.trees.len(), 25);
        let low = model.probability(x.row(5));
        let high = model.probability(x.row(45));
        assert!(low < 0.5 && high > 0.5, "{low} {high}");
        for row in x.rows() {
            let p = model.probability(row);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn set_parses_forest_params() {
        let mut params = ForestParams::default();
        assert!(params.set("max_depth", &ParamValue::from("none")).unwrap());
        assert!(params.set("max_features", &ParamValue::from("log2")).unwrap());
        assert!(!params.set("learning_rate", &ParamValue::Float(0.1)).unwrap());
        assert_eq!(params.max_features, MaxFeatures::Log2);
        params.min_samples_split = 1;
        assert!(params.validate().is_err());
    }
}
