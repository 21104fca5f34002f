use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::ml::{Classifier, sigmoid};

/// Arena node of a boosted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum RegressionNode {
    /// Margin contribution, already scaled by the learning rate.
    Leaf { weight: f64 },
    /// Rows with `feature < threshold` go left.
    Split {
        feature: usize,
        threshold: f32,
        gain: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    pub fn predict(&self, row: ArrayView1<'_, f32>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                RegressionNode::Leaf { weight } => return *weight,
                RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Boosted ensemble over a log-odds base score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub n_features: usize,
    /// Log-odds of the training prior.
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GbdtModel {
    /// Raw margin (log-odds) for a row.
    pub fn predict_margin(&self, row: ArrayView1<'_, f32>) -> f64 {
        self.base_score + self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }

    /// Total split gain per feature across all trees.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for tree in &self.trees {
            for node in &tree.nodes {
                if let RegressionNode::Split { feature, gain, .. } = node {
                    importance[*feature] += gain;
                }
            }
        }
        importance
    }
}

impl Classifier for GbdtModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn probability(&self, row: ArrayView1<'_, f32>) -> f64 {
        sigmoid(self.predict_margin(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn split_routes_strictly_below_threshold_left() {
        let tree = RegressionTree {
            nodes: vec![
                RegressionNode::Split {
                    feature: 0,
                    threshold: 0.5,
                    gain: 1.0,
                    left: 1,
                    right: 2,
                },
                RegressionNode::Leaf { weight: -1.0 },
                RegressionNode::Leaf { weight: 2.0 },
            ],
        };
        assert_eq!(tree.predict(array![0.0f32].view()), -1.0);
        assert_eq!(tree.predict(array![0.5f32].view()), 2.0);
        assert_eq!(tree.predict(array![0.6f32].view()), 2.0);
    }

    #[test]
    fn margin_sums_base_and_trees() {
        let leaf = |weight| RegressionTree {
            nodes: vec![RegressionNode::Leaf { weight }],
        };
        let model = GbdtModel {
            n_features: 1,
            base_score: 0.5,
            learning_rate: 0.3,
            trees: vec![leaf(0.25), leaf(-1.0)],
        };
        let row = array![3.0f32];
        assert_eq!(model.predict_margin(row.view()), -0.25);
        assert!((model.probability(row.view()) - sigmoid(-0.25)).abs() < 1e-15);
        assert_eq!(model.feature_importance(), vec![0.0]);
    }
}
