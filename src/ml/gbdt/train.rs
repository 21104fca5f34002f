use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::GbdtParams;
use super::model::{GbdtModel, RegressionNode, RegressionTree};
use crate::ml::{ModelError, sigmoid};

const MIN_HESSIAN: f64 = 1e-16;

/// Train a boosted ensemble with the binary logistic objective.
pub fn train_gbdt(
    x: ArrayView2<'_, f32>,
    y: &[u8],
    params: &GbdtParams,
) -> Result<GbdtModel, ModelError> {
    let n = x.nrows();
    let d = x.ncols();
    if n == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }

    let (mins, maxs) = compute_feature_min_max(x);
    let edges = bin_edges(&mins, &maxs, params.max_bin);
    let binned = bin_features(x, &edges);

    let prior = class_prior(y);
    let base_score = (prior / (1.0 - prior)).ln();
    let mut margin = vec![base_score; n];
    let mut grad = vec![0.0f64; n];
    let mut hess = vec![0.0f64; n];

    let mut rng = StdRng::seed_from_u64(params.seed);
    let n_cols = ((params.colsample_bytree * d as f64).round() as usize).clamp(1, d.max(1));
    let mut trees = Vec::with_capacity(params.n_estimators);
    for _round in 0..params.n_estimators {
        for i in 0..n {
            let p = sigmoid(margin[i]);
            grad[i] = p - f64::from(y[i]);
            hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
        }

        let mut rows: Vec<usize> = if params.subsample < 1.0 {
            (0..n)
                .filter(|_| rng.random::<f64>() < params.subsample)
                .collect()
        } else {
            (0..n).collect()
        };
        if rows.is_empty() {
            rows = (0..n).collect();
        }
        let mut features: Vec<usize> = if n_cols < d {
            index::sample(&mut rng, d, n_cols).into_vec()
        } else {
            (0..d).collect()
        };
        features.sort_unstable();

        let grower = TreeGrower {
            binned: &binned,
            edges: &edges,
            grad: &grad,
            hess: &hess,
            features: &features,
            params,
        };
        let tree = grower.grow(rows);
        for (i, row) in x.rows().into_iter().enumerate() {
            margin[i] += tree.predict(row);
        }
        trees.push(tree);
    }

    tracing::debug!(
        "Boosted {} trees (base score {base_score:.4}, {} leaves total)",
        trees.len(),
        trees
            .iter()
            .map(|tree| tree
                .nodes
                .iter()
                .filter(|node| matches!(node, RegressionNode::Leaf { .. }))
                .count())
            .sum::<usize>()
    );
    Ok(GbdtModel {
        n_features: d,
        base_score,
        learning_rate: params.learning_rate,
        trees,
    })
}

fn class_prior(y: &[u8]) -> f64 {
    let positives = y.iter().filter(|&&label| label == 1).count();
    (positives as f64 / y.len().max(1) as f64).clamp(1e-6, 1.0 - 1e-6)
}

fn compute_feature_min_max(x: ArrayView2<'_, f32>) -> (Vec<f32>, Vec<f32>) {
    let feature_len = x.ncols();
    let mut mins = vec![f32::INFINITY; feature_len];
    let mut maxs = vec![f32::NEG_INFINITY; feature_len];
    for row in x.rows() {
        for (j, &v) in row.iter().enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for j in 0..feature_len {
        if !mins[j].is_finite() || !maxs[j].is_finite() {
            mins[j] = 0.0;
            maxs[j] = 0.0;
        }
        if mins[j] == maxs[j] {
            maxs[j] = mins[j] + 1.0;
        }
    }
    (mins, maxs)
}

/// Interior edges of `bins` uniform bins per feature; edge `b` closes bin `b`.
fn bin_edges(mins: &[f32], maxs: &[f32], bins: usize) -> Vec<Vec<f32>> {
    let bins = bins.clamp(2, 256);
    mins.iter()
        .zip(maxs)
        .map(|(&min, &max)| {
            (0..bins - 1)
                .map(|split_bin| threshold_for_bin(min, max, split_bin, bins))
                .collect()
        })
        .collect()
}

fn threshold_for_bin(min: f32, max: f32, split_bin: usize, bins: usize) -> f32 {
    let bins_f = bins as f32;
    let t = ((split_bin + 1) as f32) / bins_f;
    min + t * (max - min)
}

/// Bin index = number of edges at or below the value, so `bin <= b` exactly when
/// `value < edges[b]`.
fn bin_features(x: ArrayView2<'_, f32>, edges: &[Vec<f32>]) -> Array2<u8> {
    Array2::from_shape_fn(x.dim(), |(i, j)| {
        let v = x[[i, j]];
        edges[j].partition_point(|&edge| edge <= v) as u8
    })
}

struct TreeGrower<'a> {
    binned: &'a Array2<u8>,
    edges: &'a [Vec<f32>],
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a GbdtParams,
}

struct BestSplit {
    gain: f64,
    feature_index: usize,
    split_bin: usize,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: Vec<usize>) -> RegressionTree {
        let mut nodes = Vec::new();
        self.build(&mut nodes, rows, 0);
        RegressionTree { nodes }
    }

    fn build(&self, nodes: &mut Vec<RegressionNode>, rows: Vec<usize>, depth: usize) -> usize {
        let g_sum: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h_sum: f64 = rows.iter().map(|&r| self.hess[r]).sum();
        let idx = nodes.len();
        let weight = -g_sum / (h_sum + self.params.lambda) * self.params.learning_rate;
        nodes.push(RegressionNode::Leaf { weight });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(best) = self.best_split(&rows, g_sum, h_sum) else {
            return idx;
        };

        let feature = best.feature_index;
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| usize::from(self.binned[[r, feature]]) <= best.split_bin);
        let left = self.build(nodes, left_rows, depth + 1);
        let right = self.build(nodes, right_rows, depth + 1);
        nodes[idx] = RegressionNode::Split {
            feature,
            threshold: self.edges[feature][best.split_bin],
            gain: best.gain,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g_sum: f64, h_sum: f64) -> Option<BestSplit> {
        let lambda = self.params.lambda;
        let min_child_weight = self.params.min_child_weight;
        let parent_score = g_sum * g_sum / (h_sum + lambda);
        let bins = self.params.max_bin.clamp(2, 256);

        let mut best: Option<BestSplit> = None;
        let mut hist_g = vec![0.0f64; bins];
        let mut hist_h = vec![0.0f64; bins];
        let mut counts = vec![0usize; bins];
        for &feature_idx in self.features {
            hist_g.fill(0.0);
            hist_h.fill(0.0);
            counts.fill(0);
            for &r in rows {
                let b = usize::from(self.binned[[r, feature_idx]]);
                hist_g[b] += self.grad[r];
                hist_h[b] += self.hess[r];
                counts[b] += 1;
            }

            let (mut g_left, mut h_left, mut n_left) = (0.0f64, 0.0f64, 0usize);
            for split_bin in 0..(bins - 1) {
                g_left += hist_g[split_bin];
                h_left += hist_h[split_bin];
                n_left += counts[split_bin];
                let n_right = rows.len() - n_left;
                if counts[split_bin] == 0 || n_left == 0 || n_right == 0 {
                    continue;
                }
                let g_right = g_sum - g_left;
                let h_right = h_sum - h_left;
                if h_left < min_child_weight || h_right < min_child_weight {
                    continue;
                }
                let gain = g_left * g_left / (h_left + lambda)
                    + g_right * g_right / (h_right + lambda)
                    - parent_score
                    - self.params.gamma;
                if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                    best = Some(BestSplit {
                        gain,
                        feature_index: feature_idx,
                        split_bin,
                    });
                }
            }
        }
        best
    }
}
