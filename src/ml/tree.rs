//! CART classification trees with Gini impurity, the building block of the random forest.

use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn (without replacement) for every split search.
    pub max_features: usize,
}

/// Arena node; children are indices into [`DecisionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Fraction of bad-credit training rows that reached the leaf.
    Leaf { value: f64 },
    /// Rows with `feature <= threshold` go left.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on `rows` of `x`. Repeated row indices act as sample weights.
    pub fn fit<R: Rng>(
        x: ArrayView2<'_, f32>,
        y: &[u8],
        rows: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = TreeBuilder {
            x: x.reborrow(),
            y,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.build(rows, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Leaf probability for a row.
    pub fn predict(&self, row: ArrayView1<'_, f32>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }
}

struct TreeBuilder<'a, R> {
    x: ArrayView2<'a, f32>,
    y: &'a [u8],
    params: &'a TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

struct SplitChoice {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

impl<R: Rng> TreeBuilder<'_, R> {
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let positives = rows.iter().filter(|&&row| self.y[row] == 1).count();
        let value = positives as f64 / rows.len().max(1) as f64;
        self.nodes.push(Node::Leaf { value });

        let depth_left = self.params.max_depth.is_none_or(|max| depth < max);
        let pure = positives == 0 || positives == rows.len();
        if !depth_left || pure || rows.len() < self.params.min_samples_split {
            return idx;
        }
        let Some(split) = self.best_split(&rows, gini(positives, rows.len())) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| self.x[[row, split.feature]] <= split.threshold);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, rows: &[usize], parent_impurity: f64) -> Option<SplitChoice> {
        let n_features = self.x.ncols();
        if n_features == 0 {
            return None;
        }
        let k = self.params.max_features.clamp(1, n_features);
        let candidates = index::sample(&mut *self.rng, n_features, k).into_vec();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = rows.len();
        let total_pos = rows.iter().filter(|&&row| self.y[row] == 1).count();

        let mut best: Option<SplitChoice> = None;
        let mut sorted: Vec<(f32, u8)> = Vec::with_capacity(n);
        for feature in candidates {
            sorted.clear();
            sorted.extend(rows.iter().map(|&row| (self.x[[row, feature]], self.y[row])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for i in 1..n {
                left_pos += usize::from(sorted[i - 1].1);
                let (lo, hi) = (sorted[i - 1].0, sorted[i].0);
                if lo == hi || i < min_leaf || n - i < min_leaf {
                    continue;
                }
                let right_pos = total_pos - left_pos;
                let impurity = (i as f64 * gini(left_pos, i)
                    + (n - i) as f64 * gini(right_pos, n - i))
                    / n as f64;
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    best = Some(SplitChoice {
                        feature,
                        threshold: midpoint(lo, hi),
                        impurity,
                    });
                }
            }
        }
        best.filter(|split| split.impurity < parent_impurity - 1e-12)
    }
}

/// Binary Gini impurity `2p(1-p)`.
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Threshold between two distinct sorted values that keeps `lo` on the left.
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi { lo } else { mid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(max_depth: Option<usize>) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn separable_data_gives_pure_leaves() {
        let x = array![[0.0f32, 9.0], [1.0, 3.0], [2.0, 7.0], [3.0, 1.0]];
        let y = [0, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(x.view(), &y, (0..4).collect(), &params(None), &mut rng);
        for (row, &label) in x.rows().into_iter().zip(&y) {
            assert_eq!(tree.predict(row), f64::from(label));
        }
        assert_eq!(tree.depth(), 1);
        assert!(matches!(
            tree.nodes[0],
            Node::Split { feature: 0, threshold, .. } if threshold == 1.5
        ));
    }

    #[test]
    fn depth_limit_yields_probability_leaves() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [0, 1, 0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let stump = DecisionTree::fit(x.view(), &y, (0..6).collect(), &params(Some(0)), &mut rng);
        assert_eq!(stump.nodes.len(), 1);
        assert!((stump.predict(x.row(0)) - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0], [4.0]];
        let y = [1, 0, 0, 0, 0];
        let mut rng = StdRng::seed_from_u64(1);
        let p = TreeParams {
            min_samples_leaf: 2,
            ..params(None)
        };
        let tree = DecisionTree::fit(x.view(), &y, (0..5).collect(), &p, &mut rng);
        assert!(tree.predict(x.row(0)) < 1.0);
    }

    #[test]
    fn constant_features_make_a_leaf() {
        let x = array![[1.0f32], [1.0], [1.0]];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(x.view(), &[0, 1, 1], vec![0, 1, 2], &params(None), &mut rng);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn featureless_rows_make_a_leaf() {
        let x = Array2::<f32>::zeros((4, 0));
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(x.view(), &[0, 1, 0, 1], (0..4).collect(), &params(None), &mut rng);
        assert_eq!(tree.nodes, vec![Node::Leaf { value: 0.5 }]);
    }

    #[test]
    fn params_may_be_shorter_lived_than_the_data() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0]];
        let y = vec![0u8, 0, 1, 1];
        let tree = {
            let local = params(None);
            let mut rng = StdRng::seed_from_u64(3);
            DecisionTree::fit(x.view(), &y, (0..4).collect(), &local, &mut rng)
        };
        assert_eq!(tree.predict(x.row(0)), 0.0);
        assert_eq!(tree.predict(x.row(3)), 1.0);
    }

    #[test]
    fn midpoint_stays_between_values() {
        assert_eq!(midpoint(1.0, 2.0), 1.5);
        let lo = 1.0f32;
        let hi = f32::from_bits(lo.to_bits() + 1);
        assert_eq!(midpoint(lo, hi), lo);
    }
}
