//! Bagged regression trees.
//!
//! Each tree is a CART regressor grown on a bootstrap resample, splitting on the
//! threshold that most reduces squared error. The ensemble prediction is the
//! mean of the tree outputs. Trees are stored as flat node arrays so the whole
//! forest serializes as plain data.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>, // root at 0
}

impl RegressionTree {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Longest root-to-leaf path, in splits. Children always sit after their parent
    /// in `nodes`, so one forward pass is enough.
    pub fn depth(&self) -> usize {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            deepest = deepest.max(depth[i]);
            if let Node::Split { left, right, .. } = node {
                let child_depth = depth[i] + 1;
                for c in [*left, *right] {
                    if let Some(d) = depth.get_mut(c) {
                        *d = (*d).max(child_depth);
                    }
                }
            }
        }
        deepest
    }

    /// Structural check for trees that came from outside the process. Children must
    /// point strictly forward and every node except the root needs exactly one parent,
    /// so the nodes form a proper tree no deeper than `max_depth`.
    fn check(&self, n_features: usize, max_depth: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        let mut parents = vec![0usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {i}: non-finite leaf value"));
                }
                Node::Split { feature, left, right, threshold } => {
                    if *feature >= n_features {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: non-finite threshold"));
                    }
                    for c in [*left, *right] {
                        if c <= i || c >= self.nodes.len() {
                            return Err(format!("node {i}: bad child index {c}"));
                        }
                        parents[c] += 1;
                    }
                }
                _ => {}
            }
        }
        if let Some(i) = parents.iter().skip(1).position(|&p| p != 1) {
            return Err(format!("node {}: has {} parents", i + 1, parents[i + 1]));
        }
        let depth = self.depth();
        if depth > max_depth {
            return Err(format!("depth {depth} exceeds max_depth {max_depth}"));
        }
        Ok(())
    }
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: ForestParams,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<'a> Grower<'a> {
    fn grow(&mut self, idx: &mut [usize], depth: usize) -> usize {
        let at = self.nodes.len();
        let n = idx.len() as f64;
        let mean = idx.iter().map(|&i| self.y[i]).sum::<f64>() / n;
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.params.max_depth || idx.len() < self.params.min_samples_split.max(2) {
            return at;
        }
        let Some(best) = self.best_split(idx) else {
            return at;
        };

        let (f, t) = (best.feature, best.threshold);
        idx.sort_unstable_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
        let cut = idx.partition_point(|&i| self.x[i][f] <= t);
        let (l, r) = idx.split_at_mut(cut);

        self.importance[f] += best.gain;
        let left = self.grow(l, depth + 1);
        let right = self.grow(r, depth + 1);
        self.nodes[at] = Node::Split { feature: f, threshold: t, left, right };
        at
    }

    fn best_split(&self, idx: &[usize]) -> Option<BestSplit> {
        let n = idx.len();
        let total: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = idx.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total * total / n as f64;
        if parent_sse <= f64::EPSILON {
            return None;
        }

        let n_features = self.x[idx[0]].len();
        let mut order = idx.to_vec();
        let mut best: Option<BestSplit> = None;

        for f in 0..n_features {
            order.sort_unstable_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += self.y[order[k]];
                let (lo, hi) = (self.x[order[k]][f], self.x[order[k + 1]][f]);
                if lo == hi {
                    continue;
                }
                let nl = (k + 1) as f64;
                let nr = (n - k - 1) as f64;
                let right_sum = total - left_sum;
                // SSE reduction, up to the constant total_sq term.
                let gain = left_sum * left_sum / nl + right_sum * right_sum / nr - total * total / n as f64;
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { feature: f, threshold: (lo + hi) / 2.0, gain });
                }
            }
        }
        best.filter(|b| b.gain > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Fits `params.n_trees` trees, each on a bootstrap resample drawn from `rng`.
    /// `x` must be non-empty, rectangular, and as long as `y`.
    pub fn fit<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[f64],
        params: ForestParams,
        rng: &mut R,
    ) -> Result<Self, String> {
        if x.is_empty() || x.len() != y.len() {
            return Err(format!("need matching non-empty inputs, got {} rows and {} targets", x.len(), y.len()));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
            return Err("feature rows must share a non-zero width".into());
        }
        if params.n_trees == 0 || params.max_depth == 0 {
            return Err("n_trees and max_depth must be positive".into());
        }

        let n = x.len();
        let mut trees = Vec::with_capacity(params.n_trees);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_trees {
            let mut idx: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut g = Grower { x, y, params, nodes: Vec::new(), importance: vec![0.0; n_features] };
            g.grow(&mut idx, 0);

            let sum: f64 = g.importance.iter().sum();
            if sum > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&g.importance) {
                    *acc += v / sum;
                }
            }
            trees.push(RegressionTree { nodes: g.nodes });
        }

        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            importances.iter_mut().for_each(|v| *v /= sum);
        }

        Ok(Self { params, n_features, trees, importances })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }

    /// Normalized impurity-decrease importance per feature column.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Mean of the tree outputs. `x.len()` must equal `n_features()`.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    pub fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        if self.importances.len() != self.n_features {
            return Err("importance table does not match feature count".into());
        }
        for (i, t) in self.trees.iter().enumerate() {
            t.check(self.n_features, self.params.max_depth).map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn params(n_trees: usize, max_depth: usize) -> ForestParams {
        ForestParams { n_trees, max_depth, min_samples_split: 2 }
    }

    #[test]
    fn learns_a_step_function() {
        let x: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = (0..200).map(|i| if i < 100 { 5.0 } else { 20.0 }).collect();
        let f = RandomForest::fit(&x, &y, params(20, 4), &mut StdRng::seed_from_u64(1)).unwrap();

        assert!((f.predict(&[10.0, 3.0]) - 5.0).abs() < 1.0);
        assert!((f.predict(&[180.0, 3.0]) - 20.0).abs() < 1.0);
        // The step lives entirely in column 0.
        assert!(f.feature_importances()[0] > 0.9);
    }

    #[test]
    fn depth_is_bounded() {
        let x: Vec<Vec<f64>> = (0..300).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..300).map(|i| ((i * 37) % 101) as f64).collect();
        let f = RandomForest::fit(&x, &y, params(5, 3), &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(f.max_tree_depth() <= 3);
        assert_eq!(f.n_trees(), 5);
    }

    #[test]
    fn constant_target_gives_single_leaf() {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, 1.0]).collect();
        let y = vec![7.5; 50];
        let f = RandomForest::fit(&x, &y, params(3, 8), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(f.max_tree_depth(), 0);
        assert_eq!(f.predict(&[3.0, 1.0]), 7.5);
        assert!(f.feature_importances().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn same_seed_same_forest() {
        let x: Vec<Vec<f64>> = (0..120).map(|i| vec![(i % 13) as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = (0..120).map(|i| (i % 13) as f64 * 0.5 + (i % 5) as f64).collect();
        let a = RandomForest::fit(&x, &y, params(10, 5), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = RandomForest::fit(&x, &y, params(10, 5), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_ragged_or_empty_input() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(RandomForest::fit(&[], &[], params(1, 1), &mut rng).is_err());
        let x = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(RandomForest::fit(&x, &[1.0, 2.0], params(1, 1), &mut rng).is_err());
    }

    #[test]
    fn check_catches_bad_child_index() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let mut f = RandomForest::fit(&x, &y, params(1, 2), &mut StdRng::seed_from_u64(4)).unwrap();
        f.check().unwrap();
        f.trees[0].nodes[0] = Node::Split { feature: 0, threshold: 1.0, left: 0, right: 99 };
        assert!(f.check().is_err());
    }

    fn chain_with_shared_children(len: usize) -> RegressionTree {
        let mut nodes: Vec<Node> = (0..len - 1)
            .map(|i| Node::Split { feature: 0, threshold: i as f64, left: i + 1, right: i + 1 })
            .collect();
        nodes.push(Node::Leaf { value: 4.0 });
        RegressionTree { nodes }
    }

    #[test]
    fn check_rejects_shared_children() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let mut f = RandomForest::fit(&x, &y, params(1, 64), &mut StdRng::seed_from_u64(4)).unwrap();
        f.trees[0] = chain_with_shared_children(26);
        let err = f.check().unwrap_err();
        assert!(err.contains("parents"), "{err}");
    }

    #[test]
    fn depth_is_linear_on_shared_children() {
        // Would take exponential time with a recursive walk.
        let t = chain_with_shared_children(200);
        assert_eq!(t.depth(), 199);
    }

    #[test]
    fn check_rejects_tree_deeper_than_max_depth() {
        let x: Vec<Vec<f64>> = (0..300).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..300).map(|i| ((i * 37) % 101) as f64).collect();
        let mut f = RandomForest::fit(&x, &y, params(2, 6), &mut StdRng::seed_from_u64(5)).unwrap();
        f.check().unwrap();
        assert!(f.max_tree_depth() > 3);
        f.params.max_depth = 3;
        let err = f.check().unwrap_err();
        assert!(err.contains("exceeds max_depth"), "{err}");
    }
}
