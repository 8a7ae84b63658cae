// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! CART regression tree over sparse, non-negative features
//!
//! Splits minimize the squared error of the targets. For 0/1 targets this is
//! the Gini criterion, so the same tree serves the random forest (leaf = class
//! frequency) and gradient boosting (leaf = Newton step on residuals).

use crate::features::{FeatureMatrix, SparseVector};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Minimum impurity decrease for a split to be kept
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines every feature present
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: Some(32),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a, F> {
    x: &'a FeatureMatrix,
    targets: &'a [f64],
    params: &'a TreeParams,
    leaf_value: F,
    rng: &'a mut ChaCha8Rng,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `samples` (duplicates allowed).
    ///
    /// `leaf_value` maps the samples reaching a leaf to its output.
    pub fn fit<F>(
        x: &FeatureMatrix,
        targets: &[f64],
        samples: &[usize],
        params: &TreeParams,
        leaf_value: F,
        rng: &mut ChaCha8Rng,
    ) -> Self
    where
        F: Fn(&[usize]) -> f64,
    {
        let mut builder = Builder {
            x,
            targets,
            params,
            leaf_value,
            rng,
            nodes: Vec::new(),
        };
        builder.build(samples, 0);
        Self { nodes: builder.nodes }
    }

    pub fn predict(&self, x: &SparseVector) -> f64 {
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
                    idx = if x.get(*feature) <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

impl<F> Builder<'_, F>
where
    F: Fn(&[usize]) -> f64,
{
    fn build(&mut self, samples: &[usize], depth: usize) -> usize {
        let can_split = samples.len() >= self.params.min_samples_split.max(2)
            && self.params.max_depth.map_or(true, |max| depth < max);

        if can_split {
            if let Some(split) = self.best_split(samples) {
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&i| self.x.rows[i].get(split.feature) <= split.threshold);

                let id = self.nodes.len();
                self.nodes.push(Node::Leaf { value: 0.0 });
                let left_id = self.build(&left, depth + 1);
                let right_id = self.build(&right, depth + 1);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: left_id,
                    right: right_id,
                };
                return id;
            }
        }

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: (self.leaf_value)(samples),
        });
        id
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<Split> {
        let n = samples.len();
        let total: f64 = samples.iter().map(|&i| self.targets[i]).sum();
        let first = self.targets[samples[0]];
        if samples.iter().all(|&i| self.targets[i] == first) {
            return None;
        }

        let present: Vec<usize> = samples
            .iter()
            .flat_map(|&i| self.x.rows[i].entries.iter().map(|(f, _)| *f))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut candidates: Vec<usize> = match self.params.max_features {
            Some(k) if k < present.len() => present.choose_multiple(&mut *self.rng, k).copied().collect(),
            _ => present,
        };
        candidates.sort_unstable();

        let mut buckets: HashMap<usize, Vec<(f64, f64)>> =
            candidates.iter().map(|&f| (f, Vec::new())).collect();
        for &i in samples {
            for (f, v) in &self.x.rows[i].entries {
                if let Some(bucket) = buckets.get_mut(f) {
                    bucket.push((*v, self.targets[i]));
                }
            }
        }

        let parent_score = total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;

        let mut consider = |feature: usize, threshold: f64, n_left: usize, sum_left: f64| {
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                return;
            }
            let sum_right = total - sum_left;
            let gain = sum_left * sum_left / n_left as f64 + sum_right * sum_right / n_right as f64
                - parent_score;
            if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain + MIN_GAIN) {
                best = Some(Split {
                    feature,
                    threshold,
                    gain,
                });
            }
        };

        for feature in candidates {
            let Some(mut values) = buckets.remove(&feature) else {
                continue;
            };
            values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            // Rows without the feature sit at zero, left of every stored value.
            let mut n_left = n - values.len();
            let mut sum_left = total - values.iter().map(|(_, t)| t).sum::<f64>();
            if n_left > 0 {
                consider(feature, values[0].0 / 2.0, n_left, sum_left);
            }

            for k in 0..values.len() {
                n_left += 1;
                sum_left += values[k].1;
                if k + 1 < values.len() && values[k + 1].0 > values[k].0 {
                    consider(feature, (values[k].0 + values[k + 1].0) / 2.0, n_left, sum_left);
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn mean_leaf(targets: &[f64]) -> impl Fn(&[usize]) -> f64 + '_ {
        move |samples: &[usize]| samples.iter().map(|&i| targets[i]).sum::<f64>() / samples.len() as f64
    }

    #[test]
    fn test_single_split_separates_classes() {
        // feature 1 marks the positive rows
        let x = FeatureMatrix::new(
            vec![
                SparseVector::new(vec![(0, 0.3)]),
                SparseVector::new(vec![(0, 0.5), (1, 0.8)]),
                SparseVector::new(vec![(1, 0.4)]),
                SparseVector::new(vec![(0, 0.9)]),
            ],
            2,
        );
        let targets = [0.0, 1.0, 1.0, 0.0];
        let samples: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::fit(&x, &targets, &samples, &TreeParams::default(), mean_leaf(&targets), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        for (row, target) in x.rows.iter().zip(targets) {
            assert_eq!(tree.predict(row), target);
        }
        // unseen row without feature 1
        assert_eq!(tree.predict(&SparseVector::default()), 0.0);
    }

    #[test]
    fn test_max_depth_zero_gives_single_leaf() {
        let x = FeatureMatrix::new(
            vec![SparseVector::new(vec![(0, 1.0)]), SparseVector::default()],
            1,
        );
        let targets = [1.0, 0.0];
        let params = TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::fit(&x, &targets, &[0, 1], &params, mean_leaf(&targets), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&x.rows[0]), 0.5);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_children() {
        let x = FeatureMatrix::new(
            vec![
                SparseVector::new(vec![(0, 1.0)]),
                SparseVector::default(),
                SparseVector::default(),
            ],
            1,
        );
        let targets = [1.0, 0.0, 0.0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let tree = RegressionTree::fit(&x, &targets, &[0, 1, 2], &params, mean_leaf(&targets), &mut rng);
        assert_eq!(tree.node_count(), 1);
    }
}
