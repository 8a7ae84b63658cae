// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use super::tree::{RegressionTree, TreeParams};
use super::{binary_targets, Classifier};
use crate::datasets::Label;
use crate::features::{FeatureMatrix, SparseVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest of bootstrap CART trees
///
/// Each tree gets its own seed derived from the forest seed, so the fitted
/// forest does not depend on how rayon schedules the trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub tree_params: TreeParams,
    seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            tree_params: TreeParams::default(),
            seed,
            trees: Vec::new(),
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) {
        self.trees.clear();
        let n = x.len();
        if n == 0 {
            return;
        }

        let targets = binary_targets(y);
        let params = TreeParams {
            max_features: Some(
                self.tree_params
                    .max_features
                    .unwrap_or_else(|| (x.n_features as f64).sqrt().ceil() as usize)
                    .max(1),
            ),
            ..self.tree_params.clone()
        };
        let seed = self.seed;

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let leaf_mean = |samples: &[usize]| {
                    samples.iter().map(|&i| targets[i]).sum::<f64>() / samples.len() as f64
                };
                RegressionTree::fit(x, &targets, &bootstrap, &params, leaf_mean, &mut rng)
            })
            .collect();

        tracing::debug!("Random forest fitted {} trees", self.trees.len());
    }

    fn predict_proba(&self, x: &SparseVector) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().map(|tree| tree.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    fn name(&self) -> &str {
        "Random Forest"
    }

    fn description(&self) -> &str {
        "Bagged CART trees with sqrt(features) per split"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::synthetic_features;

    #[test]
    fn test_forest_is_reproducible() {
        let (_, x, y) = synthetic_features(80, 9);
        let mut a = RandomForest::new(3).with_estimators(10);
        let mut b = RandomForest::new(3).with_estimators(10);
        a.fit(&x, &y);
        b.fit(&x, &y);

        assert_eq!(a.tree_count(), 10);
        for row in &x.rows {
            assert_eq!(a.predict_proba(row), b.predict_proba(row));
        }
    }

    #[test]
    fn test_probabilities_are_vote_fractions() {
        let (_, x, y) = synthetic_features(40, 2);
        let mut forest = RandomForest::new(1).with_estimators(8);
        forest.fit(&x, &y);

        for row in &x.rows {
            let p = forest.predict_proba(row);
            assert!((0.0..=1.0).contains(&p));
        }
    }
}
