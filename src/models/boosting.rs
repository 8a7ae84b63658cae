// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use super::tree::{RegressionTree, TreeParams};
use super::{binary_targets, sigmoid, Classifier};
use crate::datasets::Label;
use crate::features::{FeatureMatrix, SparseVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Clamp for the base rate used to initialize the log-odds
const BASE_RATE_EPS: f64 = 1e-6;

/// Gradient boosted regression trees on the logistic loss
///
/// Starts from the training log-odds and adds `learning_rate` times a
/// depth-limited tree per round. Leaves hold the Newton step
/// `sum(residual) / sum(p * (1 - p))`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub tree_params: TreeParams,
    seed: u64,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            tree_params: TreeParams {
                max_depth: Some(3),
                ..TreeParams::default()
            },
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    fn raw_score(&self, x: &SparseVector) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|tree| tree.predict(x)).sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) {
        self.trees.clear();
        let n = x.len();
        if n == 0 {
            self.init = 0.0;
            return;
        }

        let targets = binary_targets(y);
        let base_rate = (targets.iter().sum::<f64>() / n as f64).clamp(BASE_RATE_EPS, 1.0 - BASE_RATE_EPS);
        self.init = (base_rate / (1.0 - base_rate)).ln();

        let samples: Vec<usize> = (0..n).collect();
        let mut scores = vec![self.init; n];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        for _ in 0..self.n_estimators {
            let probs: Vec<f64> = scores.iter().map(|s| sigmoid(*s)).collect();
            let residuals: Vec<f64> = targets.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let newton_step = |leaf: &[usize]| {
                let num: f64 = leaf.iter().map(|&i| residuals[i]).sum();
                let den: f64 = leaf.iter().map(|&i| hessians[i]).sum();
                if den.abs() < 1e-12 {
                    0.0
                } else {
                    num / den
                }
            };
            let tree = RegressionTree::fit(x, &residuals, &samples, &self.tree_params, newton_step, &mut rng);

            for (score, row) in scores.iter_mut().zip(&x.rows) {
                *score += self.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        tracing::debug!("Gradient boosting fitted {} rounds", self.trees.len());
    }

    fn predict_proba(&self, x: &SparseVector) -> f64 {
        sigmoid(self.raw_score(x))
    }

    fn name(&self) -> &str {
        "Gradient Boosting"
    }

    fn description(&self) -> &str {
        "Boosted depth-3 regression trees on the logistic loss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_training_log_odds() {
        let x = FeatureMatrix::new(vec![SparseVector::default(); 4], 1);
        let y = [Label::Fake, Label::Fake, Label::Fake, Label::Real];
        let mut model = GradientBoosting::new(0).with_estimators(5);
        model.fit(&x, &y);

        // no feature can split, every tree is a single leaf
        assert!((model.init - 3.0f64.ln()).abs() < 1e-12);
        assert!(model.predict_proba(&SparseVector::default()) > 0.74);
    }

    #[test]
    fn test_boosting_reduces_training_loss() {
        let (_, x, y) = crate::models::test_support::synthetic_features(60, 4);
        let targets = binary_targets(&y);
        let log_loss = |model: &GradientBoosting| {
            x.rows
                .iter()
                .zip(&targets)
                .map(|(row, t)| {
                    let p = model.predict_proba(row).clamp(1e-12, 1.0 - 1e-12);
                    -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                })
                .sum::<f64>()
        };

        let mut short = GradientBoosting::new(0).with_estimators(2);
        let mut long = GradientBoosting::new(0).with_estimators(20);
        short.fit(&x, &y);
        long.fit(&x, &y);
        assert!(log_loss(&long) < log_loss(&short));
    }
}
