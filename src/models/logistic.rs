// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use super::{binary_targets, sigmoid, Classifier};
use crate::datasets::Label;
use crate::features::{FeatureMatrix, SparseVector};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression trained with full-batch gradient descent.
///
/// Minimizes `mean(log_loss) + ||w||^2 / (2 * C * n)`, the same objective as
/// `C * sum(log_loss) + ||w||^2 / 2` scaled by `1 / (C * n)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Step size; rows are L2-normalized so 2.0 stays below 2/L
    pub learning_rate: f64,
    /// Stop when the largest gradient component drops below this
    pub tol: f64,
    weights: Vec<f64>,
    bias: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 500,
            learning_rate: 2.0,
            tol: 1e-5,
            weights: Vec::new(),
            bias: 0.0,
        }
    }
}

impl LogisticRegression {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) {
        self.weights = vec![0.0; x.n_features];
        self.bias = 0.0;
        if x.is_empty() {
            return;
        }

        let targets = binary_targets(y);
        let n = x.len() as f64;
        let l2 = 1.0 / (self.c * n);
        let mut grad = vec![0.0; x.n_features];

        for iter in 0..self.max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (row, target) in x.rows.iter().zip(&targets) {
                let err = sigmoid(row.dot(&self.weights) + self.bias) - target;
                for (idx, value) in &row.entries {
                    grad[*idx] += err * value;
                }
                grad_bias += err;
            }

            let mut max_grad = (grad_bias / n).abs();
            for (g, w) in grad.iter_mut().zip(&self.weights) {
                *g = *g / n + l2 * w;
                max_grad = max_grad.max(g.abs());
            }

            for (w, g) in self.weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * g;
            }
            self.bias -= self.learning_rate * grad_bias / n;

            if max_grad < self.tol {
                tracing::debug!("Logistic regression converged after {} iterations", iter + 1);
                break;
            }
        }
    }

    fn predict_proba(&self, x: &SparseVector) -> f64 {
        sigmoid(x.dot(&self.weights) + self.bias)
    }

    fn name(&self) -> &str {
        "Logistic Regression"
    }

    fn description(&self) -> &str {
        "L2-regularized logistic regression on TF-IDF features"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::synthetic_features;

    #[test]
    fn test_weights_follow_class_vocabulary() {
        let (vectorizer, x, y) = synthetic_features(100, 1);
        let mut model = LogisticRegression::default();
        model.fit(&x, &y);

        assert_eq!(model.weights().len(), vectorizer.vocabulary_size());
        let weight_of = |term: &str| {
            (0..vectorizer.vocabulary_size())
                .find(|&i| vectorizer.term(i) == Some(term))
                .map(|i| model.weights()[i])
                .unwrap()
        };
        assert!(weight_of("hoax") > 0.0);
        assert!(weight_of("senate") < 0.0);
    }

    #[test]
    fn test_empty_training_set_predicts_half() {
        let mut model = LogisticRegression::default();
        model.fit(&FeatureMatrix::new(Vec::new(), 3), &[]);
        assert_eq!(model.predict_proba(&SparseVector::default()), 0.5);
    }
}
