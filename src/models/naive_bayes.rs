// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use super::{binary_targets, Classifier};
use crate::datasets::Label;
use crate::features::{FeatureMatrix, SparseVector};
use serde::{Deserialize, Serialize};

/// Floor for class priors so an absent class stays finite
const MIN_PRIOR: f64 = 1e-12;

/// Multinomial naive Bayes over TF-IDF weights
///
/// Per-class term weights are summed over the training documents, smoothed
/// with `alpha`, and turned into log probabilities. Index 0 is the true
/// class, index 1 the fake class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialNaiveBayes {
    pub alpha: f64,
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

impl Default for MultinomialNaiveBayes {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            class_log_prior: [0.5f64.ln(), 0.5f64.ln()],
            feature_log_prob: [Vec::new(), Vec::new()],
        }
    }
}

impl MultinomialNaiveBayes {
    /// Joint log likelihood of each class
    fn joint_log_likelihood(&self, x: &SparseVector) -> [f64; 2] {
        let mut jll = self.class_log_prior;
        for (class, log_probs) in self.feature_log_prob.iter().enumerate() {
            jll[class] += x
                .entries
                .iter()
                .filter_map(|(idx, value)| log_probs.get(*idx).map(|lp| lp * value))
                .sum::<f64>();
        }
        jll
    }
}

impl Classifier for MultinomialNaiveBayes {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) {
        let targets = binary_targets(y);
        let mut feature_count = [vec![0.0; x.n_features], vec![0.0; x.n_features]];
        let mut class_count = [0usize; 2];

        for (row, target) in x.rows.iter().zip(&targets) {
            let class = *target as usize;
            class_count[class] += 1;
            for (idx, value) in &row.entries {
                feature_count[class][*idx] += value;
            }
        }

        let n = (class_count[0] + class_count[1]) as f64;
        for class in 0..2 {
            self.class_log_prior[class] = if n > 0.0 {
                (class_count[class] as f64 / n).max(MIN_PRIOR).ln()
            } else {
                0.5f64.ln()
            };

            let total: f64 = feature_count[class].iter().sum::<f64>() + self.alpha * x.n_features as f64;
            self.feature_log_prob[class] = feature_count[class]
                .iter()
                .map(|count| ((count + self.alpha) / total).ln())
                .collect();
        }
    }

    fn predict_proba(&self, x: &SparseVector) -> f64 {
        let [real, fake] = self.joint_log_likelihood(x);
        let max = real.max(fake);
        let real_exp = (real - max).exp();
        let fake_exp = (fake - max).exp();
        fake_exp / (real_exp + fake_exp)
    }

    fn name(&self) -> &str {
        "Naive Bayes"
    }

    fn description(&self) -> &str {
        "Multinomial naive Bayes over TF-IDF weights"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priors_and_likelihoods() {
        // feature 0 only in fake docs, feature 1 only in true docs
        let x = FeatureMatrix::new(
            vec![
                SparseVector::new(vec![(0, 1.0)]),
                SparseVector::new(vec![(0, 1.0)]),
                SparseVector::new(vec![(0, 1.0)]),
                SparseVector::new(vec![(1, 1.0)]),
            ],
            2,
        );
        let y = [Label::Fake, Label::Fake, Label::Fake, Label::Real];
        let mut model = MultinomialNaiveBayes::default();
        model.fit(&x, &y);

        assert!((model.class_log_prior[1] - 0.75f64.ln()).abs() < 1e-12);
        // fake class: (3 + 1) / (3 + 2)
        assert!((model.feature_log_prob[1][0] - 0.8f64.ln()).abs() < 1e-12);

        // 0.75 * 0.8 against 0.25 * 1/3
        assert!((model.predict_proba(&SparseVector::new(vec![(0, 1.0)])) - 0.6 / (0.6 + 0.25 / 3.0)).abs() < 1e-9);
        assert!(model.predict_proba(&SparseVector::new(vec![(1, 1.0)])) < 0.5);
        // no evidence: falls back to the prior
        assert!((model.predict_proba(&SparseVector::default()) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_single_class_stays_finite() {
        let x = FeatureMatrix::new(vec![SparseVector::new(vec![(0, 1.0)])], 1);
        let mut model = MultinomialNaiveBayes::default();
        model.fit(&x, &[Label::Real]);

        let p = model.predict_proba(&SparseVector::new(vec![(0, 1.0)]));
        assert!(p.is_finite());
        assert!(p < 0.5);
    }
}
