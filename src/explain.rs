// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Local explanations for classifier verdicts
//!
//! Provides:
//! - A LIME text explainer (token-removal perturbations, exponential kernel,
//!   weighted ridge surrogate)
//! - Explanation structures with per-token weights and a summary

use crate::datasets::Label;
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A token and its contribution; positive weights push toward "fake"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWeight {
    pub token: String,
    pub weight: f64,
}

/// Explanation of one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub prediction: Label,
    /// P(fake) of the explained model on the full text
    pub probability: f64,
    /// Most influential tokens, by descending absolute weight
    pub token_weights: Vec<TokenWeight>,
    /// Surrogate intercept
    pub intercept: f64,
    /// Surrogate prediction for the full text
    pub local_prediction: f64,
    /// Weighted R² of the surrogate on the perturbation samples
    pub score: f64,
    /// Natural language summary
    pub summary: String,
}

impl Explanation {
    fn empty(probability: f64) -> Self {
        let mut explanation = Self {
            prediction: Label::from_probability(probability),
            probability,
            token_weights: Vec::new(),
            intercept: probability,
            local_prediction: probability,
            score: 0.0,
            summary: String::new(),
        };
        explanation.generate_summary();
        explanation
    }

    /// (token, weight) pairs
    pub fn as_pairs(&self) -> Vec<(String, f64)> {
        self.token_weights.iter().map(|tw| (tw.token.clone(), tw.weight)).collect()
    }

    fn generate_summary(&mut self) {
        let confidence = match self.prediction {
            Label::Fake => self.probability,
            Label::Real => 1.0 - self.probability,
        };
        let mut parts = vec![format!(
            "This article is classified as {} news (confidence: {:.1}%).",
            self.prediction,
            confidence * 100.0
        )];

        let toward = |positive: bool| -> Vec<&str> {
            self.token_weights
                .iter()
                .filter(|tw| (tw.weight > 0.0) == positive && tw.weight != 0.0)
                .take(3)
                .map(|tw| tw.token.as_str())
                .collect()
        };
        let fake_terms = toward(true);
        let real_terms = toward(false);
        if !fake_terms.is_empty() {
            parts.push(format!("Words pointing to fake: {}", fake_terms.join(", ")));
        }
        if !real_terms.is_empty() {
            parts.push(format!("Words pointing to true: {}", real_terms.join(", ")));
        }
        if self.token_weights.is_empty() {
            parts.push("No words in the text could be attributed.".to_string());
        } else if self.score < 0.3 {
            parts.push(format!("Local surrogate fit is weak (R² = {:.2}).", self.score));
        }

        self.summary = parts.join("\n");
    }
}

/// LIME explainer for text classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimeExplainer {
    /// Perturbed texts scored per explanation (the first is the original)
    pub num_samples: usize,
    /// Tokens reported
    pub num_features: usize,
    /// Width of the exponential kernel over cosine distance × 100
    pub kernel_width: f64,
    /// Ridge penalty of the surrogate
    pub ridge_alpha: f64,
    pub seed: u64,
}

impl Default for LimeExplainer {
    fn default() -> Self {
        Self {
            num_samples: 500,
            num_features: 10,
            kernel_width: 25.0,
            ridge_alpha: 1.0,
            seed: 42,
        }
    }
}

struct RidgeFit {
    coef: Array1<f64>,
    intercept: f64,
    score: f64,
}

impl LimeExplainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples.max(2);
        self
    }

    pub fn with_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    /// Explain `predict` (text -> P(fake)) on a cleaned, space-separated text
    pub fn explain<F>(&self, text: &str, predict: F) -> Explanation
    where
        F: Fn(&str) -> f64,
    {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut vocab: Vec<&str> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        // feature index of every token position
        let token_ids: Vec<usize> = tokens
            .iter()
            .map(|&token| {
                *index.entry(token).or_insert_with(|| {
                    vocab.push(token);
                    vocab.len() - 1
                })
            })
            .collect();

        let probability = predict(text);
        let d = vocab.len();
        if d == 0 || self.num_features == 0 {
            return Explanation::empty(probability);
        }

        let (masks, targets) = self.perturb(&tokens, &token_ids, d, probability, &predict);
        let weights = masks.map_axis(Axis(1), |row| {
            let kept = row.sum();
            let cosine = (kept / d as f64).sqrt();
            let distance = (1.0 - cosine) * 100.0;
            (-(distance * distance) / (self.kernel_width * self.kernel_width)).exp().sqrt()
        });

        // Highest weights: rank on the full surrogate, refit on the top tokens.
        let all: Vec<usize> = (0..d).collect();
        let full = weighted_ridge(&masks, &targets, &weights, self.ridge_alpha, &all);
        let mut ranked = all;
        ranked.sort_by(|a, b| {
            full.coef[*b]
                .abs()
                .partial_cmp(&full.coef[*a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
        ranked.truncate(self.num_features.min(d));

        let fit = weighted_ridge(&masks, &targets, &weights, self.ridge_alpha, &ranked);
        let mut token_weights: Vec<TokenWeight> = ranked
            .iter()
            .zip(fit.coef.iter())
            .map(|(&idx, &weight)| TokenWeight {
                token: vocab[idx].to_string(),
                weight,
            })
            .collect();
        token_weights.sort_by(|a, b| b.weight.abs().partial_cmp(&a.weight.abs()).unwrap_or(std::cmp::Ordering::Equal));

        let mut explanation = Explanation {
            prediction: Label::from_probability(probability),
            probability,
            local_prediction: fit.intercept + fit.coef.sum(),
            intercept: fit.intercept,
            score: fit.score,
            token_weights,
            summary: String::new(),
        };
        explanation.generate_summary();
        explanation
    }

    /// Binary keep-masks over the distinct tokens and the model output for each
    fn perturb<F>(
        &self,
        tokens: &[&str],
        token_ids: &[usize],
        d: usize,
        original: f64,
        predict: &F,
    ) -> (Array2<f64>, Array1<f64>)
    where
        F: Fn(&str) -> f64,
    {
        let n = self.num_samples.max(2);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut masks = Array2::<f64>::ones((n, d));
        let mut targets = Array1::<f64>::zeros(n);
        targets[0] = original;

        for row in 1..n {
            let remove = rng.gen_range(1..=d);
            for idx in sample(&mut rng, d, remove).iter() {
                masks[[row, idx]] = 0.0;
            }
            let kept: Vec<&str> = tokens
                .iter()
                .zip(token_ids)
                .filter(|(_, &id)| masks[[row, id]] > 0.0)
                .map(|(t, _)| *t)
                .collect();
            targets[row] = predict(&kept.join(" "));
        }
        (masks, targets)
    }
}

/// Weighted ridge regression with intercept on the selected columns
fn weighted_ridge(x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>, alpha: f64, cols: &[usize]) -> RidgeFit {
    let x = x.select(Axis(1), cols);
    let k = cols.len();
    let w_sum = w.sum().max(f64::MIN_POSITIVE);

    let x_mean = x.t().dot(w) / w_sum;
    let y_mean = w.dot(y) / w_sum;
    let xc = &x - &x_mean;
    let yc = y - y_mean;

    let xw = &xc * &w.view().insert_axis(Axis(1));
    let gram = xw.t().dot(&xc) + Array2::<f64>::eye(k) * alpha;
    let rhs = xw.t().dot(&yc);
    let coef = solve_spd(&gram, &rhs).unwrap_or_else(|| Array1::zeros(k));
    let intercept = y_mean - x_mean.dot(&coef);

    let predicted = x.dot(&coef) + intercept;
    let ss_res: f64 = w.iter().zip(y.iter().zip(predicted.iter())).map(|(wi, (yi, pi))| wi * (yi - pi).powi(2)).sum();
    let ss_tot: f64 = w.iter().zip(yc.iter()).map(|(wi, yi)| wi * yi * yi).sum();
    let score = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    RidgeFit { coef, intercept, score }
}

/// Solve `a x = b` for symmetric positive definite `a` (Cholesky)
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let diag = a[[j, j]] - (0..j).map(|k| l[[j, k]] * l[[j, k]]).sum::<f64>();
        if diag <= 0.0 {
            return None;
        }
        l[[j, j]] = diag.sqrt();
        for i in (j + 1)..n {
            let s = a[[i, j]] - (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum::<f64>();
            l[[i, j]] = s / l[[j, j]];
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s = b[i] - (0..i).map(|k| l[[i, k]] * z[k]).sum::<f64>();
        z[i] = s / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s = z[i] - ((i + 1)..n).map(|k| l[[k, i]] * x[k]).sum::<f64>();
        x[i] = s / l[[i, i]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_model(text: &str) -> f64 {
        if text.split_whitespace().any(|t| t == "hoax") {
            0.9
        } else {
            0.1
        }
    }

    #[test]
    fn test_lime_finds_decisive_token() {
        let explainer = LimeExplainer::new().with_samples(300).with_features(3);
        let explanation = explainer.explain("senate budget hoax vote committee", keyword_model);

        assert_eq!(explanation.prediction, Label::Fake);
        assert_eq!(explanation.token_weights.len(), 3);
        let top = &explanation.token_weights[0];
        assert_eq!(top.token, "hoax");
        assert!(top.weight > 0.5);
        for other in &explanation.token_weights[1..] {
            assert!(other.weight.abs() < 0.15);
        }
        assert!(explanation.score > 0.9);
        assert!(explanation.summary.contains("hoax"));
    }

    #[test]
    fn test_lime_is_deterministic() {
        let explainer = LimeExplainer::new().with_samples(100);
        let a = explainer.explain("senate budget hoax vote", keyword_model);
        let b = explainer.explain("senate budget hoax vote", keyword_model);
        assert_eq!(a.as_pairs(), b.as_pairs());
    }

    #[test]
    fn test_repeated_tokens_share_one_feature() {
        let explainer = LimeExplainer::new().with_samples(200);
        let explanation = explainer.explain("hoax senate hoax budget hoax", keyword_model);

        assert_eq!(explanation.token_weights.len(), 3);
        assert_eq!(explanation.token_weights[0].token, "hoax");
        assert!(explanation.token_weights[0].weight > 0.5);
    }

    #[test]
    fn test_empty_text_has_no_weights() {
        let explanation = LimeExplainer::new().explain("", |_| 0.2);
        assert!(explanation.token_weights.is_empty());
        assert_eq!(explanation.prediction, Label::Real);
        assert!(explanation.summary.contains("No words"));
    }

    #[test]
    fn test_solve_spd() {
        let a = ndarray::arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let b = ndarray::arr1(&[2.0, 1.0]);
        let x = solve_spd(&a, &b).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1 -> x = 0.5, y = 0
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }
}
