// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classical classifiers over TF-IDF features
//!
//! Implements:
//! - Logistic regression (L2-regularized)
//! - Multinomial naive Bayes
//! - Random forest of CART trees
//! - Gradient boosted trees on the logistic loss
//!
//! All classifiers output P(fake) and are serializable through [`TrainedModel`].

mod boosting;
mod forest;
mod logistic;
mod naive_bayes;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use naive_bayes::MultinomialNaiveBayes;

use crate::datasets::Label;
use crate::features::{FeatureMatrix, SparseVector};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trait for all classifiers
pub trait Classifier: Send + Sync {
    /// Train the model on feature rows and their labels
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]);

    /// Probability that the article is fake
    fn predict_proba(&self, x: &SparseVector) -> f64;

    fn predict(&self, x: &SparseVector) -> Label {
        Label::from_probability(self.predict_proba(x))
    }

    fn predict_proba_batch(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows.iter().map(|row| self.predict_proba(row)).collect()
    }

    /// Get model name
    fn name(&self) -> &str;

    /// Get model description
    fn description(&self) -> &str;
}

/// The classifier configurations the trainer knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    LogisticRegression,
    NaiveBayes,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::LogisticRegression,
        ModelKind::NaiveBayes,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
    ];

    /// File-name friendly identifier
    pub fn slug(self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic-regression",
            ModelKind::NaiveBayes => "naive-bayes",
            ModelKind::RandomForest => "random-forest",
            ModelKind::GradientBoosting => "gradient-boosting",
        }
    }

    /// Fresh, untrained model of this kind
    pub fn build(self, seed: u64) -> TrainedModel {
        match self {
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(LogisticRegression::default()),
            ModelKind::NaiveBayes => TrainedModel::NaiveBayes(MultinomialNaiveBayes::default()),
            ModelKind::RandomForest => TrainedModel::RandomForest(RandomForest::new(seed)),
            ModelKind::GradientBoosting => TrainedModel::GradientBoosting(GradientBoosting::new(seed)),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        match wanted.as_str() {
            "logistic-regression" | "logreg" | "lr" => Ok(ModelKind::LogisticRegression),
            "naive-bayes" | "nb" => Ok(ModelKind::NaiveBayes),
            "random-forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient-boosting" | "gb" => Ok(ModelKind::GradientBoosting),
            _ => Err(format!("unknown model '{}'", s)),
        }
    }
}

/// A fitted classifier of any supported kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "kebab-case")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    NaiveBayes(MultinomialNaiveBayes),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::NaiveBayes(_) => ModelKind::NaiveBayes,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &FeatureMatrix, y: &[Label]) {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &SparseVector) -> f64 {
        self.inner().predict_proba(x)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn binary_targets(y: &[Label]) -> Vec<f64> {
    y.iter().map(|l| l.to_binary() as f64).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("rf".parse::<ModelKind>(), Ok(ModelKind::RandomForest));
        assert_eq!("Logistic Regression".parse::<ModelKind>(), Ok(ModelKind::LogisticRegression));
        assert_eq!("naive_bayes".parse::<ModelKind>(), Ok(ModelKind::NaiveBayes));
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_all_models_learn_synthetic_corpus() {
        let (_, x, y) = synthetic_features(200, 42);

        for kind in ModelKind::ALL {
            let mut model = kind.build(42);
            model.fit(&x, &y);
            let predictions: Vec<Label> = x.rows.iter().map(|row| model.predict(row)).collect();
            let acc = accuracy(&predictions, &y);
            assert!(acc > 0.95, "{} training accuracy {:.3}", model.name(), acc);
            assert_eq!(model.kind(), kind);
        }
    }

    #[test]
    fn test_trained_model_serde_keeps_predictions() {
        let (_, x, y) = synthetic_features(60, 5);
        let mut model = ModelKind::GradientBoosting.build(5);
        model.fit(&x, &y);

        let json = serde_json::to_string(&model).unwrap();
        let restored: TrainedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.kind(), ModelKind::GradientBoosting);
        for row in &x.rows {
            assert_eq!(model.predict_proba(row), restored.predict_proba(row));
        }
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }
}
