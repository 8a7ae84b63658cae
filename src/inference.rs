// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Single-article inference over a trained model bundle

use crate::datasets::Label;
use crate::explain::{Explanation, LimeExplainer};
use crate::models::{Classifier, ModelKind};
use crate::preprocess::{validate_input, InputError, TextCleaner};
use crate::sentiment::{SentimentAnalyzer, SentimentResult};
use crate::training::ModelBundle;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// P(fake) from one classifier in the bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProbability {
    pub model: ModelKind,
    pub fake_probability: f64,
}

/// Verdict for one article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// (fake, true) probabilities from the best model
    pub probabilities: (f64, f64),
    /// Model that produced the verdict
    pub model: ModelKind,
    pub model_probabilities: Vec<ModelProbability>,
    pub explanation: Option<Explanation>,
    pub sentiment: Option<SentimentResult>,
    /// Cleaned text the models saw
    pub clean_text: String,
}

impl PredictionResult {
    /// Probability of the predicted label
    pub fn confidence(&self) -> f64 {
        match self.label {
            Label::Fake => self.probabilities.0,
            Label::Real => self.probabilities.1,
        }
    }
}

pub struct Detector {
    bundle: ModelBundle,
    cleaner: TextCleaner,
    explainer: Option<LimeExplainer>,
    sentiment: Option<Box<dyn SentimentAnalyzer>>,
}

impl Detector {
    pub fn new(bundle: ModelBundle) -> Self {
        Self {
            bundle,
            cleaner: TextCleaner::new(),
            explainer: None,
            sentiment: None,
        }
    }

    pub fn with_explainer(mut self, explainer: LimeExplainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn with_sentiment(mut self, analyzer: Box<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// P(fake) of the best model for already-cleaned text
    pub fn fake_probability(&self, clean_text: &str) -> f64 {
        let features = self.bundle.vectorizer.transform(clean_text);
        self.bundle.best_model().model.predict_proba(&features)
    }

    /// Validate, clean and classify one article
    pub fn analyze(&self, text: &str) -> Result<PredictionResult> {
        let text = validate_input(text)?;
        let clean_text = self.cleaner.clean(text);
        if clean_text.is_empty() {
            return Err(InputError::NoContent.into());
        }

        let features = self.bundle.vectorizer.transform(&clean_text);
        if features.is_empty() {
            tracing::warn!("No known vocabulary in input, prediction relies on priors only");
        }

        let best = self.bundle.best_model();
        let p_fake = best.model.predict_proba(&features);
        let model_probabilities = self
            .bundle
            .models
            .iter()
            .map(|scored| ModelProbability {
                model: scored.kind(),
                fake_probability: scored.model.predict_proba(&features),
            })
            .collect();

        let explanation = self
            .explainer
            .as_ref()
            .map(|explainer| explainer.explain(&clean_text, |t| self.fake_probability(t)));

        let sentiment = match &self.sentiment {
            Some(analyzer) => match analyzer.analyze(text) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("Sentiment analysis with {} failed: {:#}", analyzer.name(), e);
                    None
                }
            },
            None => None,
        };

        let label = Label::from_probability(p_fake);
        tracing::debug!("Prediction: {} (P(fake)={:.4}) by {}", label, p_fake, best.kind());

        Ok(PredictionResult {
            label,
            probabilities: (p_fake, 1.0 - p_fake),
            model: best.kind(),
            model_probabilities,
            explanation,
            sentiment,
            clean_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;
    use crate::features::VectorizerParams;
    use crate::sentiment::{LexiconSentiment, Polarity};
    use crate::training::{Trainer, TrainingConfig};

    fn detector() -> Detector {
        let config = TrainingConfig {
            cv_folds: 0,
            show_progress: false,
            models: vec![ModelKind::LogisticRegression, ModelKind::NaiveBayes],
            vectorizer: VectorizerParams {
                min_df: 1,
                ..VectorizerParams::default()
            },
            ..TrainingConfig::default()
        };
        let bundle = Trainer::new(config).train(&Dataset::synthetic(100, 3)).unwrap().bundle;
        Detector::new(bundle)
    }

    #[test]
    fn test_analyze_fake_article() {
        let detector = detector()
            .with_explainer(LimeExplainer::new().with_samples(100).with_features(5))
            .with_sentiment(Box::new(LexiconSentiment::new()));

        let result = detector
            .analyze("Leaked video proves the conspiracy is real! Watch the deep state hoax exposed")
            .unwrap();

        assert_eq!(result.label, Label::Fake);
        assert!((result.probabilities.0 + result.probabilities.1 - 1.0).abs() < 1e-12);
        assert!(result.confidence() >= 0.5);
        assert_eq!(result.model_probabilities.len(), 2);
        assert!(result.clean_text.contains("hoax"));

        let explanation = result.explanation.expect("explainer configured");
        assert!(!explanation.token_weights.is_empty());
        assert!(explanation.token_weights.len() <= 5);
        assert_eq!(result.sentiment.map(|s| s.polarity), Some(Polarity::Negative));
    }

    #[test]
    fn test_analyze_real_article_without_extras() {
        let result = detector()
            .analyze("WASHINGTON (Reuters) - The Senate committee approves budget proposal, officials said")
            .unwrap();
        assert_eq!(result.label, Label::Real);
        assert!(result.explanation.is_none());
        assert!(result.sentiment.is_none());
    }

    #[test]
    fn test_analyze_rejects_bad_input() {
        let detector = detector();

        let err = detector.analyze("  too short ").unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::TooShort { .. })));

        let err = detector.analyze("and the of which were is").unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::NoContent));
    }
}
