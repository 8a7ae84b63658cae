// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible training pipeline for the fake news classifiers
//!
//! Orchestrates:
//! - Stratified train/test splitting
//! - TF-IDF fitting on the training split
//! - k-fold cross-validation of every configured classifier
//! - Held-out evaluation and best-model selection by F1

use crate::datasets::{Dataset, DatasetSummary, Label, SamplingConfig};
use crate::features::{FeatureMatrix, TfidfVectorizer, VectorizerParams};
use crate::metrics::{CrossValidationScores, EvaluationMetrics};
use crate::models::{Classifier, ModelKind, TrainedModel};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    /// Cross-validation folds on the training split (< 2 disables it)
    pub cv_folds: usize,
    pub vectorizer: VectorizerParams,
    /// Classifiers to train, in tie-breaking order
    pub models: Vec<ModelKind>,
    pub sampling: SamplingConfig,
    /// Draw a progress bar while training
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 5,
            vectorizer: VectorizerParams::default(),
            models: ModelKind::ALL.to_vec(),
            sampling: SamplingConfig::default(),
            show_progress: true,
        }
    }
}

impl TrainingConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid training config {}", path.display()))?;
        Ok(config)
    }
}

/// A fitted classifier with its evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredModel {
    pub model: TrainedModel,
    /// Metrics on the held-out split
    pub metrics: EvaluationMetrics,
    /// F1 across training folds
    pub cv: CrossValidationScores,
}

impl ScoredModel {
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }
}

/// Everything inference needs: the vectorizer and the scored classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub vectorizer: TfidfVectorizer,
    pub models: Vec<ScoredModel>,
    /// Index of the best model in `models`
    pub best: usize,
    pub trained_at: DateTime<Utc>,
    pub version: String,
}

impl ModelBundle {
    pub fn best_model(&self) -> &ScoredModel {
        &self.models[self.best]
    }

    pub fn model(&self, kind: ModelKind) -> Option<&ScoredModel> {
        self.models.iter().find(|m| m.kind() == kind)
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub config: TrainingConfig,
    pub bundle: ModelBundle,
    pub train_size: usize,
    pub test_size: usize,
    pub dataset: DatasetSummary,
}

/// Main training pipeline
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, vectorize, cross-validate, fit and evaluate every configured model
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        if self.config.models.is_empty() {
            anyhow::bail!("No models configured for training");
        }
        if !(0.0..1.0).contains(&self.config.test_fraction) {
            anyhow::bail!("test_fraction must be in [0, 1), got {}", self.config.test_fraction);
        }

        let (train, test) = dataset.split(self.config.test_fraction, self.config.seed);
        let y_train = train.labels();
        let y_test = test.labels();
        for label in [Label::Fake, Label::Real] {
            if !y_train.contains(&label) {
                anyhow::bail!("Training split has no '{}' articles ({} total)", label, train.len());
            }
        }
        if test.is_empty() {
            tracing::warn!("Test split is empty, held-out metrics will be zero");
        }

        tracing::info!("Split: train={}, test={}", train.len(), test.len());

        let mut vectorizer = TfidfVectorizer::new(self.config.vectorizer.clone());
        let x_train = vectorizer.fit_transform(&train.clean_texts());
        let x_test = vectorizer.transform_all(&test.clean_texts());
        if vectorizer.vocabulary_size() == 0 {
            anyhow::bail!("Vocabulary is empty after TF-IDF fitting, check min_df/max_df");
        }
        tracing::info!("TF-IDF vocabulary: {} terms", vectorizer.vocabulary_size());

        let folds = stratified_folds(&y_train, self.config.cv_folds, self.config.seed);
        let progress = self.progress_bar()?;

        let mut models = Vec::with_capacity(self.config.models.len());
        for &kind in &self.config.models {
            progress.set_message(kind.to_string());
            tracing::info!("Training: {}", kind);

            let cv = cross_validate(kind, self.config.seed, &x_train, &y_train, &folds);

            let mut model = kind.build(self.config.seed);
            model.fit(&x_train, &y_train);
            let probabilities = model.predict_proba_batch(&x_test);
            let metrics = EvaluationMetrics::from_probabilities(&y_test, &probabilities);

            tracing::info!(
                "  {} - Accuracy: {:.4}, F1: {:.4}, ROC-AUC: {:.4}, CV F1: {:.4} ± {:.4}",
                model.name(),
                metrics.accuracy,
                metrics.f1_score,
                metrics.roc_auc,
                cv.mean,
                cv.std
            );

            models.push(ScoredModel { model, metrics, cv });
            progress.inc(1);
        }
        progress.finish_with_message("done");

        let f1_scores: Vec<f64> = models.iter().map(|m| m.metrics.f1_score).collect();
        let best = select_best(&f1_scores);
        tracing::info!("Best model: {} (F1={:.4})", models[best].kind(), f1_scores[best]);

        Ok(TrainingOutcome {
            config: self.config.clone(),
            bundle: ModelBundle {
                vectorizer,
                models,
                best,
                trained_at: Utc::now(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            train_size: train.len(),
            test_size: test.len(),
            dataset: dataset.summary(),
        })
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if !self.config.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(self.config.models.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Ok(pb)
    }
}

/// Index of the highest score; ties go to the earliest
pub fn select_best(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

/// Partition row indices into `k` folds with the class ratio preserved
///
/// Returns no folds when `k < 2`. `k` is capped by the smaller class size.
pub fn stratified_folds(labels: &[Label], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let smallest = [Label::Fake, Label::Real]
        .iter()
        .map(|l| labels.iter().filter(|x| *x == l).count())
        .min()
        .unwrap_or(0);
    let k = k.min(smallest);
    if k < 2 {
        return Vec::new();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    for label in [Label::Fake, Label::Real] {
        let mut group: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
        group.shuffle(&mut rng);
        for (pos, idx) in group.into_iter().enumerate() {
            folds[pos % k].push(idx);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

/// Held-out F1 of a fresh model on each fold
fn cross_validate(
    kind: ModelKind,
    seed: u64,
    x: &FeatureMatrix,
    y: &[Label],
    folds: &[Vec<usize>],
) -> CrossValidationScores {
    let scores = folds
        .iter()
        .enumerate()
        .map(|(f, held_out)| {
            let train_idx: Vec<usize> = (0..y.len()).filter(|i| held_out.binary_search(i).is_err()).collect();
            let y_fold: Vec<Label> = train_idx.iter().map(|&i| y[i]).collect();
            let y_held: Vec<Label> = held_out.iter().map(|&i| y[i]).collect();

            let mut model = kind.build(seed);
            model.fit(&x.select(&train_idx), &y_fold);
            let probabilities = model.predict_proba_batch(&x.select(held_out));
            let f1 = EvaluationMetrics::from_probabilities(&y_held, &probabilities).f1_score;
            tracing::debug!("  {} fold {}: F1={:.4}", kind, f + 1, f1);
            f1
        })
        .collect();
    CrossValidationScores::from_folds(scores)
}
