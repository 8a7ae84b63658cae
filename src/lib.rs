// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fake news classification for English-language news articles
//!
//! This crate provides:
//! - Text cleaning and input validation
//! - Loading of the fake/true article CSV pair
//! - TF-IDF features and four classical classifiers
//! - Cross-validated training with best-model selection by F1
//! - Checksummed model persistence
//! - LIME explanations and a sentiment signal for single-article inference

pub mod datasets;
pub mod explain;
pub mod features;
pub mod inference;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod preprocess;
pub mod report;
pub mod sentiment;
pub mod training;

pub use datasets::{Article, Dataset, DatasetError, Label, SamplingConfig};
pub use explain::{Explanation, LimeExplainer, TokenWeight};
pub use features::{TfidfVectorizer, VectorizerParams};
pub use inference::{Detector, PredictionResult};
pub use metrics::{ConfusionMatrix, CrossValidationScores, EvaluationMetrics};
pub use models::{Classifier, ModelKind, TrainedModel};
pub use persist::{Manifest, ModelStore, StoreError};
pub use preprocess::{validate_input, InputError, TextCleaner};
pub use sentiment::{LexiconSentiment, Polarity, SentimentAnalyzer, SentimentBackend, SentimentResult};
pub use training::{ModelBundle, Trainer, TrainingConfig, TrainingOutcome};
