// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Sentiment signal attached to predictions
//!
//! Sentiment is reported next to the classical verdict as a proxy signal;
//! it never changes the predicted label.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Polarity::Positive => "POSITIVE",
            Polarity::Negative => "NEGATIVE",
            Polarity::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub polarity: Polarity,
    /// Confidence in `polarity`, 0.0 to 1.0
    pub score: f64,
    /// Analyzer that produced the result
    pub source: String,
}

/// Trait for sentiment backends
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<SentimentResult>;

    fn name(&self) -> &str;
}

/// Which analyzer the detector should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    Lexicon,
    Transformer,
    None,
}

impl FromStr for SentimentBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexicon" => Ok(SentimentBackend::Lexicon),
            "transformer" | "bert" => Ok(SentimentBackend::Transformer),
            "none" | "off" => Ok(SentimentBackend::None),
            _ => Err(format!("unknown sentiment backend '{}'", s)),
        }
    }
}

impl SentimentBackend {
    /// Build the analyzer, `None` when sentiment is disabled
    pub fn create(self) -> Result<Option<Box<dyn SentimentAnalyzer>>> {
        match self {
            SentimentBackend::None => Ok(None),
            SentimentBackend::Lexicon => Ok(Some(Box::new(LexiconSentiment::new()))),
            #[cfg(feature = "transformer")]
            SentimentBackend::Transformer => Ok(Some(Box::new(TransformerSentiment::new()?))),
            #[cfg(not(feature = "transformer"))]
            SentimentBackend::Transformer => {
                anyhow::bail!("Transformer sentiment requires building with --features transformer")
            }
        }
    }
}

static POSITIVE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "good", "great", "excellent", "positive", "success", "successful", "win", "wins", "won", "gain",
        "gains", "growth", "improve", "improved", "improvement", "strong", "benefit", "support", "agree",
        "agreement", "approve", "approved", "welcome", "praise", "praised", "hope", "happy", "peace",
        "safe", "recovery", "progress", "best", "better", "celebrate", "honest", "fair", "love",
        "helpful", "stable", "record", "boost", "victory", "trust", "confident", "optimistic",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "bad", "terrible", "horrible", "awful", "worst", "worse", "fail", "failed", "failure", "crisis",
        "war", "attack", "attacks", "kill", "killed", "death", "dead", "disaster", "corrupt", "corruption",
        "fraud", "scandal", "lie", "lies", "liar", "fake", "hoax", "shocking", "outrage", "outraged",
        "angry", "fear", "threat", "danger", "dangerous", "destroy", "destroyed", "evil", "crime",
        "criminal", "collapse", "loss", "losses", "hate", "violence", "conspiracy", "disgusting",
        "rigged", "traitor", "crooked", "sick", "panic",
    ]
    .into_iter()
    .collect()
});

const NEGATORS: [&str; 6] = ["not", "no", "never", "without", "nobody", "nothing"];

/// Word-list sentiment with one-token negation
#[derive(Debug, Clone, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn analyze(&self, text: &str) -> Result<SentimentResult> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
            .collect();

        let (mut positive, mut negative) = (0usize, 0usize);
        for (i, token) in tokens.iter().enumerate() {
            let negated = i > 0 && (NEGATORS.contains(&tokens[i - 1]) || tokens[i - 1].ends_with("n't"));
            let hit = if POSITIVE.contains(token) {
                Some(true)
            } else if NEGATIVE.contains(token) {
                Some(false)
            } else {
                None
            };
            match hit.map(|p| p != negated) {
                Some(true) => positive += 1,
                Some(false) => negative += 1,
                None => {}
            }
        }

        let hits = positive + negative;
        let (polarity, score) = if hits == 0 || positive == negative {
            (Polarity::Neutral, 0.5)
        } else {
            let balance = (positive as f64 - negative as f64) / hits as f64;
            let polarity = if balance > 0.0 { Polarity::Positive } else { Polarity::Negative };
            (polarity, 0.5 + balance.abs() / 2.0)
        };

        Ok(SentimentResult {
            polarity,
            score,
            source: self.name().to_string(),
        })
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

#[cfg(feature = "transformer")]
pub use transformer::TransformerSentiment;

#[cfg(feature = "transformer")]
mod transformer {
    use super::{Polarity, SentimentAnalyzer, SentimentResult};
    use anyhow::{Context, Result};
    use rust_bert::pipelines::sentiment::{SentimentConfig, SentimentModel, SentimentPolarity};
    use std::sync::Mutex;

    /// DistilBERT SST-2 sentiment pipeline. Runs on CPU.
    pub struct TransformerSentiment {
        model: Mutex<SentimentModel>,
    }

    impl std::fmt::Debug for TransformerSentiment {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TransformerSentiment")
                .field("model", &"<SentimentModel>")
                .finish()
        }
    }

    impl TransformerSentiment {
        /// Load the pretrained model, downloading it on first use
        pub fn new() -> Result<Self> {
            tracing::info!("Loading transformer sentiment model");
            let model = std::thread::spawn(|| SentimentModel::new(SentimentConfig::default()))
                .join()
                .map_err(|_| anyhow::anyhow!("Failed to join model creation thread"))?
                .context("Failed to load sentiment model")?;
            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    impl SentimentAnalyzer for TransformerSentiment {
        fn analyze(&self, text: &str) -> Result<SentimentResult> {
            let model = self
                .model
                .lock()
                .map_err(|_| anyhow::anyhow!("Sentiment model lock poisoned"))?;
            let output = model.predict([text]);
            let sentiment = output.first().context("Sentiment model returned no output")?;
            let polarity = match sentiment.polarity {
                SentimentPolarity::Positive => Polarity::Positive,
                SentimentPolarity::Negative => Polarity::Negative,
            };
            Ok(SentimentResult {
                polarity,
                score: sentiment.score,
                source: self.name().to_string(),
            })
        }

        fn name(&self) -> &str {
            "distilbert-sst2"
        }
    }
}
