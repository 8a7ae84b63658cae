// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fake news detector CLI
//!
//! Usage:
//!   fakenews train --fake Fake.csv --true True.csv
//!   fakenews train --synthetic 1000 --seed 7
//!   fakenews predict --text "..." --sentiment lexicon
//!   fakenews inspect --models-dir models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fakenews_detect::persist::{ModelStore, DEFAULT_MODELS_DIR};
use fakenews_detect::report;
use fakenews_detect::{Dataset, Detector, LimeExplainer, SentimentBackend, TextCleaner, Trainer, TrainingConfig};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fakenews")]
#[command(about = "Train and run fake news classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train all classifiers and save the best bundle
    Train {
        /// CSV of fake articles (title, text, subject, date)
        #[arg(long, required_unless_present = "synthetic")]
        fake: Option<PathBuf>,

        /// CSV of true articles (title, text, subject, date)
        #[arg(long = "true", required_unless_present = "synthetic")]
        true_path: Option<PathBuf>,

        /// Train on N generated articles instead of CSV files
        #[arg(long, conflicts_with_all = ["fake", "true_path"])]
        synthetic: Option<usize>,

        /// Directory to write the model bundle to
        #[arg(short, long, default_value = DEFAULT_MODELS_DIR)]
        models_dir: PathBuf,

        /// JSON training configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Articles kept per class
        #[arg(long)]
        sample_per_class: Option<usize>,

        /// Keep the class sizes as loaded
        #[arg(long)]
        no_balance: bool,
    },

    /// Classify one article
    Predict {
        #[arg(short, long, default_value = DEFAULT_MODELS_DIR)]
        models_dir: PathBuf,

        /// Article text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// File containing the article text
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Skip the LIME explanation
        #[arg(long)]
        no_explain: bool,

        /// Sentiment backend (lexicon, transformer, none)
        #[arg(long, default_value = "lexicon")]
        sentiment: SentimentBackend,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the metrics of a saved bundle
    Inspect {
        #[arg(short, long, default_value = DEFAULT_MODELS_DIR)]
        models_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            fake,
            true_path,
            synthetic,
            models_dir,
            config,
            seed,
            sample_per_class,
            no_balance,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::from_file(&path)?,
                None => TrainingConfig::default(),
            };
            if let Some(seed) = seed {
                config.seed = seed;
                config.sampling.seed = seed;
            }
            if let Some(n) = sample_per_class {
                config.sampling.sample_per_class = Some(n);
            }
            if no_balance {
                config.sampling.balance = false;
            }
            train(config, fake, true_path, synthetic, models_dir)
        }
        Command::Predict {
            models_dir,
            text,
            file,
            no_explain,
            sentiment,
            json,
        } => predict(models_dir, text, file, no_explain, sentiment, json),
        Command::Inspect { models_dir } => {
            let manifest = ModelStore::new(&models_dir).read_manifest()?;
            println!("{}", report::manifest_table(&manifest));
            Ok(())
        }
    }
}

fn train(
    config: TrainingConfig,
    fake: Option<PathBuf>,
    true_path: Option<PathBuf>,
    synthetic: Option<usize>,
    models_dir: PathBuf,
) -> Result<()> {
    tracing::info!("Fake News Classifier Training");
    tracing::info!("=============================");
    tracing::info!("Seed: {}", config.seed);

    let dataset = match (synthetic, fake, true_path) {
        (Some(size), _, _) => {
            tracing::info!("Generating synthetic dataset with {} articles", size);
            Dataset::synthetic(size, config.seed)
        }
        (None, Some(fake), Some(true_path)) => {
            Dataset::load(&fake, &true_path, &config.sampling, &TextCleaner::new())
                .context("Failed to load dataset")?
        }
        _ => anyhow::bail!("Either --synthetic or both --fake and --true are required"),
    };

    println!("\n{}", report::dataset_tables(&dataset.summary()));

    let outcome = Trainer::new(config).train(&dataset)?;

    println!("\n{}", "=".repeat(70));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(70));
    println!("{}", report::metrics_table(&outcome));

    let store = ModelStore::new(&models_dir);
    store.save(&outcome.bundle).context("Failed to save models")?;
    let report_path = report::save_report(&outcome, &models_dir)?;

    println!("\nModels saved to: {}", models_dir.display());
    println!("Markdown report saved to: {}", report_path.display());
    Ok(())
}

fn predict(
    models_dir: PathBuf,
    text: Option<String>,
    file: Option<PathBuf>,
    no_explain: bool,
    sentiment: SentimentBackend,
    json: bool,
) -> Result<()> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
            buf
        }
    };

    let bundle = ModelStore::new(&models_dir)
        .load()
        .with_context(|| format!("Failed to load models from {}", models_dir.display()))?;

    let mut detector = Detector::new(bundle);
    if !no_explain {
        detector = detector.with_explainer(LimeExplainer::default());
    }
    if let Some(analyzer) = sentiment.create()? {
        detector = detector.with_sentiment(analyzer);
    }

    let result = detector.analyze(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::format_prediction(&result));
    }
    Ok(())
}
