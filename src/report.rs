// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Console tables and the markdown training report

use crate::datasets::DatasetSummary;
use crate::inference::PredictionResult;
use crate::metrics::{CrossValidationScores, EvaluationMetrics};
use crate::models::{Classifier, ModelKind};
use crate::persist::Manifest;
use crate::training::TrainingOutcome;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "report.md";

const WIDTH: usize = 86;

struct Row<'a> {
    kind: ModelKind,
    metrics: &'a EvaluationMetrics,
    cv: &'a CrossValidationScores,
    best: bool,
}

fn console_table(rows: &[Row<'_>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "-".repeat(WIDTH)));
    out.push_str(&format!(
        "{:<22} {:>9} {:>9} {:>9} {:>9} {:>9} {:>15}\n",
        "Model", "Accuracy", "Precision", "Recall", "F1", "ROC-AUC", "CV F1"
    ));
    out.push_str(&format!("{}\n", "-".repeat(WIDTH)));
    for row in rows {
        let name = if row.best { format!("{} *", row.kind) } else { row.kind.to_string() };
        out.push_str(&format!(
            "{:<22} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>15}\n",
            name,
            row.metrics.accuracy,
            row.metrics.precision,
            row.metrics.recall,
            row.metrics.f1_score,
            row.metrics.roc_auc,
            cv_cell(row.cv)
        ));
    }
    out.push_str(&format!("{}\n", "-".repeat(WIDTH)));
    out.push_str("* best model by F1\n");
    out
}

fn cv_cell(cv: &CrossValidationScores) -> String {
    if cv.fold_f1.is_empty() {
        "-".to_string()
    } else {
        format!("{:.4} ± {:.4}", cv.mean, cv.std)
    }
}

/// Metrics table for a finished training run
pub fn metrics_table(outcome: &TrainingOutcome) -> String {
    let bundle = &outcome.bundle;
    let rows: Vec<Row<'_>> = bundle
        .models
        .iter()
        .enumerate()
        .map(|(i, m)| Row {
            kind: m.kind(),
            metrics: &m.metrics,
            cv: &m.cv,
            best: i == bundle.best,
        })
        .collect();
    console_table(&rows)
}

/// Metrics table from a stored manifest
pub fn manifest_table(manifest: &Manifest) -> String {
    let rows: Vec<Row<'_>> = manifest
        .models
        .iter()
        .map(|e| Row {
            kind: e.kind,
            metrics: &e.metrics,
            cv: &e.cv,
            best: e.kind == manifest.best,
        })
        .collect();

    let mut out = format!(
        "Trained: {}\nVersion: {}\nVocabulary: {} terms\nBest model: {}\n\n",
        manifest.trained_at.format("%Y-%m-%d %H:%M:%S UTC"),
        manifest.version,
        manifest.vocabulary_size,
        manifest.best
    );
    out.push_str(&console_table(&rows));
    out
}

/// Article counts per label, subject and month
pub fn dataset_tables(summary: &DatasetSummary) -> String {
    let mut out = format!("Articles: {}\n", summary.total);

    out.push_str("\nBy label:\n");
    for (label, count) in &summary.by_label {
        out.push_str(&format!("  {:<20} {:>8}\n", label, count));
    }

    out.push_str("\nBy subject:\n");
    let mut subjects: Vec<(&String, &usize)> = summary.by_subject.iter().collect();
    subjects.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (subject, count) in subjects {
        out.push_str(&format!("  {:<20} {:>8}\n", subject, count));
    }

    if !summary.by_month.is_empty() {
        out.push_str("\nBy month:\n");
        for (month, count) in &summary.by_month {
            out.push_str(&format!("  {:<20} {:>8}\n", month, count));
        }
    }
    if summary.undated > 0 {
        out.push_str(&format!("  {:<20} {:>8}\n", "(undated)", summary.undated));
    }
    out
}

/// Generate the markdown training report
pub fn training_report(outcome: &TrainingOutcome) -> String {
    let bundle = &outcome.bundle;
    let best = bundle.best_model();
    let mut report = String::new();

    report.push_str("# Fake News Classifier Training Report\n\n");
    report.push_str(&format!("**Generated:** {}\n\n", bundle.trained_at.format("%Y-%m-%d %H:%M:%S UTC")));
    report.push_str(&format!("**Version:** {}\n\n", bundle.version));

    report.push_str("## Dataset\n\n");
    report.push_str(&format!("- **Total Articles:** {}\n", outcome.dataset.total));
    report.push_str(&format!(
        "- **Split Sizes:** Train={}, Test={}\n",
        outcome.train_size, outcome.test_size
    ));
    report.push_str(&format!("- **Vocabulary:** {} terms\n\n", bundle.vectorizer.vocabulary_size()));

    report.push_str("| Label | Articles |\n|-------|----------|\n");
    for (label, count) in &outcome.dataset.by_label {
        report.push_str(&format!("| {} | {} |\n", label, count));
    }
    report.push_str("\n| Subject | Articles |\n|---------|----------|\n");
    for (subject, count) in &outcome.dataset.by_subject {
        report.push_str(&format!("| {} | {} |\n", subject, count));
    }
    report.push('\n');

    report.push_str("## Summary\n\n");
    report.push_str(&format!(
        "**Best Model:** {} (F1={:.4}, Accuracy={:.4})\n\n",
        best.kind(),
        best.metrics.f1_score,
        best.metrics.accuracy
    ));

    report.push_str("### Model Comparison\n\n");
    report.push_str("| Model | Accuracy | Precision | Recall | F1 Score | ROC-AUC | CV F1 |\n");
    report.push_str("|-------|----------|-----------|--------|----------|---------|-------|\n");
    for scored in &bundle.models {
        report.push_str(&format!(
            "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} | {} |\n",
            scored.kind(),
            scored.metrics.accuracy,
            scored.metrics.precision,
            scored.metrics.recall,
            scored.metrics.f1_score,
            scored.metrics.roc_auc,
            cv_cell(&scored.cv)
        ));
    }

    report.push_str("\n## Detailed Results\n\n");
    for scored in &bundle.models {
        report.push_str(&format!("### {}\n\n", scored.model.name()));
        report.push_str(&format!("*{}*\n\n", scored.model.description()));
        report.push_str(&format!("```\n{}\n```\n\n", scored.metrics.format()));
    }

    report.push_str("## Configuration\n\n");
    report.push_str(&format!(
        "```json\n{}\n```\n",
        serde_json::to_string_pretty(&outcome.config).unwrap_or_default()
    ));

    report
}

/// Write `report.md` into the model directory
pub fn save_report(outcome: &TrainingOutcome, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, training_report(outcome))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Report saved to {}", path.display());
    Ok(path)
}

/// Human-readable verdict for one article
pub fn format_prediction(result: &PredictionResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "=".repeat(60)));
    out.push_str(&format!(
        "Prediction: {} NEWS (confidence {:.1}%)\n",
        result.label.as_str().to_uppercase(),
        result.confidence() * 100.0
    ));
    out.push_str(&format!(
        "P(fake) = {:.4}, P(true) = {:.4} [{}]\n",
        result.probabilities.0, result.probabilities.1, result.model
    ));
    out.push_str(&format!("{}\n", "=".repeat(60)));

    out.push_str("\nPer-model P(fake):\n");
    for mp in &result.model_probabilities {
        out.push_str(&format!("  {:<22} {:>8.4}\n", mp.model.to_string(), mp.fake_probability));
    }

    if let Some(explanation) = &result.explanation {
        out.push_str("\nExplanation (positive = toward fake):\n");
        for tw in &explanation.token_weights {
            out.push_str(&format!("  {:<22} {:>+8.4}\n", tw.token, tw.weight));
        }
        out.push_str(&format!("\n{}\n", explanation.summary));
    }

    if let Some(sentiment) = &result.sentiment {
        out.push_str(&format!(
            "\nSentiment ({}): {} ({:.1}%)\n",
            sentiment.source,
            sentiment.polarity,
            sentiment.score * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;
    use crate::features::VectorizerParams;
    use crate::training::{Trainer, TrainingConfig};

    fn outcome() -> TrainingOutcome {
        let config = TrainingConfig {
            cv_folds: 2,
            show_progress: false,
            models: vec![ModelKind::NaiveBayes, ModelKind::LogisticRegression],
            vectorizer: VectorizerParams {
                min_df: 1,
                ..VectorizerParams::default()
            },
            ..TrainingConfig::default()
        };
        Trainer::new(config).train(&Dataset::synthetic(40, 11)).unwrap()
    }

    #[test]
    fn test_training_report_sections() {
        let outcome = outcome();
        let report = training_report(&outcome);

        assert!(report.contains("Fake News Classifier Training Report"));
        assert!(report.contains("Model Comparison"));
        assert!(report.contains("| naive-bayes |"));
        assert!(report.contains("Best Model"));
        assert!(report.contains("\"cv_folds\": 2"));

        let dir = tempfile::tempdir().unwrap();
        let path = save_report(&outcome, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), report);
    }

    #[test]
    fn test_metrics_table_marks_best() {
        let outcome = outcome();
        let table = metrics_table(&outcome);
        let best = outcome.bundle.best_model().kind();
        assert!(table.contains(&format!("{} *", best)));
        assert_eq!(table.matches(" *").count(), 1);
    }

    #[test]
    fn test_dataset_tables() {
        let summary = Dataset::synthetic(10, 0).summary();
        let tables = dataset_tables(&summary);
        assert!(tables.starts_with("Articles: 10"));
        assert!(tables.contains("fake"));
        assert!(tables.contains("By month:"));
    }
}
