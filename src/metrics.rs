// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for fake/true classification
//!
//! Implements standard binary metrics with "fake" as the positive class:
//! - Confusion Matrix
//! - Accuracy, Precision, Recall, F1-Score, MCC
//! - ROC-AUC, average precision and Brier score from probabilities
//! - Cross-validated F1 summaries

use crate::datasets::Label;
use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Fake articles predicted fake
    pub tp: usize,
    /// True articles predicted true
    pub tn: usize,
    /// True articles predicted fake
    pub fp: usize,
    /// Fake articles predicted true
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Create from predictions and ground truth labels
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        assert_eq!(predictions.len(), ground_truth.len(), "Prediction and ground truth lengths must match");

        let mut matrix = Self::default();
        for (pred, truth) in predictions.iter().zip(ground_truth) {
            match (pred, truth) {
                (Label::Fake, Label::Fake) => matrix.tp += 1,
                (Label::Real, Label::Real) => matrix.tn += 1,
                (Label::Fake, Label::Real) => matrix.fp += 1,
                (Label::Real, Label::Fake) => matrix.fn_ += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    /// F1 Score: harmonic mean of precision and recall
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }

    /// Matthews Correlation Coefficient, from -1 to 1
    pub fn mcc(&self) -> f64 {
        let (tp, tn, fp, fn_) = (self.tp as f64, self.tn as f64, self.fp as f64, self.fn_ as f64);
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denominator == 0.0 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denominator
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// Metrics of one model on a held-out split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mcc: f64,
    pub roc_auc: f64,
    pub average_precision: f64,
    pub brier_score: f64,
    pub support: usize,
}

impl EvaluationMetrics {
    /// Create from P(fake) scores; predictions use the 0.5 threshold
    pub fn from_probabilities(ground_truth: &[Label], probabilities: &[f64]) -> Self {
        let predictions: Vec<Label> = probabilities.iter().map(|p| Label::from_probability(*p)).collect();
        let cm = ConfusionMatrix::from_predictions(&predictions, ground_truth);

        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            mcc: cm.mcc(),
            roc_auc: roc_auc(ground_truth, probabilities),
            average_precision: average_precision(ground_truth, probabilities),
            brier_score: brier_score(ground_truth, probabilities),
            support: cm.total(),
            confusion_matrix: cm,
        }
    }

    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let cm = &self.confusion_matrix;
        format!(
            r#"Accuracy:          {:.4}
Precision:         {:.4}
Recall:            {:.4}
F1 Score:          {:.4}
MCC:               {:.4}
ROC-AUC:           {:.4}
Average Precision: {:.4}
Brier Score:       {:.4}
Support:           {}

Confusion Matrix:
               Predicted
               Fake      True
Actual Fake  {:>6}    {:>6}
       True  {:>6}    {:>6}
"#,
            self.accuracy,
            self.precision,
            self.recall,
            self.f1_score,
            self.mcc,
            self.roc_auc,
            self.average_precision,
            self.brier_score,
            self.support,
            cm.tp,
            cm.fn_,
            cm.fp,
            cm.tn,
        )
    }
}

/// Pairs sorted by descending score
fn ranked(ground_truth: &[Label], probabilities: &[f64]) -> Vec<(Label, f64)> {
    let mut pairs: Vec<(Label, f64)> = ground_truth.iter().copied().zip(probabilities.iter().copied()).collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

/// ROC-AUC by the trapezoidal rule; tied scores form a single ROC step
pub fn roc_auc(ground_truth: &[Label], probabilities: &[f64]) -> f64 {
    let pairs = ranked(ground_truth, probabilities);
    let n_pos = pairs.iter().filter(|(l, _)| *l == Label::Fake).count() as f64;
    let n_neg = pairs.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5;
    }

    let (mut tp, mut fp) = (0.0, 0.0);
    let (mut tpr_prev, mut fpr_prev) = (0.0, 0.0);
    let mut auc = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let score = pairs[i].1;
        while i < pairs.len() && pairs[i].1 == score {
            if pairs[i].0 == Label::Fake {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        let (tpr, fpr) = (tp / n_pos, fp / n_neg);
        auc += (fpr - fpr_prev) * (tpr + tpr_prev) / 2.0;
        tpr_prev = tpr;
        fpr_prev = fpr;
    }
    auc
}

/// Area under the precision-recall curve (step interpolation)
pub fn average_precision(ground_truth: &[Label], probabilities: &[f64]) -> f64 {
    let pairs = ranked(ground_truth, probabilities);
    let n_pos = pairs.iter().filter(|(l, _)| *l == Label::Fake).count() as f64;
    if n_pos == 0.0 {
        return 0.0;
    }

    let (mut tp, mut fp, mut ap, mut prev_recall) = (0.0, 0.0, 0.0, 0.0);
    for (label, _) in &pairs {
        if *label == Label::Fake {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let recall = tp / n_pos;
        if *label == Label::Fake {
            ap += tp / (tp + fp) * (recall - prev_recall);
        }
        prev_recall = recall;
    }
    ap
}

/// Mean squared error of P(fake); lower is better
pub fn brier_score(ground_truth: &[Label], probabilities: &[f64]) -> f64 {
    if ground_truth.is_empty() {
        return 1.0;
    }
    let sum: f64 = ground_truth
        .iter()
        .zip(probabilities)
        .map(|(label, p)| (p - label.to_binary() as f64).powi(2))
        .sum();
    sum / ground_truth.len() as f64
}

/// F1 scores collected across cross-validation folds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossValidationScores {
    pub fold_f1: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation across folds
    pub std: f64,
}

impl CrossValidationScores {
    pub fn from_folds(fold_f1: Vec<f64>) -> Self {
        if fold_f1.is_empty() {
            return Self::default();
        }
        let n = fold_f1.len() as f64;
        let mean = fold_f1.iter().sum::<f64>() / n;
        let std = (fold_f1.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self { fold_f1, mean, std }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::datasets::Label::{Fake, Real};

    #[test]
    fn test_confusion_matrix_perfect() {
        let cm = ConfusionMatrix::from_predictions(&[Fake, Fake, Real, Real], &[Fake, Fake, Real, Real]);

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (2, 2, 0, 0));
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!((cm.f1_score() - 1.0).abs() < 1e-6);
        assert!((cm.mcc() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confusion_matrix_worst() {
        let cm = ConfusionMatrix::from_predictions(&[Real, Real, Fake, Fake], &[Fake, Fake, Real, Real]);

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (0, 0, 2, 2));
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
        assert!((cm.mcc() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_precision_recall() {
        // 2 fake predicted fake, 1 true predicted fake, 1 fake missed
        let cm = ConfusionMatrix::from_predictions(&[Fake, Fake, Fake, Real], &[Fake, Fake, Real, Fake]);
        assert!((cm.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.f1_score() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let truth = [Fake, Fake, Real, Real];
        assert!((roc_auc(&truth, &[0.9, 0.8, 0.2, 0.1]) - 1.0).abs() < 1e-12);
        assert!(roc_auc(&truth, &[0.1, 0.2, 0.8, 0.9]).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        let truth = [Fake, Real];
        assert!((roc_auc(&truth, &[0.5, 0.5]) - 0.5).abs() < 1e-12);
        assert_eq!(roc_auc(&[Fake, Fake], &[0.3, 0.7]), 0.5);
    }

    #[test]
    fn test_brier_and_average_precision() {
        assert!(brier_score(&[Fake, Real], &[1.0, 0.0]).abs() < 1e-12);
        assert!((brier_score(&[Fake, Real], &[0.5, 0.5]) - 0.25).abs() < 1e-12);
        assert!((average_precision(&[Fake, Real, Fake], &[0.9, 0.8, 0.7]) - (0.5 + 2.0 / 3.0 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_from_probabilities() {
        let metrics = EvaluationMetrics::from_probabilities(&[Fake, Real, Fake, Real], &[0.9, 0.4, 0.3, 0.1]);
        assert_eq!(metrics.confusion_matrix.tp, 1);
        assert_eq!(metrics.confusion_matrix.fn_, 1);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert!(metrics.format().contains("Confusion Matrix"));
    }

    #[test]
    fn test_cross_validation_scores() {
        let scores = CrossValidationScores::from_folds(vec![0.8, 0.9, 1.0]);
        assert!((scores.mean - 0.9).abs() < 1e-12);
        assert!((scores.std - (0.02f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(CrossValidationScores::from_folds(Vec::new()).mean, 0.0);
    }
}
