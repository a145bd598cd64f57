// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for injury-crash classification
//!
//! Implements the per-fold metric set:
//! - Accuracy, Precision, Recall, F1 at a fixed threshold
//! - Log-loss on the predicted probabilities
//! - AUC-ROC on the predicted probabilities
//!
//! Zero-division and single-class behavior follows scikit-learn: undefined
//! precision/recall/F1 become 0.0 with a warning, while log-loss and AUC-ROC
//! refuse to score a fold holding a single class.

use crate::curves::{auc, check_lengths, has_both_classes, roc_curve};
use crate::datasets::FoldData;
use crate::error::MetricError;
use serde::{Deserialize, Serialize};

/// Metric names, in the column order of the scores table
pub const METRIC_NAMES: [&str; 6] = [
    "accuracy",
    "F1",
    "precision",
    "recall",
    "neg_log_loss",
    "roc_auc",
];

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Injury crashes predicted as injury crashes
    pub tp: usize,
    /// Non-injury crashes predicted as such
    pub tn: usize,
    /// Non-injury crashes predicted as injury crashes
    pub fp: usize,
    /// Injury crashes missed by the model
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Create from predictions and ground truth labels
    pub fn from_predictions(y_pred: &[bool], y_true: &[bool]) -> Result<Self, MetricError> {
        check_lengths("confusion_matrix", y_true, y_pred.len())?;

        let mut matrix = Self::default();
        for (&pred, &truth) in y_pred.iter().zip(y_true) {
            match (pred, truth) {
                (true, true) => matrix.tp += 1,
                (false, false) => matrix.tn += 1,
                (true, false) => matrix.fp += 1,
                (false, true) => matrix.fn_ += 1,
            }
        }
        Ok(matrix)
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            tracing::warn!("Precision is ill-defined with no predicted positives; using 0.0");
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// Recall: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            tracing::warn!("Recall is ill-defined with no true positives; using 0.0");
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// F1 Score: 2TP / (2TP + FP + FN)
    pub fn f1_score(&self) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_;
        if denom == 0 {
            tracing::warn!("F1 is ill-defined with no true or predicted positives; using 0.0");
            return 0.0;
        }
        (2 * self.tp) as f64 / denom as f64
    }
}

/// Mean negative log-likelihood of the labels under the probabilities
///
/// Probabilities are clipped to `[eps, 1 - eps]` with `eps` the f64
/// machine epsilon.
pub fn log_loss(y_true: &[bool], y_prob: &[f64]) -> Result<f64, MetricError> {
    check_lengths("log_loss", y_true, y_prob.len())?;
    if !has_both_classes(y_true) {
        return Err(MetricError::SingleClass { metric: "log_loss" });
    }

    let eps = f64::EPSILON;
    let total: f64 = y_true
        .iter()
        .zip(y_prob)
        .map(|(&truth, &prob)| {
            let p = prob.clamp(eps, 1.0 - eps);
            if truth {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();

    Ok(total / y_true.len() as f64)
}

/// Area under the ROC curve
pub fn roc_auc_score(y_true: &[bool], y_score: &[f64]) -> Result<f64, MetricError> {
    check_lengths("roc_auc", y_true, y_score.len())?;
    if !has_both_classes(y_true) {
        return Err(MetricError::SingleClass { metric: "roc_auc" });
    }
    let roc = roc_curve(y_true, y_score, true)?;
    Ok(auc(&roc.fpr, &roc.tpr))
}

/// Scores of one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScores {
    pub fold: String,
    pub accuracy: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub neg_log_loss: f64,
    pub roc_auc: f64,
}

impl FoldScores {
    /// Compute every metric of a fold
    pub fn compute(fold: &FoldData) -> Result<Self, MetricError> {
        let cm = ConfusionMatrix::from_predictions(&fold.y_pred, &fold.y_true)?;
        let neg_log_loss = log_loss(&fold.y_true, &fold.y_prob)?;
        let roc_auc = roc_auc_score(&fold.y_true, &fold.y_prob)?;

        tracing::debug!(
            "Fold '{}': tp={} tn={} fp={} fn={}",
            fold.name,
            cm.tp,
            cm.tn,
            cm.fp,
            cm.fn_
        );

        Ok(Self {
            fold: fold.name.clone(),
            accuracy: cm.accuracy(),
            f1: cm.f1_score(),
            precision: cm.precision(),
            recall: cm.recall(),
            neg_log_loss,
            roc_auc,
        })
    }

    /// Metric values paired with their names, in column order
    pub fn values(&self) -> [(&'static str, f64); 6] {
        [
            (METRIC_NAMES[0], self.accuracy),
            (METRIC_NAMES[1], self.f1),
            (METRIC_NAMES[2], self.precision),
            (METRIC_NAMES[3], self.recall),
            (METRIC_NAMES[4], self.neg_log_loss),
            (METRIC_NAMES[5], self.roc_auc),
        ]
    }
}

/// Format fold scores as a fixed-width table
pub fn format_scores(scores: &[FoldScores]) -> String {
    let mut output = format!("{:<10}", "Fold");
    for name in METRIC_NAMES {
        output.push_str(&format!(" {:>12}", name));
    }
    output.push('\n');
    output.push_str(&format!("{:-<88}\n", ""));

    for score in scores {
        output.push_str(&format!("{:<10}", score.fold));
        for (_, value) in score.values() {
            output.push_str(&format!(" {:>12.4}", value));
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fold(name: &str, y_true: Vec<bool>, y_prob: Vec<f64>) -> FoldData {
        let y_pred = y_prob.iter().map(|&p| p > 0.5).collect();
        FoldData {
            name: name.to_string(),
            y_true,
            y_prob,
            y_pred,
        }
    }

    #[test]
    fn test_confusion_matrix_perfect() {
        let y_true = vec![true, true, false, false];
        let y_pred = vec![true, true, false, false];

        let cm = ConfusionMatrix::from_predictions(&y_pred, &y_true).unwrap();

        assert_eq!(cm.tp, 2);
        assert_eq!(cm.tn, 2);
        assert_eq!(cm.fp, 0);
        assert_eq!(cm.fn_, 0);
        assert!((cm.accuracy() - 1.0).abs() < 1e-12);
        assert!((cm.f1_score() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix_mixed() {
        let y_true = vec![true, true, true, false, false];
        let y_pred = vec![true, false, true, true, false];

        let cm = ConfusionMatrix::from_predictions(&y_pred, &y_true).unwrap();

        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
        assert!((cm.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.f1_score() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let y_true = vec![true, false];
        let y_pred = vec![false, false];

        let cm = ConfusionMatrix::from_predictions(&y_pred, &y_true).unwrap();
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
    }

    #[test]
    fn test_log_loss_sklearn_parity() {
        // sklearn: log_loss(["spam", "ham", "ham", "spam"],
        //                   [[.1, .9], [.9, .1], [.8, .2], [.35, .65]]) = 0.21616187468057912
        let y_true = [true, false, false, true];
        let y_prob = [0.9, 0.1, 0.2, 0.65];

        let loss = log_loss(&y_true, &y_prob).unwrap();
        assert!(
            (loss - 0.21616187468057912).abs() < 1e-9,
            "Log loss {loss} does not match sklearn reference"
        );
    }

    #[test]
    fn test_log_loss_clips_certain_mistakes() {
        let loss = log_loss(&[true, false], &[0.0, 0.0]).unwrap();
        let expected = -(f64::EPSILON.ln()) / 2.0;
        assert!(loss.is_finite());
        assert!((loss - expected).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_sklearn_parity() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) = 0.75
        let auc = roc_auc_score(&[false, false, true, true], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y_true = [true, true, false, false];
        assert!((roc_auc_score(&y_true, &[0.9, 0.8, 0.2, 0.1]).unwrap() - 1.0).abs() < 1e-12);
        assert!(roc_auc_score(&y_true, &[0.1, 0.2, 0.8, 0.9]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_an_error() {
        let y_true = [false, false, false];
        let y_prob = [0.1, 0.6, 0.3];

        assert_eq!(
            roc_auc_score(&y_true, &y_prob).unwrap_err(),
            MetricError::SingleClass { metric: "roc_auc" }
        );
        assert_eq!(
            log_loss(&y_true, &y_prob).unwrap_err(),
            MetricError::SingleClass { metric: "log_loss" }
        );
        assert!(FoldScores::compute(&fold("train", y_true.to_vec(), y_prob.to_vec())).is_err());
    }

    #[test]
    fn test_fold_scores_perfect_fold() {
        let scores = FoldScores::compute(&fold("train", vec![false, true], vec![0.2, 0.8])).unwrap();
        assert_eq!(scores.fold, "train");
        assert_eq!(scores.accuracy, 1.0);
        assert_eq!(scores.f1, 1.0);
        assert_eq!(scores.precision, 1.0);
        assert_eq!(scores.recall, 1.0);
        assert_eq!(scores.roc_auc, 1.0);
        assert!((scores.neg_log_loss - 0.2231435513142097).abs() < 1e-9);

        let names: Vec<&str> = scores.values().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, METRIC_NAMES);
    }

    #[test]
    fn test_format_scores() {
        let scores = FoldScores::compute(&fold("test", vec![false, true], vec![0.1, 0.9])).unwrap();
        let table = format_scores(&[scores]);
        assert!(table.starts_with("Fold"));
        assert!(table.contains("roc_auc"));
        assert!(table.contains("test"));
        assert!(table.contains("1.0000"));
    }

    proptest! {
        #[test]
        fn prop_metrics_within_bounds(
            rows in prop::collection::vec((any::<bool>(), 0.0f64..=1.0), 2..60)
        ) {
            let mut y_true: Vec<bool> = rows.iter().map(|(t, _)| *t).collect();
            let y_prob: Vec<f64> = rows.iter().map(|(_, p)| *p).collect();
            y_true[0] = true;
            y_true[1] = false;

            let scores = FoldScores::compute(&fold("train", y_true, y_prob)).unwrap();
            for (_, value) in scores.values() {
                prop_assert!(value.is_finite());
            }
            prop_assert!((0.0..=1.0).contains(&scores.accuracy));
            prop_assert!((0.0..=1.0).contains(&scores.f1));
            prop_assert!((0.0..=1.0).contains(&scores.precision));
            prop_assert!((0.0..=1.0).contains(&scores.recall));
            prop_assert!((0.0..=1.0).contains(&scores.roc_auc));
            prop_assert!(scores.neg_log_loss >= 0.0);
        }

        #[test]
        fn prop_correct_predictions_score_one(
            labels in prop::collection::vec(any::<bool>(), 2..40)
        ) {
            let mut y_true = labels;
            y_true[0] = true;
            y_true[1] = false;
            let y_prob: Vec<f64> = y_true.iter().map(|&t| if t { 0.9 } else { 0.1 }).collect();

            let scores = FoldScores::compute(&fold("test", y_true, y_prob)).unwrap();
            prop_assert_eq!(scores.accuracy, 1.0);
            prop_assert_eq!(scores.f1, 1.0);
        }
    }
}
