// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Diagnostic curves for binary classifiers
//!
//! ROC, precision-recall and calibration curves, with the point sets and
//! ordering conventions of scikit-learn so plotted curves and derived areas
//! match results obtained there.

use crate::datasets::FoldData;
use crate::error::MetricError;
use serde::{Deserialize, Serialize};

/// False and true positive rates across all score thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decreasing thresholds; the first one is `+inf`
    pub thresholds: Vec<f64>,
}

/// Precision and recall across all score thresholds, recall decreasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    /// Increasing thresholds, one fewer than points
    pub thresholds: Vec<f64>,
}

/// Observed frequency and mean predicted probability per non-empty bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub prob_true: Vec<f64>,
    pub prob_pred: Vec<f64>,
}

/// All curves of one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldCurves {
    pub fold: String,
    pub roc: RocCurve,
    pub precision_recall: PrecisionRecallCurve,
    pub calibration: CalibrationCurve,
}

impl FoldCurves {
    pub fn compute(fold: &FoldData, calibration_bins: usize) -> Result<Self, MetricError> {
        Ok(Self {
            fold: fold.name.clone(),
            roc: roc_curve(&fold.y_true, &fold.y_prob, true)?,
            precision_recall: precision_recall_curve(&fold.y_true, &fold.y_prob)?,
            calibration: calibration_curve(&fold.y_true, &fold.y_prob, calibration_bins)?,
        })
    }
}

pub(crate) fn check_lengths(
    metric: &'static str,
    y_true: &[bool],
    predicted: usize,
) -> Result<(), MetricError> {
    if y_true.len() != predicted {
        return Err(MetricError::LengthMismatch {
            metric,
            truth: y_true.len(),
            predicted,
        });
    }
    if y_true.is_empty() {
        return Err(MetricError::Empty { metric });
    }
    Ok(())
}

pub(crate) fn has_both_classes(y_true: &[bool]) -> bool {
    y_true.iter().any(|&t| t) && y_true.iter().any(|&t| !t)
}

/// Cumulative false and true positive counts per distinct score
///
/// Returns `(fps, tps, thresholds)` with thresholds decreasing.
fn binary_clf_curve(y_true: &[bool], y_score: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, bool)> = y_score.iter().copied().zip(y_true.iter().copied()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut fps = Vec::new();
    let mut tps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0.0;
    let mut fp = 0.0;

    for (i, &(score, positive)) in pairs.iter().enumerate() {
        if positive {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_run = pairs.get(i + 1).map_or(true, |next| next.0 != score);
        if last_of_run {
            fps.push(fp);
            tps.push(tp);
            thresholds.push(score);
        }
    }

    (fps, tps, thresholds)
}

/// Receiver operating characteristic curve
///
/// With `drop_intermediate`, points lying on a straight segment between
/// their neighbours are removed; the area under the curve is unchanged.
pub fn roc_curve(
    y_true: &[bool],
    y_score: &[f64],
    drop_intermediate: bool,
) -> Result<RocCurve, MetricError> {
    check_lengths("roc_curve", y_true, y_score.len())?;
    if !has_both_classes(y_true) {
        return Err(MetricError::SingleClass { metric: "roc_curve" });
    }

    let (mut fps, mut tps, mut thresholds) = binary_clf_curve(y_true, y_score);

    if drop_intermediate && fps.len() > 2 {
        let n = fps.len();
        let keep: Vec<bool> = (0..n)
            .map(|i| {
                if i == 0 || i == n - 1 {
                    return true;
                }
                let fps_bend = fps[i + 1] - 2.0 * fps[i] + fps[i - 1];
                let tps_bend = tps[i + 1] - 2.0 * tps[i] + tps[i - 1];
                fps_bend != 0.0 || tps_bend != 0.0
            })
            .collect();
        let select = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .zip(&keep)
                .filter(|&(_, &k)| k)
                .map(|(&v, _)| v)
                .collect()
        };
        fps = select(&fps);
        tps = select(&tps);
        thresholds = select(&thresholds);
    }

    fps.insert(0, 0.0);
    tps.insert(0, 0.0);
    thresholds.insert(0, f64::INFINITY);

    let total_neg = fps[fps.len() - 1];
    let total_pos = tps[tps.len() - 1];

    Ok(RocCurve {
        fpr: fps.iter().map(|v| v / total_neg).collect(),
        tpr: tps.iter().map(|v| v / total_pos).collect(),
        thresholds,
    })
}

/// Precision-recall pairs for every distinct score threshold
///
/// The last point is always `(recall 0, precision 1)` and has no threshold.
pub fn precision_recall_curve(
    y_true: &[bool],
    y_score: &[f64],
) -> Result<PrecisionRecallCurve, MetricError> {
    check_lengths("precision_recall_curve", y_true, y_score.len())?;

    let (fps, tps, thresholds) = binary_clf_curve(y_true, y_score);
    let total_pos = tps[tps.len() - 1];

    let mut precision: Vec<f64> = fps
        .iter()
        .zip(&tps)
        .map(|(fp, tp)| if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 })
        .collect();
    let mut recall: Vec<f64> = if total_pos == 0.0 {
        tracing::warn!("No positive class found in y_true, recall is set to one for all thresholds");
        vec![1.0; tps.len()]
    } else {
        tps.iter().map(|tp| tp / total_pos).collect()
    };

    precision.reverse();
    recall.reverse();
    precision.push(1.0);
    recall.push(0.0);

    let mut thresholds = thresholds;
    thresholds.reverse();

    Ok(PrecisionRecallCurve {
        precision,
        recall,
        thresholds,
    })
}

/// Reliability curve over `n_bins` uniform bins of `[0, 1]`
pub fn calibration_curve(
    y_true: &[bool],
    y_prob: &[f64],
    n_bins: usize,
) -> Result<CalibrationCurve, MetricError> {
    check_lengths("calibration_curve", y_true, y_prob.len())?;
    if let Some(&value) = y_prob.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(MetricError::ProbabilityOutOfRange {
            metric: "calibration_curve",
            value,
        });
    }
    let n_bins = n_bins.max(1);

    let step = 1.0 / n_bins as f64;
    let inner_edges: Vec<f64> = (1..n_bins).map(|i| i as f64 * step).collect();

    let mut bin_sums = vec![0.0; n_bins];
    let mut bin_true = vec![0.0; n_bins];
    let mut bin_total = vec![0usize; n_bins];

    for (&truth, &prob) in y_true.iter().zip(y_prob) {
        let bin = inner_edges.partition_point(|&edge| edge < prob);
        bin_sums[bin] += prob;
        if truth {
            bin_true[bin] += 1.0;
        }
        bin_total[bin] += 1;
    }

    let mut prob_true = Vec::new();
    let mut prob_pred = Vec::new();
    for bin in 0..n_bins {
        if bin_total[bin] == 0 {
            continue;
        }
        let total = bin_total[bin] as f64;
        prob_true.push(bin_true[bin] / total);
        prob_pred.push(bin_sums[bin] / total);
    }

    Ok(CalibrationCurve {
        prob_true,
        prob_pred,
    })
}

/// Area under a curve by the trapezoidal rule
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} vs {:?}", actual, expected);
        }
    }

    // sklearn documentation example: y_true = [0, 0, 1, 1],
    // scores = [0.1, 0.4, 0.35, 0.8]
    const Y_TRUE: [bool; 4] = [false, false, true, true];
    const SCORES: [f64; 4] = [0.1, 0.4, 0.35, 0.8];

    #[test]
    fn test_roc_curve_sklearn_parity() {
        let roc = roc_curve(&Y_TRUE, &SCORES, true).unwrap();
        assert_close(&roc.fpr, &[0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_close(&roc.tpr, &[0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(roc.thresholds[0].is_infinite());
        assert_close(&roc.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn test_roc_curve_drops_collinear_points() {
        let y_true = [true, true, true, false, false, false];
        let scores = [0.9, 0.8, 0.7, 0.3, 0.2, 0.1];

        let full = roc_curve(&y_true, &scores, false).unwrap();
        let dropped = roc_curve(&y_true, &scores, true).unwrap();

        assert_eq!(full.fpr.len(), 7);
        assert_close(&dropped.fpr, &[0.0, 0.0, 0.0, 1.0]);
        assert_close(&dropped.tpr, &[0.0, 1.0 / 3.0, 1.0, 1.0]);
        assert!((auc(&full.fpr, &full.tpr) - auc(&dropped.fpr, &dropped.tpr)).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_ties_share_a_point() {
        let y_true = [true, false, true, false];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let roc = roc_curve(&y_true, &scores, true).unwrap();
        assert_close(&roc.fpr, &[0.0, 1.0]);
        assert_close(&roc.tpr, &[0.0, 1.0]);
        assert!((auc(&roc.fpr, &roc.tpr) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_single_class() {
        let err = roc_curve(&[true, true], &[0.2, 0.9], true).unwrap_err();
        assert_eq!(err, MetricError::SingleClass { metric: "roc_curve" });
    }

    #[test]
    fn test_precision_recall_sklearn_parity() {
        let pr = precision_recall_curve(&Y_TRUE, &SCORES).unwrap();
        assert_close(&pr.precision, &[0.5, 2.0 / 3.0, 0.5, 1.0, 1.0]);
        assert_close(&pr.recall, &[1.0, 1.0, 0.5, 0.5, 0.0]);
        assert_close(&pr.thresholds, &[0.1, 0.35, 0.4, 0.8]);
    }

    #[test]
    fn test_calibration_curve_sklearn_parity() {
        // sklearn documentation example with n_bins=3
        let y_true = [false, false, false, false, true, true, true, true, true];
        let y_pred = [0.1, 0.2, 0.3, 0.4, 0.65, 0.7, 0.8, 0.9, 1.0];

        let curve = calibration_curve(&y_true, &y_pred, 3).unwrap();
        assert_close(&curve.prob_true, &[0.0, 0.5, 1.0]);
        assert_close(&curve.prob_pred, &[0.2, 0.525, 0.85]);
    }

    #[test]
    fn test_calibration_curve_edges_fall_left() {
        // 0.2 sits on the first inner edge of 5 bins and belongs to bin 0
        let curve = calibration_curve(&[false, true], &[0.2, 0.21], 5).unwrap();
        assert_close(&curve.prob_pred, &[0.2, 0.21]);
        assert_close(&curve.prob_true, &[0.0, 1.0]);
    }

    #[test]
    fn test_calibration_curve_rejects_out_of_range() {
        let err = calibration_curve(&[true], &[1.5], 5).unwrap_err();
        assert!(matches!(err, MetricError::ProbabilityOutOfRange { .. }));
    }

    #[test]
    fn test_length_mismatch() {
        let err = precision_recall_curve(&[true, false], &[0.5]).unwrap_err();
        assert!(matches!(err, MetricError::LengthMismatch { truth: 2, predicted: 1, .. }));
    }

    #[test]
    fn test_auc_unit_square() {
        assert!((auc(&[0.0, 1.0], &[1.0, 1.0]) - 1.0).abs() < 1e-12);
        assert!((auc(&[0.0, 0.5, 1.0], &[0.0, 0.5, 1.0]) - 0.5).abs() < 1e-12);
    }
}
