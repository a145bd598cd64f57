// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Scoring of one model run
//!
//! Orchestrates:
//! - Loading ground truth and predictions
//! - Thresholding and grouping by fold
//! - Per-fold metrics and diagnostic curves
//! - Writing `scores.csv` and `curves.png`

use crate::artifacts::{format_float, write_all, Artifact};
use crate::config::{DegenerateFoldPolicy, ScoringConfig};
use crate::curves::FoldCurves;
use crate::datasets::{LabeledDataset, Predictions, ScoredDataset, FOLD_COLUMN};
use crate::error::{EvalError, EvalResult};
use crate::figures::render_curves;
use crate::metrics::{format_scores, FoldScores, METRIC_NAMES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the per-fold scores table
pub const SCORES_FILE: &str = "scores.csv";
/// File name of the diagnostic curves figure
pub const CURVES_FILE: &str = "curves.png";

/// Scores and curves of every scored fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub scores: Vec<FoldScores>,
    pub curves: Vec<FoldCurves>,
    /// Folds left out under the skip policy
    pub skipped: Vec<String>,
}

impl ScoreReport {
    /// Encode the scores as a delimited table, one row per fold
    pub fn scores_csv(&self) -> EvalResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec![FOLD_COLUMN];
        header.extend(METRIC_NAMES);
        writer
            .write_record(&header)
            .map_err(|e| EvalError::csv(SCORES_FILE, e))?;

        for score in &self.scores {
            let mut record = vec![score.fold.clone()];
            record.extend(score.values().iter().map(|(_, v)| format_float(*v)));
            writer
                .write_record(&record)
                .map_err(|e| EvalError::csv(SCORES_FILE, e))?;
        }

        writer
            .into_inner()
            .map_err(|e| EvalError::io(SCORES_FILE, e.into_error()))
    }

    /// Human-readable table of the scores
    pub fn format(&self) -> String {
        let mut output = format_scores(&self.scores);
        if !self.skipped.is_empty() {
            output.push_str(&format!("Skipped folds: {}\n", self.skipped.join(", ")));
        }
        output
    }
}

/// Paths written by a scoring run
#[derive(Debug, Clone)]
pub struct ScoreOutputs {
    pub report: ScoreReport,
    pub scores_path: PathBuf,
    pub curves_path: PathBuf,
}

/// Computes per-fold scores and curves for one dataset and predictions pair
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score every fold of an already joined dataset
    pub fn evaluate(&self, data: &ScoredDataset) -> EvalResult<ScoreReport> {
        let mut scores = Vec::new();
        let mut curves = Vec::new();
        let mut skipped = Vec::new();

        for fold in data.folds() {
            let computed = FoldScores::compute(&fold).and_then(|score| {
                FoldCurves::compute(&fold, self.config.calibration_bins).map(|curve| (score, curve))
            });

            match computed {
                Ok((score, curve)) => {
                    tracing::info!(
                        "Fold '{}' ({} rows) - Accuracy: {:.4}, F1: {:.4}, AUC-ROC: {:.4}",
                        fold.name,
                        fold.len(),
                        score.accuracy,
                        score.f1,
                        score.roc_auc
                    );
                    scores.push(score);
                    curves.push(curve);
                }
                Err(source) => match self.config.degenerate_folds {
                    DegenerateFoldPolicy::Fail => {
                        return Err(EvalError::DegenerateFold {
                            fold: fold.name.clone(),
                            source,
                        });
                    }
                    DegenerateFoldPolicy::Skip => {
                        tracing::warn!("Skipping fold '{}': {}", fold.name, source);
                        skipped.push(fold.name.clone());
                    }
                },
            }
        }

        Ok(ScoreReport {
            scores,
            curves,
            skipped,
        })
    }

    /// Load both inputs, score them and write `scores.csv` and `curves.png`
    pub fn score(
        &self,
        dataset_path: &Path,
        predictions_path: &Path,
        output_folder: &Path,
    ) -> EvalResult<ScoreOutputs> {
        let join_key = self.config.join_key.as_deref();
        let dataset = LabeledDataset::load(dataset_path, join_key)?;
        let predictions = Predictions::load(predictions_path, join_key)?;
        let data = ScoredDataset::join(&dataset, &predictions, self.config.threshold)?;

        let report = self.evaluate(&data)?;
        let scores_csv = report.scores_csv()?;
        let curves_png = render_curves(&report.curves, &self.config.style)?;

        let paths = write_all(
            output_folder,
            &[
                Artifact::new(SCORES_FILE, scores_csv),
                Artifact::new(CURVES_FILE, curves_png),
            ],
        )?;

        Ok(ScoreOutputs {
            report,
            scores_path: paths[0].clone(),
            curves_path: paths[1].clone(),
        })
    }
}

/// Score with the default configuration
pub fn score(
    dataset_path: &Path,
    predictions_path: &Path,
    output_folder: &Path,
) -> EvalResult<ScoreOutputs> {
    Scorer::new(ScoringConfig::default()).score(dataset_path, predictions_path, output_folder)
}
