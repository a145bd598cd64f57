// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Scoring and comparison reports for injury-crash classifiers
//!
//! This crate provides:
//! - Loading of labeled crash records and model predictions
//! - Per-fold metrics (Accuracy, F1, Precision, Recall, Log loss, AUC-ROC)
//! - ROC, precision-recall and calibration curves
//! - Rendering of curve and comparison figures to PNG
//! - Merging scores of several runs into one summary
//! - Synthetic datasets with seeded randomness

pub mod artifacts;
pub mod canvas;
pub mod config;
pub mod curves;
pub mod datasets;
pub mod error;
pub mod figures;
pub mod metrics;
pub mod scorer;
pub mod summary;

pub use config::{DegenerateFoldPolicy, PlotStyle, ScoringConfig, SummaryConfig};
pub use curves::{CalibrationCurve, FoldCurves, PrecisionRecallCurve, RocCurve};
pub use datasets::{FoldData, LabeledDataset, Predictions, ScoredDataset};
pub use error::{EvalError, EvalResult, MetricError};
pub use metrics::{ConfusionMatrix, FoldScores, METRIC_NAMES};
pub use scorer::{score, ScoreOutputs, ScoreReport, Scorer};
pub use summary::{summarize, ScoreTable, Summarizer, Summary, SummaryOutputs, SummaryRecord};
