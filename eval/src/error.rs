// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types for loading, scoring, summarizing and rendering

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the metric and curve functions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("only one class present in y_true; {metric} is not defined in that case")]
    SingleClass { metric: &'static str },

    #[error("{metric}: y_true has {truth} entries but predictions have {predicted}")]
    LengthMismatch {
        metric: &'static str,
        truth: usize,
        predicted: usize,
    },

    #[error("{metric}: no samples")]
    Empty { metric: &'static str },

    #[error("{metric}: probability {value} is outside [0, 1]")]
    ProbabilityOutOfRange { metric: &'static str, value: f64 },
}

/// Errors surfaced by the score and summarize operations
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(
        "row count mismatch: {} has {dataset_rows} rows but {} has {prediction_rows}",
        dataset.display(),
        predictions.display()
    )]
    RowCountMismatch {
        dataset: PathBuf,
        dataset_rows: usize,
        predictions: PathBuf,
        prediction_rows: usize,
    },

    #[error("missing required column '{column}' in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: expected exactly one probability column, found {found}", path.display())]
    PredictionColumns { path: PathBuf, found: usize },

    #[error("{}: no data rows", path.display())]
    EmptyInput { path: PathBuf },

    #[error("{}, line {line}: probability {value} is not a finite value in [0, 1]", path.display())]
    InvalidProbability { path: PathBuf, line: u64, value: f64 },

    #[error("{}: no prediction for key '{key}'", path.display())]
    MissingPrediction { path: PathBuf, key: String },

    #[error("{}, line {line}: duplicate key '{key}'", path.display())]
    DuplicateKey { path: PathBuf, line: u64, key: String },

    #[error("{labels} labels supplied for {sources} score files")]
    LabelCount { labels: usize, sources: usize },

    #[error("no score files to summarize")]
    NoScoreFiles,

    #[error("fold '{fold}': {source}")]
    DegenerateFold {
        fold: String,
        #[source]
        source: MetricError,
    },

    #[error("{}, line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("duplicate summary entry for fold '{fold}', metric '{metric}', label '{label}'")]
    DuplicateEntry {
        fold: String,
        metric: String,
        label: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render {name}: {message}")]
    Render { name: String, message: String },
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
