// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Loading of labeled crash records and model predictions
//!
//! The labeled dataset holds at least the `injuryCrash` ground truth and the
//! `fold` assignment of each crash record. The predictions file holds one
//! probability per record. By default the two files are aligned by row
//! position; when a join key column is configured they are joined on it.

use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Ground-truth column of the labeled dataset
pub const LABEL_COLUMN: &str = "injuryCrash";
/// Fold assignment column of the labeled dataset
pub const FOLD_COLUMN: &str = "fold";
/// Column name used when writing predictions
pub const PROBABILITY_COLUMN: &str = "y_prob";

/// Parse a boolean-coercible ground-truth value
pub fn parse_label(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}

/// One crash record with its ground truth and fold assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub injury_crash: bool,
    pub fold: String,
    /// Join key, present only when loading with a join key column
    pub key: Option<String>,
}

/// The labeled dataset, in file order
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub path: PathBuf,
    pub rows: Vec<LabeledRow>,
}

/// Predicted probabilities, in file order
#[derive(Debug, Clone)]
pub struct Predictions {
    pub path: PathBuf,
    /// Name of the probability column
    pub column: String,
    pub probabilities: Vec<f64>,
    /// Join key column name and one key per row, when joining by key
    pub keys: Option<(String, Vec<String>)>,
}

fn open_reader(path: &Path) -> EvalResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| EvalError::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn column_index(headers: &csv::StringRecord, path: &Path, column: &str) -> EvalResult<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| EvalError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn check_unique_key(
    seen: &mut HashSet<String>,
    key: &str,
    path: &Path,
    line: u64,
) -> EvalResult<()> {
    if !seen.insert(key.to_string()) {
        return Err(EvalError::DuplicateKey {
            path: path.to_path_buf(),
            line,
            key: key.to_string(),
        });
    }
    Ok(())
}

impl LabeledDataset {
    /// Load the `injuryCrash` and `fold` columns (plus the join key, if any)
    pub fn load(path: &Path, join_key: Option<&str>) -> EvalResult<Self> {
        let mut reader = open_reader(path)?;
        let headers = reader.headers().map_err(|e| EvalError::csv(path, e))?.clone();

        let label_idx = column_index(&headers, path, LABEL_COLUMN)?;
        let fold_idx = column_index(&headers, path, FOLD_COLUMN)?;
        let key_idx = join_key
            .map(|key| column_index(&headers, path, key))
            .transpose()?;

        let mut rows = Vec::new();
        let mut seen_keys = HashSet::new();

        for result in reader.records() {
            let record = result.map_err(|e| EvalError::csv(path, e))?;
            let line = record_line(&record);

            let raw_label = record.get(label_idx).unwrap_or("");
            let injury_crash = parse_label(raw_label).ok_or_else(|| EvalError::Parse {
                path: path.to_path_buf(),
                line,
                message: format!("'{}' is not a binary {} value", raw_label, LABEL_COLUMN),
            })?;

            let fold = record.get(fold_idx).unwrap_or("").to_string();
            if fold.is_empty() {
                return Err(EvalError::Parse {
                    path: path.to_path_buf(),
                    line,
                    message: format!("empty {} value", FOLD_COLUMN),
                });
            }

            let key = match key_idx {
                Some(idx) => {
                    let key = record.get(idx).unwrap_or("").to_string();
                    check_unique_key(&mut seen_keys, &key, path, line)?;
                    Some(key)
                }
                None => None,
            };

            rows.push(LabeledRow {
                injury_crash,
                fold,
                key,
            });
        }

        if rows.is_empty() {
            return Err(EvalError::EmptyInput {
                path: path.to_path_buf(),
            });
        }

        tracing::info!("Loaded {} labeled rows from {}", rows.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Build an in-memory dataset from rows
    pub fn from_rows(path: impl Into<PathBuf>, rows: Vec<LabeledRow>) -> Self {
        Self {
            path: path.into(),
            rows,
        }
    }

    /// Number of rows per fold
    pub fn fold_distribution(&self) -> BTreeMap<String, usize> {
        let mut dist = BTreeMap::new();
        for row in &self.rows {
            *dist.entry(row.fold.clone()).or_insert(0) += 1;
        }
        dist
    }

    /// Encode as a delimited table with `injuryCrash` and `fold` columns
    pub fn to_csv_bytes(&self) -> EvalResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([LABEL_COLUMN, FOLD_COLUMN])
            .map_err(|e| EvalError::csv(&self.path, e))?;
        for row in &self.rows {
            let label = if row.injury_crash { "1" } else { "0" };
            writer
                .write_record([label, row.fold.as_str()])
                .map_err(|e| EvalError::csv(&self.path, e))?;
        }
        writer
            .into_inner()
            .map_err(|e| EvalError::io(&self.path, e.into_error()))
    }
}

impl Predictions {
    /// Load the single probability column (plus the join key, if any)
    pub fn load(path: &Path, join_key: Option<&str>) -> EvalResult<Self> {
        let mut reader = open_reader(path)?;
        let headers = reader.headers().map_err(|e| EvalError::csv(path, e))?.clone();

        let key_idx = join_key
            .map(|key| column_index(&headers, path, key))
            .transpose()?;
        let value_columns: Vec<usize> = (0..headers.len()).filter(|&i| Some(i) != key_idx).collect();
        if value_columns.len() != 1 {
            return Err(EvalError::PredictionColumns {
                path: path.to_path_buf(),
                found: value_columns.len(),
            });
        }
        let prob_idx = value_columns[0];
        let column = headers.get(prob_idx).unwrap_or(PROBABILITY_COLUMN).to_string();

        let mut probabilities = Vec::new();
        let mut keys = Vec::new();
        let mut seen_keys = HashSet::new();

        for result in reader.records() {
            let record = result.map_err(|e| EvalError::csv(path, e))?;
            let line = record_line(&record);

            let raw = record.get(prob_idx).unwrap_or("");
            let value: f64 = raw.parse().map_err(|_| EvalError::Parse {
                path: path.to_path_buf(),
                line,
                message: format!("'{}' is not a number", raw),
            })?;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EvalError::InvalidProbability {
                    path: path.to_path_buf(),
                    line,
                    value,
                });
            }
            probabilities.push(value);

            if let Some(idx) = key_idx {
                let key = record.get(idx).unwrap_or("").to_string();
                check_unique_key(&mut seen_keys, &key, path, line)?;
                keys.push(key);
            }
        }

        tracing::info!(
            "Loaded {} predictions ('{}') from {}",
            probabilities.len(),
            column,
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            column,
            probabilities,
            keys: join_key.map(|k| (k.to_string(), keys)),
        })
    }

    /// Build positional predictions from probabilities
    pub fn from_probabilities(path: impl Into<PathBuf>, probabilities: Vec<f64>) -> Self {
        Self {
            path: path.into(),
            column: PROBABILITY_COLUMN.to_string(),
            probabilities,
            keys: None,
        }
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Encode as a single-column delimited table
    pub fn to_csv_bytes(&self) -> EvalResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([self.column.as_str()])
            .map_err(|e| EvalError::csv(&self.path, e))?;
        for p in &self.probabilities {
            writer
                .write_record([p.to_string()])
                .map_err(|e| EvalError::csv(&self.path, e))?;
        }
        writer
            .into_inner()
            .map_err(|e| EvalError::io(&self.path, e.into_error()))
    }
}

/// A labeled row joined with its prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub injury_crash: bool,
    pub fold: String,
    pub y_prob: f64,
    pub y_pred: bool,
}

/// Labels, probabilities and thresholded predictions of one fold
#[derive(Debug, Clone, PartialEq)]
pub struct FoldData {
    pub name: String,
    pub y_true: Vec<bool>,
    pub y_prob: Vec<f64>,
    pub y_pred: Vec<bool>,
}

impl FoldData {
    pub fn len(&self) -> usize {
        self.y_true.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_true.is_empty()
    }
}

/// In-memory join of ground truth, probability and thresholded prediction
#[derive(Debug, Clone)]
pub struct ScoredDataset {
    pub rows: Vec<ScoredRow>,
}

impl ScoredDataset {
    /// Join labels with predictions and derive `y_pred = y_prob > threshold`
    pub fn join(
        dataset: &LabeledDataset,
        predictions: &Predictions,
        threshold: f64,
    ) -> EvalResult<Self> {
        if dataset.rows.len() != predictions.len() {
            return Err(EvalError::RowCountMismatch {
                dataset: dataset.path.clone(),
                dataset_rows: dataset.rows.len(),
                predictions: predictions.path.clone(),
                prediction_rows: predictions.len(),
            });
        }

        let probabilities: Vec<f64> = match &predictions.keys {
            None => predictions.probabilities.clone(),
            Some((key_column, keys)) => {
                let by_key: HashMap<&str, f64> = keys
                    .iter()
                    .map(String::as_str)
                    .zip(predictions.probabilities.iter().copied())
                    .collect();
                dataset
                    .rows
                    .iter()
                    .map(|row| {
                        let key = row.key.as_deref().ok_or_else(|| EvalError::MissingColumn {
                            path: dataset.path.clone(),
                            column: key_column.clone(),
                        })?;
                        by_key.get(key).copied().ok_or_else(|| EvalError::MissingPrediction {
                            path: predictions.path.clone(),
                            key: key.to_string(),
                        })
                    })
                    .collect::<EvalResult<_>>()?
            }
        };

        let rows = dataset
            .rows
            .iter()
            .zip(probabilities)
            .map(|(row, y_prob)| ScoredRow {
                injury_crash: row.injury_crash,
                fold: row.fold.clone(),
                y_prob,
                y_pred: y_prob > threshold,
            })
            .collect();

        Ok(Self { rows })
    }

    /// Split rows by fold, ordered by fold name
    pub fn folds(&self) -> Vec<FoldData> {
        let mut folds: BTreeMap<&str, FoldData> = BTreeMap::new();
        for row in &self.rows {
            let fold = folds.entry(row.fold.as_str()).or_insert_with(|| FoldData {
                name: row.fold.clone(),
                y_true: Vec::new(),
                y_prob: Vec::new(),
                y_pred: Vec::new(),
            });
            fold.y_true.push(row.injury_crash);
            fold.y_prob.push(row.y_prob);
            fold.y_pred.push(row.y_pred);
        }
        folds.into_values().collect()
    }
}

/// Generate a synthetic labeled dataset and matching predictions
///
/// Roughly 30% of the records are injury crashes. Predicted probabilities
/// are informative but noisy, so every metric lands strictly inside its
/// range for reasonably sized folds.
pub fn synthetic(size: usize, seed: u64, test_fraction: f64) -> (LabeledDataset, Predictions) {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let test_fraction = test_fraction.clamp(0.0, 1.0);

    let mut rows = Vec::with_capacity(size);
    let mut probabilities = Vec::with_capacity(size);

    for _ in 0..size {
        let injury_crash = rng.gen_bool(0.3);
        let fold = if rng.gen_bool(test_fraction) { "test" } else { "train" };
        let center = if injury_crash { 0.65 } else { 0.3 };
        let noisy: f64 = center + rng.gen_range(-0.3..0.3);
        let y_prob = (noisy.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0;

        rows.push(LabeledRow {
            injury_crash,
            fold: fold.to_string(),
            key: None,
        });
        probabilities.push(y_prob);
    }

    (
        LabeledDataset::from_rows("dataset.csv", rows),
        Predictions::from_probabilities("predictions.csv", probabilities),
    )
}
