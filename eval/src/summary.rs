// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Comparison of several scoring runs
//!
//! Each run's wide scores table (one row per fold, one column per metric) is
//! reshaped into long `(fold, metric, value)` rows tagged with the run label.
//! The tagged rows of all runs form the summary table and the comparison
//! figure.

use crate::artifacts::{format_float, write_all, Artifact};
use crate::config::SummaryConfig;
use crate::datasets::FOLD_COLUMN;
use crate::error::{EvalError, EvalResult};
use crate::figures::render_summary;
use crate::metrics::FoldScores;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File name of the long-form summary table
pub const SUMMARY_FILE: &str = "summary.csv";
/// File name of the comparison figure
pub const SUMMARY_PLOT_FILE: &str = "summary.png";

/// One metric value of one fold of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub fold: String,
    pub metric: String,
    pub value: f64,
    pub label: String,
}

/// A scores table as written by the score operation
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub source: PathBuf,
    /// Metric columns, in file order
    pub metrics: Vec<String>,
    /// Fold name and one value per metric column
    pub rows: Vec<(String, Vec<f64>)>,
}

impl ScoreTable {
    /// Read a scores table; every column except `fold` must be numeric
    pub fn load(path: &Path) -> EvalResult<Self> {
        let file = File::open(path).map_err(|e| EvalError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = reader.headers().map_err(|e| EvalError::csv(path, e))?.clone();

        let fold_idx = headers
            .iter()
            .position(|h| h == FOLD_COLUMN)
            .ok_or_else(|| EvalError::MissingColumn {
                path: path.to_path_buf(),
                column: FOLD_COLUMN.to_string(),
            })?;
        let metric_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fold_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| EvalError::csv(path, e))?;
            let line = record.position().map_or(0, |p| p.line());
            let fold = record.get(fold_idx).unwrap_or("").to_string();

            let values = metric_columns
                .iter()
                .map(|(idx, name)| {
                    let raw = record.get(*idx).unwrap_or("");
                    raw.parse::<f64>().map_err(|_| EvalError::Parse {
                        path: path.to_path_buf(),
                        line,
                        message: format!("column '{}' holds non-numeric value '{}'", name, raw),
                    })
                })
                .collect::<EvalResult<Vec<f64>>>()?;
            rows.push((fold, values));
        }

        tracing::info!(
            "Loaded {} folds x {} metrics from {}",
            rows.len(),
            metric_columns.len(),
            path.display()
        );

        Ok(Self {
            source: path.to_path_buf(),
            metrics: metric_columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        })
    }

    /// Build a table from in-memory fold scores
    pub fn from_scores(source: impl Into<PathBuf>, scores: &[FoldScores]) -> Self {
        let metrics = crate::metrics::METRIC_NAMES.iter().map(|m| m.to_string()).collect();
        let rows = scores
            .iter()
            .map(|s| (s.fold.clone(), s.values().iter().map(|(_, v)| *v).collect()))
            .collect();
        Self {
            source: source.into(),
            metrics,
            rows,
        }
    }

    /// Long form of the table, metric by metric, tagged with `label`
    pub fn melt(&self, label: &str) -> Vec<SummaryRecord> {
        let mut records = Vec::with_capacity(self.metrics.len() * self.rows.len());
        for (column, metric) in self.metrics.iter().enumerate() {
            for (fold, values) in &self.rows {
                records.push(SummaryRecord {
                    fold: fold.clone(),
                    metric: metric.clone(),
                    value: values[column],
                    label: label.to_string(),
                });
            }
        }
        records
    }
}

fn first_appearances<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            ordered.push(value.clone());
        }
    }
    ordered
}

/// The merged long-form table of all runs, sorted by label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub records: Vec<SummaryRecord>,
}

impl Summary {
    /// Melt, tag and merge runs; rows keep their order within a label
    pub fn build(runs: &[(ScoreTable, String)]) -> EvalResult<Self> {
        let mut records: Vec<SummaryRecord> = runs
            .iter()
            .flat_map(|(table, label)| table.melt(label))
            .collect();

        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert((&record.fold, &record.metric, &record.label)) {
                return Err(EvalError::DuplicateEntry {
                    fold: record.fold.clone(),
                    metric: record.metric.clone(),
                    label: record.label.clone(),
                });
            }
        }

        records.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(Self { records })
    }

    /// Metrics in order of first appearance
    pub fn metrics(&self) -> Vec<String> {
        first_appearances(self.records.iter().map(|r| &r.metric))
    }

    /// Run labels in order of first appearance
    pub fn labels(&self) -> Vec<String> {
        first_appearances(self.records.iter().map(|r| &r.label))
    }

    /// Folds in order of first appearance
    pub fn folds(&self) -> Vec<String> {
        first_appearances(self.records.iter().map(|r| &r.fold))
    }

    pub fn value(&self, fold: &str, metric: &str, label: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.fold == fold && r.metric == metric && r.label == label)
            .map(|r| r.value)
    }

    /// Encode as a delimited table with `fold, metric, value, label` columns
    pub fn to_csv_bytes(&self) -> EvalResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([FOLD_COLUMN, "metric", "value", "label"])
            .map_err(|e| EvalError::csv(SUMMARY_FILE, e))?;
        for r in &self.records {
            writer
                .write_record([
                    r.fold.as_str(),
                    r.metric.as_str(),
                    format_float(r.value).as_str(),
                    r.label.as_str(),
                ])
                .map_err(|e| EvalError::csv(SUMMARY_FILE, e))?;
        }
        writer
            .into_inner()
            .map_err(|e| EvalError::io(SUMMARY_FILE, e.into_error()))
    }

    /// Pivot of the summary: one line per label and fold, one column per metric
    pub fn format(&self) -> String {
        let metrics = self.metrics();
        let label_width = self
            .labels()
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(5)
            .max(5);

        let mut output = format!("{:<w$} {:<8}", "Label", "Fold", w = label_width);
        for metric in &metrics {
            output.push_str(&format!(" {:>12}", metric));
        }
        output.push('\n');
        output.push_str(&format!("{:-<w$}\n", "", w = label_width + 9 + 13 * metrics.len()));

        for label in self.labels() {
            for fold in self.folds() {
                if !self.records.iter().any(|r| r.label == label && r.fold == fold) {
                    continue;
                }
                output.push_str(&format!("{:<w$} {:<8}", label, fold, w = label_width));
                for metric in &metrics {
                    match self.value(&fold, metric, &label) {
                        Some(v) => output.push_str(&format!(" {:>12.4}", v)),
                        None => output.push_str(&format!(" {:>12}", "-")),
                    }
                }
                output.push('\n');
            }
        }
        output
    }
}

/// Paths written by a summarize run
#[derive(Debug, Clone)]
pub struct SummaryOutputs {
    pub summary: Summary,
    pub table_path: PathBuf,
    pub plot_path: PathBuf,
}

/// Merges scores tables from several runs into a comparison report
pub struct Summarizer {
    config: SummaryConfig,
}

impl Summarizer {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Pair each source with its label, defaulting to the source path
    pub fn resolve_labels(sources: &[PathBuf], labels: &[String]) -> EvalResult<Vec<String>> {
        if sources.is_empty() {
            return Err(EvalError::NoScoreFiles);
        }
        if labels.is_empty() {
            return Ok(sources.iter().map(|s| s.display().to_string()).collect());
        }
        if labels.len() != sources.len() {
            return Err(EvalError::LabelCount {
                labels: labels.len(),
                sources: sources.len(),
            });
        }
        Ok(labels.to_vec())
    }

    /// Merge in-memory tables and write `summary.csv` and `summary.png`
    pub fn write(&self, output_folder: &Path, runs: &[(ScoreTable, String)]) -> EvalResult<SummaryOutputs> {
        let summary = Summary::build(runs)?;
        let table = summary.to_csv_bytes()?;
        let plot = render_summary(&summary, &self.config)?;

        let paths = write_all(
            output_folder,
            &[
                Artifact::new(SUMMARY_FILE, table),
                Artifact::new(SUMMARY_PLOT_FILE, plot),
            ],
        )?;

        tracing::info!(
            "Summarized {} runs into {} rows",
            runs.len(),
            summary.records.len()
        );

        Ok(SummaryOutputs {
            summary,
            table_path: paths[0].clone(),
            plot_path: paths[1].clone(),
        })
    }

    /// Load every scores file, merge them and write the summary artifacts
    pub fn summarize(
        &self,
        output_folder: &Path,
        sources: &[PathBuf],
        labels: &[String],
    ) -> EvalResult<SummaryOutputs> {
        let labels = Self::resolve_labels(sources, labels)?;
        let runs = sources
            .iter()
            .zip(labels)
            .map(|(source, label)| ScoreTable::load(source).map(|table| (table, label)))
            .collect::<EvalResult<Vec<_>>>()?;
        self.write(output_folder, &runs)
    }
}

/// Summarize with the default configuration
pub fn summarize(
    output_folder: &Path,
    sources: &[PathBuf],
    labels: &[String],
) -> EvalResult<SummaryOutputs> {
    Summarizer::new(SummaryConfig::default()).summarize(output_folder, sources, labels)
}
