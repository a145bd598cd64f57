// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use crash_eval::artifacts::{write_all, Artifact};
use crash_eval::datasets::synthetic;
use crash_eval::{score, summarize, EvalError, ScoreTable, METRIC_NAMES};
use std::fs;
use std::path::{Path, PathBuf};

fn synthesize(dir: &Path, seed: u64) -> (PathBuf, PathBuf) {
    let (dataset, predictions) = synthetic(400, seed, 0.25);
    let paths = write_all(
        dir,
        &[
            Artifact::new("dataset.csv", dataset.to_csv_bytes().unwrap()),
            Artifact::new("predictions.csv", predictions.to_csv_bytes().unwrap()),
        ],
    )
    .unwrap();
    (paths[0].clone(), paths[1].clone())
}

#[test]
fn score_then_summarize_two_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (dataset_a, predictions_a) = synthesize(&dir.path().join("data_a"), 1);
    let (_, predictions_b) = synthesize(&dir.path().join("data_b"), 2);

    let run_a = score(&dataset_a, &predictions_a, &dir.path().join("runs/a")).unwrap();
    let run_b = score(&dataset_a, &predictions_b, &dir.path().join("runs/b")).unwrap();

    let table_a = ScoreTable::load(&run_a.scores_path).unwrap();
    assert_eq!(table_a.metrics, METRIC_NAMES.to_vec());
    let folds: Vec<&str> = table_a.rows.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(folds, vec!["test", "train"]);

    let in_memory = ScoreTable::from_scores(&run_a.scores_path, &run_a.report.scores);
    assert_eq!(in_memory, table_a);

    let report_dir = dir.path().join("report");
    let outputs = summarize(
        &report_dir,
        &[run_b.scores_path.clone(), run_a.scores_path.clone()],
        &["modelB".to_string(), "modelA".to_string()],
    )
    .unwrap();

    assert_eq!(outputs.summary.records.len(), 24);
    assert_eq!(outputs.summary.labels(), vec!["modelA", "modelB"]);
    assert!(report_dir.join("summary.csv").exists());
    assert!(report_dir.join("summary.png").exists());

    let csv = fs::read_to_string(&outputs.table_path).unwrap();
    assert_eq!(csv.lines().count(), 25);
    assert!(csv.lines().nth(1).unwrap().ends_with(",modelA"));
    assert!(csv.lines().last().unwrap().ends_with(",modelB"));
}

#[test]
fn summarize_defaults_labels_to_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (dataset, predictions) = synthesize(dir.path(), 7);
    let run = score(&dataset, &predictions, &dir.path().join("run")).unwrap();

    let outputs = summarize(&dir.path().join("report"), &[run.scores_path.clone()], &[]).unwrap();
    let label = run.scores_path.display().to_string();
    assert!(outputs.summary.records.iter().all(|r| r.label == label));
}

#[test]
fn rerunning_score_reproduces_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let (dataset, predictions) = synthesize(dir.path(), 3);
    let output = dir.path().join("run");

    let first = score(&dataset, &predictions, &output).unwrap();
    let scores = fs::read(&first.scores_path).unwrap();
    let curves = fs::read(&first.curves_path).unwrap();

    score(&dataset, &predictions, &output).unwrap();
    assert_eq!(fs::read(&first.scores_path).unwrap(), scores);
    assert_eq!(fs::read(&first.curves_path).unwrap(), curves);
}

#[test]
fn malformed_scores_file_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "fold,accuracy\ntest,n/a\n").unwrap();
    let report_dir = dir.path().join("report");

    let err = summarize(&report_dir, &[bad], &[]).unwrap_err();
    assert!(matches!(err, EvalError::Parse { .. }));
    assert!(!report_dir.exists());
}
