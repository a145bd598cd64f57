// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Command line interface for scoring injury-crash classifiers
//!
//! Usage:
//!   crash-eval score data/cas.csv runs/xgb/predictions.csv runs/xgb
//!   crash-eval summarize reports runs/xgb/scores.csv runs/lr/scores.csv --labels xgb lr
//!   crash-eval synthesize data/synthetic --rows 1000 --seed 42

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crash_eval::artifacts::{write_all, Artifact};
use crash_eval::config::{load_or_default, DegenerateFoldPolicy, ScoringConfig, SummaryConfig};
use crash_eval::datasets;
use crash_eval::{Scorer, Summarizer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crash-eval")]
#[command(about = "Score injury-crash classifiers and compare runs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute per-fold scores and curves for one set of predictions
    Score {
        /// Labeled dataset with `injuryCrash` and `fold` columns
        dataset: PathBuf,

        /// Predictions with a single probability column
        predictions: PathBuf,

        /// Folder receiving scores.csv and curves.png
        output_folder: PathBuf,

        /// Probability above which a crash is predicted as injury
        #[arg(long)]
        threshold: Option<f64>,

        /// Join dataset and predictions on this column instead of row order
        #[arg(long)]
        join_key: Option<String>,

        /// Leave out folds holding a single class instead of failing
        #[arg(long)]
        skip_degenerate_folds: bool,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Merge scores tables of several runs into one comparison report
    Summarize {
        /// Folder receiving summary.csv and summary.png
        output_folder: PathBuf,

        /// scores.csv files written by the score command
        #[arg(required = true)]
        score_files: Vec<PathBuf>,

        /// One label per score file (defaults to the file paths)
        #[arg(short, long, num_args = 1..)]
        labels: Vec<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a synthetic dataset and predictions for trying out the tool
    Synthesize {
        /// Folder receiving dataset.csv and predictions.csv
        output_folder: PathBuf,

        /// Number of records
        #[arg(long, default_value_t = 1000)]
        rows: usize,

        /// Random seed for reproducibility
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Share of records assigned to the test fold
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Score {
            dataset,
            predictions,
            output_folder,
            threshold,
            join_key,
            skip_degenerate_folds,
            config,
        } => {
            let mut scoring: ScoringConfig = load_or_default(config.as_deref())?;
            if let Some(threshold) = threshold {
                scoring.threshold = threshold;
            }
            if join_key.is_some() {
                scoring.join_key = join_key;
            }
            if skip_degenerate_folds {
                scoring.degenerate_folds = DegenerateFoldPolicy::Skip;
            }

            tracing::info!("Dataset: {}", dataset.display());
            tracing::info!("Predictions: {}", predictions.display());
            tracing::info!("Threshold: {}", scoring.threshold);

            let outputs = Scorer::new(scoring)
                .score(&dataset, &predictions, &output_folder)
                .with_context(|| format!("scoring {} failed", predictions.display()))?;

            println!("\n{}", "=".repeat(70));
            println!("SCORES");
            println!("{}", "=".repeat(70));
            print!("{}", outputs.report.format());
            println!("\nScores saved to: {}", outputs.scores_path.display());
            println!("Curves saved to: {}", outputs.curves_path.display());
        }

        Command::Summarize {
            output_folder,
            score_files,
            labels,
            config,
        } => {
            let summary_config: SummaryConfig = load_or_default(config.as_deref())?;

            let outputs = Summarizer::new(summary_config)
                .summarize(&output_folder, &score_files, &labels)
                .context("summarizing score files failed")?;

            println!("\n{}", "=".repeat(70));
            println!("SUMMARY");
            println!("{}", "=".repeat(70));
            print!("{}", outputs.summary.format());
            println!("\nSummary saved to: {}", outputs.table_path.display());
            println!("Figure saved to: {}", outputs.plot_path.display());
        }

        Command::Synthesize {
            output_folder,
            rows,
            seed,
            test_fraction,
        } => {
            tracing::info!("Generating {} synthetic records (seed {})", rows, seed);
            let (dataset, predictions) = datasets::synthetic(rows, seed, test_fraction);

            for (fold, count) in dataset.fold_distribution() {
                tracing::info!("  {}: {} rows", fold, count);
            }

            let paths = write_all(
                &output_folder,
                &[
                    Artifact::new("dataset.csv", dataset.to_csv_bytes()?),
                    Artifact::new("predictions.csv", predictions.to_csv_bytes()?),
                ],
            )?;

            for path in paths {
                println!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
