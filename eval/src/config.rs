// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Configuration for scoring, summarizing and plot rendering
//!
//! Every setting has a default matching the behavior of the command line
//! tool without flags. Configurations can also be read from JSON files in
//! which any missing field falls back to its default.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Classification threshold applied to `y_prob`
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// What to do with a fold that holds a single ground-truth class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegenerateFoldPolicy {
    /// Abort the run with a computation error
    #[default]
    Fail,
    /// Drop the fold from scores and curves with a warning
    Skip,
}

/// Rendering settings passed explicitly to every figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub background: [u8; 3],
    pub foreground: [u8; 3],
    pub grid: [u8; 3],
    /// Series colors, assigned in fold order and reused cyclically
    pub palette: Vec<[u8; 3]>,
    /// Size of one curve panel in pixels
    pub panel_size: u32,
    /// Size of one summary facet in pixels
    pub facet_size: u32,
    /// Integer scale factor of the bitmap font
    pub font_scale: u32,
    pub line_width: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            foreground: [0, 0, 0],
            grid: [221, 221, 221],
            palette: vec![
                [31, 119, 180],
                [255, 127, 14],
                [44, 160, 44],
                [214, 39, 40],
                [148, 103, 189],
                [140, 86, 75],
                [227, 119, 194],
                [127, 127, 127],
                [188, 189, 34],
                [23, 190, 207],
            ],
            panel_size: 500,
            facet_size: 320,
            font_scale: 2,
            line_width: 2,
        }
    }
}

impl PlotStyle {
    /// Color of the `index`-th series
    pub fn series_color(&self, index: usize) -> [u8; 3] {
        if self.palette.is_empty() {
            return self.foreground;
        }
        self.palette[index % self.palette.len()]
    }
}

/// Settings of the score operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Rows with `y_prob > threshold` are predicted positive
    pub threshold: f64,
    pub degenerate_folds: DegenerateFoldPolicy,
    /// Join dataset and predictions on this column instead of by position
    pub join_key: Option<String>,
    /// Number of uniform bins of the calibration curve
    pub calibration_bins: usize,
    pub style: PlotStyle,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            degenerate_folds: DegenerateFoldPolicy::Fail,
            join_key: None,
            calibration_bins: 5,
            style: PlotStyle::default(),
        }
    }
}

/// Settings of the summarize operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Bar order within a facet; unlisted folds follow alphabetically
    pub fold_order: Vec<String>,
    /// Facets per row of the summary grid
    pub facet_columns: usize,
    pub style: PlotStyle,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            fold_order: vec!["train".to_string(), "test".to_string()],
            facet_columns: 3,
            style: PlotStyle::default(),
        }
    }
}

/// Load a JSON configuration, or the defaults when no path is given.
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config from {}", path.display()))?;
    tracing::info!("Loaded configuration from {}", path.display());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.degenerate_folds, DegenerateFoldPolicy::Fail);
        assert_eq!(config.calibration_bins, 5);
        assert!(config.join_key.is_none());

        let summary = SummaryConfig::default();
        assert_eq!(summary.fold_order, vec!["train", "test"]);
        assert_eq!(summary.facet_columns, 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{"threshold": 0.3, "degenerate_folds": "skip"}"#).unwrap();
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.degenerate_folds, DegenerateFoldPolicy::Skip);
        assert_eq!(config.calibration_bins, 5);
        assert_eq!(config.style, PlotStyle::default());
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        std::fs::write(&path, r#"{"facet_columns": 2}"#).unwrap();

        let loaded: SummaryConfig = load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.facet_columns, 2);
        assert_eq!(loaded.fold_order, vec!["train", "test"]);

        let defaults: SummaryConfig = load_or_default(None).unwrap();
        assert_eq!(defaults, SummaryConfig::default());

        let missing = load_or_default::<SummaryConfig>(Some(&dir.path().join("nope.json")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_series_color_cycles() {
        let style = PlotStyle {
            palette: vec![[1, 2, 3], [4, 5, 6]],
            ..PlotStyle::default()
        };
        assert_eq!(style.series_color(0), [1, 2, 3]);
        assert_eq!(style.series_color(3), [4, 5, 6]);

        let empty = PlotStyle {
            palette: vec![],
            ..PlotStyle::default()
        };
        assert_eq!(empty.series_color(7), empty.foreground);
    }
}
