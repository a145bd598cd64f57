// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Report figures: per-fold diagnostic curves and the run comparison grid

use crate::canvas::{
    draw_legend, legend_size, nice_ticks, text_height, text_width, Anchor, AxisLabels, Axes,
    Canvas, LegendMark,
};
use crate::config::{PlotStyle, SummaryConfig};
use crate::curves::FoldCurves;
use crate::error::EvalResult;
use crate::summary::Summary;

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 80.0;
const DASH: f64 = 6.0;

fn unit_axes(cell_left: f64, size: f64, range: (f64, f64)) -> Axes {
    Axes {
        left: cell_left + MARGIN_LEFT,
        top: MARGIN_TOP,
        width: size - MARGIN_LEFT - MARGIN_RIGHT,
        height: size - MARGIN_TOP - MARGIN_BOTTOM,
        x_range: range,
        y_range: range,
    }
}

fn series(axes: &Axes, xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter().zip(ys).map(|(&x, &y)| axes.to_pixel(x, y)).collect()
}

fn diagonal(canvas: &mut Canvas, axes: &Axes, style: &PlotStyle) {
    canvas.dashed_line(
        axes.to_pixel(0.0, 0.0),
        axes.to_pixel(1.0, 1.0),
        style.foreground,
        style.line_width.saturating_sub(1).max(1),
        DASH,
    );
}

/// Where a legend goes inside the plot area
#[derive(Debug, Clone, Copy)]
enum Corner {
    UpperLeft,
    LowerLeft,
    LowerRight,
}

fn legend_in(
    canvas: &mut Canvas,
    style: &PlotStyle,
    axes: &Axes,
    corner: Corner,
    entries: &[(&str, [u8; 3])],
    mark: LegendMark,
) {
    let names: Vec<&str> = entries.iter().map(|(n, _)| *n).collect();
    let (w, h) = legend_size(&names, style.font_scale.max(1));
    let pad = 8.0;
    let x = match corner {
        Corner::UpperLeft | Corner::LowerLeft => axes.left + pad,
        Corner::LowerRight => axes.right() - pad - w as f64,
    };
    let y = match corner {
        Corner::UpperLeft => axes.top + pad,
        Corner::LowerLeft | Corner::LowerRight => axes.bottom() - pad - h as f64,
    };
    draw_legend(canvas, style, (x.round() as i64, y.round() as i64), entries, mark);
}

/// Three side-by-side panels: ROC, precision-recall and calibration curves
pub fn render_curves(curves: &[FoldCurves], style: &PlotStyle) -> EvalResult<Vec<u8>> {
    let size = style.panel_size.max(200) as f64;
    let mut canvas = Canvas::new((size * 3.0) as u32, size as u32, style.background);
    let ticks = nice_ticks(0.0, 1.0, 5);
    let padded = (-0.05, 1.05);
    let width = style.line_width;

    let entries: Vec<(&str, [u8; 3])> = curves
        .iter()
        .enumerate()
        .map(|(i, c)| (c.fold.as_str(), style.series_color(i)))
        .collect();

    // ROC curve
    let roc_axes = unit_axes(0.0, size, padded);
    roc_axes.draw_frame(
        &mut canvas,
        style,
        AxisLabels {
            title: "ROC curve",
            x: "False positive rate",
            y: "True positive rate",
        },
        &ticks,
        &ticks,
    );
    diagonal(&mut canvas, &roc_axes, style);
    for (i, fold) in curves.iter().enumerate() {
        let points = series(&roc_axes, &fold.roc.fpr, &fold.roc.tpr);
        canvas.polyline(&points, style.series_color(i), width);
    }
    legend_in(&mut canvas, style, &roc_axes, Corner::LowerRight, &entries, LegendMark::Line);

    // Precision-recall curve, fixed to the unit square
    let pr_axes = unit_axes(size, size, (0.0, 1.0));
    pr_axes.draw_frame(
        &mut canvas,
        style,
        AxisLabels {
            title: "Precision-Recall curve",
            x: "Recall",
            y: "Precision",
        },
        &ticks,
        &ticks,
    );
    for (i, fold) in curves.iter().enumerate() {
        let pr = &fold.precision_recall;
        let points = series(&pr_axes, &pr.recall, &pr.precision);
        canvas.polyline(&points, style.series_color(i), width);
    }
    legend_in(&mut canvas, style, &pr_axes, Corner::LowerLeft, &entries, LegendMark::Line);

    // Calibration curve
    let cal_axes = unit_axes(2.0 * size, size, padded);
    cal_axes.draw_frame(
        &mut canvas,
        style,
        AxisLabels {
            title: "Calibration curve",
            x: "Mean predicted probability",
            y: "Fraction of positives",
        },
        &ticks,
        &ticks,
    );
    diagonal(&mut canvas, &cal_axes, style);
    for (i, fold) in curves.iter().enumerate() {
        let cal = &fold.calibration;
        let points = series(&cal_axes, &cal.prob_pred, &cal.prob_true);
        let color = style.series_color(i);
        canvas.polyline(&points, color, width);
        for &point in &points {
            canvas.marker(point, 2.0 + width as f64, color);
        }
    }
    legend_in(&mut canvas, style, &cal_axes, Corner::UpperLeft, &entries, LegendMark::LineMarker);

    canvas.to_png()
}

/// Order folds for display: configured order first, the rest alphabetically
pub fn ordered_folds(present: &[String], preferred: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = preferred
        .iter()
        .filter(|f| present.contains(*f))
        .cloned()
        .collect();
    let mut rest: Vec<String> = present
        .iter()
        .filter(|f| !preferred.contains(*f))
        .cloned()
        .collect();
    rest.sort();
    rest.dedup();
    ordered.extend(rest);
    ordered
}

/// Grid of bar charts, one facet per metric, bars grouped by run label
pub fn render_summary(summary: &Summary, config: &SummaryConfig) -> EvalResult<Vec<u8>> {
    let style = &config.style;
    let scale = style.font_scale.max(1);
    let metrics = summary.metrics();
    let labels = summary.labels();
    let folds = ordered_folds(&summary.folds(), &config.fold_order);

    let columns = config.facet_columns.max(1).min(metrics.len().max(1));
    let rows = metrics.len().div_ceil(columns).max(1);

    let facet = style.facet_size.max(160) as f64;
    let widest_label = labels.iter().map(|l| text_width(l, scale)).max().unwrap_or(0) as f64;
    let label_band = widest_label * std::f64::consts::FRAC_1_SQRT_2 + text_height(scale) as f64 + 20.0;
    let cell_w = facet;
    let cell_h = facet + label_band;

    let fold_names: Vec<&str> = folds.iter().map(String::as_str).collect();
    let (legend_w, legend_h) = legend_size(&fold_names, scale);
    let legend_band = legend_w as f64 + 30.0;

    let width = (cell_w * columns as f64 + legend_band).ceil() as u32;
    let height = (cell_h * rows as f64).ceil() as u32;
    let mut canvas = Canvas::new(width, height, style.background);

    let n_labels = labels.len().max(1);
    let group_width = 0.8;
    let bar_width = group_width / folds.len().max(1) as f64;

    for (index, metric) in metrics.iter().enumerate() {
        let cell_left = (index % columns) as f64 * cell_w;
        let cell_top = (index / columns) as f64 * cell_h;

        let values: Vec<f64> = summary
            .records
            .iter()
            .filter(|r| &r.metric == metric)
            .map(|r| r.value)
            .collect();
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let min = values.iter().copied().fold(0.0_f64, f64::min);
        let top_value = if max > 0.0 { max * 1.05 } else if min < 0.0 { 0.0 } else { 1.0 };
        let bottom_value = if min < 0.0 { min * 1.05 } else { 0.0 };

        let axes = Axes {
            left: cell_left + 70.0,
            top: cell_top + 40.0,
            width: cell_w - 70.0 - 15.0,
            height: facet - 40.0 - 10.0,
            x_range: (0.0, n_labels as f64),
            y_range: (bottom_value, top_value),
        };
        let y_ticks = nice_ticks(bottom_value, top_value, 5);
        let title = format!("metric = {}", metric);
        axes.draw_frame(
            &mut canvas,
            style,
            AxisLabels {
                title: &title,
                x: "",
                y: "value",
            },
            &[],
            &y_ticks,
        );

        for (li, label) in labels.iter().enumerate() {
            let group_left = li as f64 + (1.0 - group_width) / 2.0;
            for (fi, fold) in folds.iter().enumerate() {
                let Some(value) = summary.value(fold, metric, label) else {
                    continue;
                };
                let x0 = group_left + fi as f64 * bar_width;
                let (px0, py0) = axes.to_pixel(x0, 0.0_f64.max(bottom_value));
                let (px1, py1) = axes.to_pixel(x0 + bar_width, value);
                canvas.fill_rect(
                    px0.round() as i64 + 1,
                    py0.round() as i64,
                    px1.round() as i64,
                    py1.round() as i64,
                    style.series_color(fi),
                );
            }

            let (tick_x, _) = axes.to_pixel(li as f64 + 0.5, bottom_value);
            canvas.line(
                (tick_x, axes.bottom()),
                (tick_x, axes.bottom() + 5.0),
                style.foreground,
                1,
            );
            canvas.text_rotated(
                (tick_x, axes.bottom() + 10.0 + text_height(scale) as f64 / 2.0),
                label,
                style.foreground,
                scale,
                45.0,
                Anchor::Right,
            );
        }
    }

    let legend_x = (cell_w * columns as f64 + 15.0).round() as i64;
    let legend_y = ((height as f64 - legend_h as f64) / 2.0).round() as i64;
    let entries: Vec<(&str, [u8; 3])> = fold_names
        .iter()
        .enumerate()
        .map(|(i, f)| (*f, style.series_color(i)))
        .collect();
    draw_legend(&mut canvas, style, (legend_x, legend_y), &entries, LegendMark::Patch);

    canvas.to_png()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{calibration_curve, precision_recall_curve, roc_curve};
    use crate::summary::SummaryRecord;
    use image::GenericImageView;

    fn fold_curves(name: &str) -> FoldCurves {
        let y_true = [false, false, true, true, false, true];
        let y_prob = [0.1, 0.4, 0.35, 0.8, 0.2, 0.9];
        FoldCurves {
            fold: name.to_string(),
            roc: roc_curve(&y_true, &y_prob, true).unwrap(),
            precision_recall: precision_recall_curve(&y_true, &y_prob).unwrap(),
            calibration: calibration_curve(&y_true, &y_prob, 5).unwrap(),
        }
    }

    #[test]
    fn test_render_curves_dimensions() {
        let style = PlotStyle::default();
        let png = render_curves(&[fold_curves("test"), fold_curves("train")], &style).unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!(image.width(), style.panel_size * 3);
        assert_eq!(image.height(), style.panel_size);
    }

    #[test]
    fn test_render_curves_is_deterministic() {
        let style = PlotStyle::default();
        let curves = [fold_curves("test")];
        assert_eq!(
            render_curves(&curves, &style).unwrap(),
            render_curves(&curves, &style).unwrap()
        );
    }

    #[test]
    fn test_ordered_folds() {
        let present = vec!["test".to_string(), "valid".to_string(), "train".to_string()];
        let preferred = vec!["train".to_string(), "test".to_string()];
        assert_eq!(ordered_folds(&present, &preferred), vec!["train", "test", "valid"]);

        let only_test = vec!["test".to_string()];
        assert_eq!(ordered_folds(&only_test, &preferred), vec!["test"]);
    }

    #[test]
    fn test_render_summary_tiny_values() {
        let summary = Summary {
            records: vec![SummaryRecord {
                fold: "test".to_string(),
                metric: "neg_log_loss".to_string(),
                value: 5e-324,
                label: "run".to_string(),
            }],
        };
        let png = render_summary(&summary, &SummaryConfig::default()).unwrap();
        assert!(image::load_from_memory(&png).is_ok());
    }

    #[test]
    fn test_render_summary_wraps_facets() {
        let mut records = Vec::new();
        for label in ["modelA", "modelB"] {
            for metric in ["accuracy", "F1", "precision", "recall"] {
                for fold in ["test", "train"] {
                    records.push(SummaryRecord {
                        fold: fold.to_string(),
                        metric: metric.to_string(),
                        value: 0.5,
                        label: label.to_string(),
                    });
                }
            }
        }
        let summary = Summary { records };
        let config = SummaryConfig::default();

        let png = render_summary(&summary, &config).unwrap();
        let image = image::load_from_memory(&png).unwrap();

        // four metrics wrapped at three per row give two rows of facets
        assert!(image.height() > 2 * config.style.facet_size);
        assert!(image.width() > 3 * config.style.facet_size);
    }
}
