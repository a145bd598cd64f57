// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Raster drawing primitives for report figures
//!
//! A small RGB canvas with lines, markers, rectangles, a 5x7 bitmap font and
//! chart axes, encoded to PNG. Every call receives its colors and sizes
//! explicitly; nothing here holds global styling state.

use crate::config::PlotStyle;
use crate::error::{EvalError, EvalResult};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgb, RgbImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Rows of a 5x7 glyph, top to bottom, most significant bit on the left
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '\\' => [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '[' => [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E],
        ']' => [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Width in pixels of `text` drawn at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return 0;
    }
    (chars * GLYPH_ADVANCE - 1) * scale
}

/// Height in pixels of one line of text drawn at `scale`
pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Horizontal placement of text relative to its anchor point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

/// An RGB drawing surface
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width.max(1), height.max(1), Rgb(background)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// Set one pixel; coordinates outside the canvas are ignored
    pub fn put(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, Rgb(color));
    }

    /// Fill the rectangle spanned by two corners
    pub fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        for y in top..bottom {
            for x in left..right {
                self.put(x, y, color);
            }
        }
    }

    /// Outline the rectangle spanned by two corners
    pub fn stroke_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        for x in left..=right {
            self.put(x, top, color);
            self.put(x, bottom, color);
        }
        for y in top..=bottom {
            self.put(left, y, color);
            self.put(right, y, color);
        }
    }

    fn stamp(&mut self, x: f64, y: f64, color: [u8; 3], width: u32) {
        let width = width.max(1) as i64;
        let cx = x.round() as i64;
        let cy = y.round() as i64;
        let start = -(width / 2);
        for dy in start..start + width {
            for dx in start..start + width {
                self.put(cx + dx, cy + dy, color);
            }
        }
    }

    /// Solid line with a square brush of `width` pixels
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), color: [u8; 3], width: u32) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.stamp(from.0 + dx * t, from.1 + dy * t, color, width);
        }
    }

    /// Line drawn as alternating dashes and gaps of `dash` pixels
    pub fn dashed_line(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        color: [u8; 3],
        width: u32,
        dash: f64,
    ) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 || dash <= 0.0 {
            self.line(from, to, color, width);
            return;
        }
        let mut start = 0.0;
        while start < length {
            let end = (start + dash).min(length);
            let a = (from.0 + dx * start / length, from.1 + dy * start / length);
            let b = (from.0 + dx * end / length, from.1 + dy * end / length);
            self.line(a, b, color, width);
            start += 2.0 * dash;
        }
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], color: [u8; 3], width: u32) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color, width);
        }
    }

    /// Filled circular marker
    pub fn marker(&mut self, center: (f64, f64), radius: f64, color: [u8; 3]) {
        let r = radius.ceil() as i64;
        let cx = center.0.round() as i64;
        let cy = center.1.round() as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if ((dx * dx + dy * dy) as f64) <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Horizontal text with its top edge at `y`
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: [u8; 3], scale: u32, anchor: Anchor) {
        let scale = scale.max(1);
        let width = text_width(text, scale) as i64;
        let left = match anchor {
            Anchor::Left => x,
            Anchor::Center => x - width / 2,
            Anchor::Right => x - width,
        };
        for (i, c) in text.chars().enumerate() {
            let origin = left + (i as u32 * GLYPH_ADVANCE * scale) as i64;
            let rows = glyph(c);
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    let px = origin + (col * scale) as i64;
                    let py = y + (row as u32 * scale) as i64;
                    self.fill_rect(px, py, px + scale as i64, py + scale as i64, color);
                }
            }
        }
    }

    /// Text rotated counter-clockwise by `degrees` about its anchor point
    ///
    /// The anchor point sits on the vertical middle of the text; `anchor`
    /// picks which end of the text it refers to.
    pub fn text_rotated(
        &mut self,
        at: (f64, f64),
        text: &str,
        color: [u8; 3],
        scale: u32,
        degrees: f64,
        anchor: Anchor,
    ) {
        let scale = scale.max(1);
        let width = text_width(text, scale) as f64;
        let height = text_height(scale) as f64;
        let offset = match anchor {
            Anchor::Left => 0.0,
            Anchor::Center => -width / 2.0,
            Anchor::Right => -width,
        };
        let (sin, cos) = degrees.to_radians().sin_cos();
        // Half-pixel sampling keeps diagonal strokes free of gaps
        let samples = scale * 2;

        for (i, c) in text.chars().enumerate() {
            let origin = (i as u32 * GLYPH_ADVANCE * scale) as f64;
            for (row, bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    for sy in 0..samples {
                        for sx in 0..samples {
                            let lx = offset + origin + (col * scale) as f64 + sx as f64 / 2.0;
                            let ly = (row as u32 * scale) as f64 + sy as f64 / 2.0 - height / 2.0;
                            let x = at.0 + lx * cos + ly * sin;
                            let y = at.1 - lx * sin + ly * cos;
                            self.put(x.round() as i64, y.round() as i64, color);
                        }
                    }
                }
            }
        }
    }

    /// Encode the canvas as PNG
    pub fn to_png(&self) -> EvalResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new(&mut buffer);
        encoder
            .write_image(self.image.as_raw(), self.width(), self.height(), ColorType::Rgb8)
            .map_err(|e| EvalError::Render {
                name: "png".to_string(),
                message: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Roughly `target` evenly spaced round values covering `[min, max]`
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![min];
    }
    let step = tick_step(range, target);
    let first = (min / step).ceil() as i64;
    let last = (max / step + 1e-9).floor() as i64;
    if last < first || last.saturating_sub(first) > 4 * target.max(1) as i64 {
        return vec![min, max];
    }
    (first..=last)
        .map(|i| {
            let value = i as f64 * step;
            if value.abs() < step * 1e-9 {
                0.0
            } else {
                value
            }
        })
        .collect()
}

fn tick_step(range: f64, target: usize) -> f64 {
    let raw = range / target.max(1) as f64;
    if !raw.is_normal() {
        return range;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let factor = if normalized < 1.5 {
        1.0
    } else if normalized < 3.0 {
        2.0
    } else if normalized < 7.0 {
        5.0
    } else {
        10.0
    };
    let step = factor * magnitude;
    if step > 0.0 && step.is_finite() {
        step
    } else {
        range
    }
}

/// Format a tick value with as many decimals as its spacing needs
pub fn format_tick(value: f64, ticks: &[f64]) -> String {
    let step = match ticks {
        [a, b, ..] => (b - a).abs(),
        _ => 1.0,
    };
    let decimals = if step > 0.0 && step < 1.0 {
        (-step.log10().floor()) as usize
    } else {
        0
    };
    format!("{:.*}", decimals, value)
}

/// Titles of a chart and its axes
#[derive(Debug, Clone, Copy)]
pub struct AxisLabels<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

/// Plot area of a chart mapping data coordinates onto pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl Axes {
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let px = self.left + (x - x0) / (x1 - x0) * self.width;
        let py = self.top + self.height - (y - y0) / (y1 - y0) * self.height;
        (px, py)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Grid, frame, ticks and labels; `x_ticks` may be empty for categorical axes
    pub fn draw_frame(
        &self,
        canvas: &mut Canvas,
        style: &PlotStyle,
        labels: AxisLabels<'_>,
        x_ticks: &[f64],
        y_ticks: &[f64],
    ) {
        let scale = style.font_scale.max(1);
        let glyph_h = text_height(scale) as f64;

        for &tick in y_ticks {
            let (_, y) = self.to_pixel(self.x_range.0, tick);
            canvas.line((self.left, y), (self.right(), y), style.grid, 1);
        }
        for &tick in x_ticks {
            let (x, _) = self.to_pixel(tick, self.y_range.0);
            canvas.line((x, self.top), (x, self.bottom()), style.grid, 1);
        }

        canvas.stroke_rect(
            self.left.round() as i64,
            self.top.round() as i64,
            self.right().round() as i64,
            self.bottom().round() as i64,
            style.foreground,
        );

        for &tick in y_ticks {
            let (_, y) = self.to_pixel(self.x_range.0, tick);
            canvas.line((self.left - 5.0, y), (self.left, y), style.foreground, 1);
            canvas.text(
                (self.left - 8.0).round() as i64,
                (y - glyph_h / 2.0).round() as i64,
                &format_tick(tick, y_ticks),
                style.foreground,
                scale,
                Anchor::Right,
            );
        }
        for &tick in x_ticks {
            let (x, _) = self.to_pixel(tick, self.y_range.0);
            canvas.line((x, self.bottom()), (x, self.bottom() + 5.0), style.foreground, 1);
            canvas.text(
                x.round() as i64,
                (self.bottom() + 8.0).round() as i64,
                &format_tick(tick, x_ticks),
                style.foreground,
                scale,
                Anchor::Center,
            );
        }

        let center_x = self.left + self.width / 2.0;
        canvas.text(
            center_x.round() as i64,
            (self.top - glyph_h - 10.0).round() as i64,
            labels.title,
            style.foreground,
            scale,
            Anchor::Center,
        );
        if !labels.x.is_empty() {
            canvas.text(
                center_x.round() as i64,
                (self.bottom() + 16.0 + glyph_h).round() as i64,
                labels.x,
                style.foreground,
                scale,
                Anchor::Center,
            );
        }
        if !labels.y.is_empty() {
            let widest_tick = y_ticks
                .iter()
                .map(|&t| text_width(&format_tick(t, y_ticks), scale))
                .max()
                .unwrap_or(0) as f64;
            canvas.text_rotated(
                (self.left - widest_tick - 14.0 - glyph_h / 2.0, self.top + self.height / 2.0),
                labels.y,
                style.foreground,
                scale,
                90.0,
                Anchor::Center,
            );
        }
    }
}

/// How a legend entry is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendMark {
    Line,
    LineMarker,
    Patch,
}

/// Size of a legend box holding `names`
pub fn legend_size(names: &[&str], scale: u32) -> (u32, u32) {
    let widest = names.iter().map(|n| text_width(n, scale)).max().unwrap_or(0);
    let row = text_height(scale) + 8;
    (widest + 44, row * names.len() as u32 + 8)
}

/// Boxed legend with its top-left corner at `at`
pub fn draw_legend(
    canvas: &mut Canvas,
    style: &PlotStyle,
    at: (i64, i64),
    entries: &[(&str, [u8; 3])],
    mark: LegendMark,
) {
    let scale = style.font_scale.max(1);
    let names: Vec<&str> = entries.iter().map(|(n, _)| *n).collect();
    let (width, height) = legend_size(&names, scale);
    let (x, y) = at;

    canvas.fill_rect(x, y, x + width as i64, y + height as i64, style.background);
    canvas.stroke_rect(x, y, x + width as i64, y + height as i64, style.grid);

    let row = (text_height(scale) + 8) as i64;
    for (i, (name, color)) in entries.iter().enumerate() {
        let top = y + 4 + i as i64 * row;
        let mid = (top + row / 2 - 4) as f64;
        match mark {
            LegendMark::Line => {
                canvas.line((x as f64 + 8.0, mid), (x as f64 + 30.0, mid), *color, style.line_width);
            }
            LegendMark::LineMarker => {
                canvas.line((x as f64 + 8.0, mid), (x as f64 + 30.0, mid), *color, style.line_width);
                canvas.marker((x as f64 + 19.0, mid), 3.5, *color);
            }
            LegendMark::Patch => {
                canvas.fill_rect(x + 10, mid as i64 - 6, x + 28, mid as i64 + 6, *color);
            }
        }
        canvas.text(x + 36, top, name, style.foreground, scale, Anchor::Left);
    }
}
