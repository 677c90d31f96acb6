//! Rendering of the history chart attached to alerts.
//!
//! The chart covers a trailing window ending at `now`. Record timestamps are
//! re-expressed as hours relative to `now` (negative = past), so the x-axis
//! always runs from `-hours` to `0`. The y-axis starts at zero.
//!
//! ```text
//!  TDS (ppm)      TDS values in last 48 hrs
//!   500 ┌──────┬──────┬──────┬──────┐
//!       │      │   ╱╲ │      │      │
//!   250 ├──────┼──╱───╲──────┼──────┤
//!       │  ───╱│      │ ╲────┼───   │
//!     0 └──────┴──────┴──────┴──────┘
//!      -48    -36    -24    -12     0
//!                  time (hrs)
//! ```
//!
//! Rendering is deterministic for the same records and `now`.

mod canvas;
mod viewport;

pub use canvas::Canvas;
pub use viewport::{nice_ceiling, DataBounds, DataPoint, Viewport, ViewportPadding};

use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_9X15_BOLD};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use thiserror::Error;

use tdswatch_types::{LogRecord, Timestamp};

/// Chart width in pixels.
pub const CHART_WIDTH_PX: u32 = 640;
/// Chart height in pixels.
pub const CHART_HEIGHT_PX: u32 = 480;

const PADDING: ViewportPadding = ViewportPadding::new(48, 24, 56, 64);
const X_DIVISIONS: u32 = 8;
const Y_DIVISIONS: u32 = 5;

const BACKGROUND: Rgb888 = Rgb888::WHITE;
const AXIS_COLOR: Rgb888 = Rgb888::BLACK;
const GRID_COLOR: Rgb888 = Rgb888::new(0xdd, 0xdd, 0xdd);
const TEXT_COLOR: Rgb888 = Rgb888::new(0x33, 0x33, 0x33);
const SERIES_COLOR: Rgb888 = Rgb888::new(0x1f, 0x77, 0xb4);

/// Labels drawn on the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl ChartLabels {
    /// Labels for a TDS chart over `hours`.
    pub fn tds(hours: u32) -> Self {
        Self {
            title: format!("TDS values in last {} hrs", hours),
            x_label: "time (hrs)".to_string(),
            y_label: "TDS (ppm)".to_string(),
        }
    }
}

/// Errors producing a chart.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("could not write chart {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<Infallible> for ChartError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// A rendered chart, written to disk and kept in memory for attaching.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    /// Where the image was written.
    pub path: PathBuf,
    /// PNG bytes.
    pub bytes: Vec<u8>,
    /// When the chart was rendered.
    pub generated_at: Timestamp,
}

impl ChartArtifact {
    /// File name for a chart generated at `generated_at`: `YYYYmmddHHMMSS.png` (UTC).
    pub fn file_name(generated_at: Timestamp) -> String {
        let secs = generated_at.as_secs();
        let datetime = DateTime::<Utc>::from_timestamp(secs.floor() as i64, 0).unwrap_or_default();
        format!("{}.png", datetime.format("%Y%m%d%H%M%S"))
    }

    /// Write `bytes` into `dir` under the name derived from `generated_at`.
    pub fn write(dir: &Path, generated_at: Timestamp, bytes: Vec<u8>) -> Result<Self, ChartError> {
        let path = dir.join(Self::file_name(generated_at));
        let write_err = |source| ChartError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(write_err)?;
        fs::write(&path, &bytes).map_err(write_err)?;
        Ok(Self {
            path,
            bytes,
            generated_at,
        })
    }

    /// File name component of `path`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string())
    }
}

/// Render `records` as a PNG line chart of the `hours` before `now`.
///
/// Records outside the window are ignored.
pub fn render_chart<I>(
    records: I,
    now: Timestamp,
    hours: u32,
    labels: &ChartLabels,
) -> Result<Vec<u8>, ChartError>
where
    I: IntoIterator<Item = LogRecord>,
{
    let points: Vec<DataPoint> = records
        .into_iter()
        .map(|r| DataPoint::new(r.timestamp.offset_hours(now), r.value))
        .filter(|p| p.x >= -(hours as f64) && p.x <= 0.0)
        .collect();

    let bounds = DataBounds::trailing(hours as f64, &points);
    let screen = Rectangle::new(Point::zero(), Size::new(CHART_WIDTH_PX, CHART_HEIGHT_PX));
    let viewport = Viewport::new(bounds, screen, PADDING);

    let mut canvas = Canvas::new(CHART_WIDTH_PX, CHART_HEIGHT_PX, BACKGROUND);
    draw_grid(&mut canvas, &viewport)?;
    draw_axes(&mut canvas, &viewport)?;
    draw_series(&mut canvas, &viewport, &points)?;
    draw_labels(&mut canvas, &viewport, labels)?;

    Ok(canvas.to_png()?)
}

fn draw_grid<D: DrawTarget<Color = Rgb888>>(display: &mut D, viewport: &Viewport) -> Result<(), D::Error> {
    let area = viewport.plot_area();
    let style = PrimitiveStyle::with_stroke(GRID_COLOR, 1);
    let left = area.top_left.x;
    let top = area.top_left.y;
    let right = left + area.size.width as i32;
    let bottom = top + area.size.height as i32;

    for i in 1..X_DIVISIONS {
        let x = left + (area.size.width * i / X_DIVISIONS) as i32;
        Line::new(Point::new(x, top), Point::new(x, bottom))
            .into_styled(style)
            .draw(display)?;
    }
    for i in 1..Y_DIVISIONS {
        let y = top + (area.size.height * i / Y_DIVISIONS) as i32;
        Line::new(Point::new(left, y), Point::new(right, y))
            .into_styled(style)
            .draw(display)?;
    }
    Ok(())
}

fn draw_axes<D: DrawTarget<Color = Rgb888>>(display: &mut D, viewport: &Viewport) -> Result<(), D::Error> {
    let area = viewport.plot_area();
    let bounds = viewport.data_bounds();
    let left = area.top_left.x;
    let top = area.top_left.y;
    let bottom = top + area.size.height as i32;
    let label_style = MonoTextStyle::new(&FONT_6X10, TEXT_COLOR);

    area.into_styled(PrimitiveStyle::with_stroke(AXIS_COLOR, 1))
        .draw(display)?;

    for i in 0..=X_DIVISIONS {
        let x = left + (area.size.width * i / X_DIVISIONS) as i32;
        let hours = bounds.x_min + bounds.x_range() * i as f64 / X_DIVISIONS as f64;
        Text::with_alignment(
            &format_tick(hours),
            Point::new(x, bottom + 14),
            label_style,
            Alignment::Center,
        )
        .draw(display)?;
    }

    for i in 0..=Y_DIVISIONS {
        let y = bottom - (area.size.height * i / Y_DIVISIONS) as i32;
        let value = bounds.y_min + bounds.y_range() * i as f64 / Y_DIVISIONS as f64;
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Right)
            .baseline(Baseline::Middle)
            .build();
        Text::with_text_style(&format_tick(value), Point::new(left - 6, y), label_style, text_style)
            .draw(display)?;
    }
    Ok(())
}

fn draw_series<D: DrawTarget<Color = Rgb888>>(
    display: &mut D,
    viewport: &Viewport,
    points: &[DataPoint],
) -> Result<(), D::Error> {
    let line_style = PrimitiveStyle::with_stroke(SERIES_COLOR, 2);
    let dot_style = PrimitiveStyle::with_fill(SERIES_COLOR);

    let screen: Vec<Point> = points.iter().filter_map(|p| viewport.data_to_screen(*p)).collect();

    for pair in screen.windows(2) {
        Line::new(pair[0], pair[1]).into_styled(line_style).draw(display)?;
    }
    for point in &screen {
        Circle::with_center(*point, 4).into_styled(dot_style).draw(display)?;
    }
    Ok(())
}

fn draw_labels<D: DrawTarget<Color = Rgb888>>(
    display: &mut D,
    viewport: &Viewport,
    labels: &ChartLabels,
) -> Result<(), D::Error> {
    let area = viewport.plot_area();
    let center_x = area.top_left.x + area.size.width as i32 / 2;
    let bottom = area.top_left.y + area.size.height as i32;

    Text::with_alignment(
        &labels.title,
        Point::new(center_x, 24),
        MonoTextStyle::new(&FONT_9X15_BOLD, TEXT_COLOR),
        Alignment::Center,
    )
    .draw(display)?;

    let axis_style = MonoTextStyle::new(&FONT_6X10, TEXT_COLOR);
    Text::with_alignment(&labels.x_label, Point::new(center_x, bottom + 36), axis_style, Alignment::Center)
        .draw(display)?;
    Text::with_alignment(&labels.y_label, Point::new(8, area.top_left.y - 10), axis_style, Alignment::Left)
        .draw(display)?;
    Ok(())
}

/// Tick label: integer when whole, else one decimal.
fn format_tick(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{:.1}", value)
    }
}
