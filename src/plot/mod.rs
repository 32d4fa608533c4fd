pub mod period;

pub use period::Period;

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use plotters::coord::Shift;
use plotters::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{Sample, resample_hourly};
use crate::storage::{self, StorageError};

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("No data available for period {0}")]
    NoData(Period),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, PlotError>;

/// Where a chart gets drawn. An `.svg` extension selects vector output, anything else PNG.
#[derive(Debug, Clone)]
pub struct ChartTarget {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Points ready to draw for one period
#[derive(Debug, Clone)]
pub struct ChartData {
    pub period: Period,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub samples: Vec<Sample>,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub path: PathBuf,
    pub points: usize,
    pub files: usize,
}

/// Daily files under `root` whose date falls inside `period`, oldest first
pub fn select_files(root: &Path, period: Period, now: NaiveDateTime) -> Result<Vec<PathBuf>> {
    Ok(storage::list_dates(root)?
        .into_iter()
        .filter(|date| period.includes(*date, now))
        .map(|date| storage::daily_file_path(root, date))
        .collect())
}

/// Load, order and (for periods longer than a day) resample the data of `period`
pub fn prepare_chart(root: &Path, period: Period, now: NaiveDateTime) -> Result<ChartData> {
    let files = select_files(root, period, now)?;
    if files.is_empty() {
        info!("No daily files for period {}", period);
        return Err(PlotError::NoData(period));
    }

    let mut samples = Vec::new();
    for path in &files {
        for reading in storage::load_daily_file(path)? {
            match Sample::from_reading(&reading) {
                Some(sample) => samples.push(sample),
                None => warn!("Skipping reading with invalid timestamp in {}: {:?}", path.display(), reading),
            }
        }
    }
    samples.sort_by_key(|s| s.timestamp);

    if period.is_resampled() {
        let raw = samples.len();
        samples = resample_hourly(&samples);
        debug!("Resampled {} readings into {} hourly points", raw, samples.len());
    }

    let (start, end) = period.window(now);
    Ok(ChartData {
        period,
        start,
        end,
        samples,
        files: files.len(),
    })
}

/// Draw the scatter chart for `period` into `target`, replacing whatever was there.
///
/// When no daily file matches, `PlotError::NoData` is returned and the target is left alone.
pub fn plot_period(root: &Path, period: Period, target: &ChartTarget, now: NaiveDateTime) -> Result<RenderedChart> {
    let data = prepare_chart(root, period, now)?;
    let points = render(&data, target)?;
    info!("Rendered {} points from {} files to {}", points, data.files, target.path.display());
    Ok(RenderedChart {
        path: target.path.clone(),
        points,
        files: data.files,
    })
}

fn render(data: &ChartData, target: &ChartTarget) -> Result<usize> {
    let size = (target.width, target.height);
    let is_svg = target
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    replace_on_success(&target.path, |scratch| {
        if is_svg {
            draw_scatter(SVGBackend::new(scratch, size).into_drawing_area(), data)
        } else {
            draw_scatter(BitMapBackend::new(scratch, size).into_drawing_area(), data)
        }
    })
}

/// Hidden file next to `target` that a chart is drawn into before it replaces the target.
/// Keeps the target's extension since the bitmap encoder picks its format from it.
fn scratch_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chart".to_string());
    let ext = target
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    target.with_file_name(format!(".{}.partial.{}", stem, ext))
}

/// Run `draw` against a scratch file and move the result over `target` only if drawing succeeded.
///
/// plotters backends write their file on drop even after an error.
fn replace_on_success<F>(target: &Path, draw: F) -> Result<usize>
where
    F: FnOnce(&Path) -> std::result::Result<usize, Box<dyn std::error::Error>>,
{
    let scratch = scratch_path(target);
    match draw(&scratch) {
        Ok(points) => {
            std::fs::rename(&scratch, target).map_err(StorageError::from)?;
            Ok(points)
        }
        Err(e) => {
            if scratch.exists() {
                if let Err(rm) = std::fs::remove_file(&scratch) {
                    warn!("Could not remove {}: {}", scratch.display(), rm);
                }
            }
            Err(PlotError::Render(e.to_string()))
        }
    }
}

fn hours_since(start: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - start).num_seconds() as f64 / 3600.0
}

/// Samples inside the chart window, paired with their x position in hours from the window start
fn visible_points(data: &ChartData) -> Vec<(f64, Sample)> {
    data.samples
        .iter()
        .filter(|s| s.timestamp >= data.start && s.timestamp <= data.end)
        .map(|s| (hours_since(data.start, s.timestamp), *s))
        .collect()
}

/// Shared y range of temperature and humidity with a little headroom
fn value_range(points: &[(f64, Sample)]) -> (f64, f64) {
    let (lo, hi) = points
        .iter()
        .flat_map(|(_, s)| [s.temperature, s.humidity])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 100.0);
    }
    let pad = ((hi - lo) * 0.05).max(1.0);
    (lo - pad, hi + pad)
}

fn draw_scatter<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    data: &ChartData,
) -> std::result::Result<usize, Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let start = data.start;
    let span = hours_since(start, data.end);
    let visible = visible_points(data);
    let (y_min, y_max) = value_range(&visible);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Dane dla okresu: {}", data.period.label()), ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..span, y_min..y_max)?;

    let axis_format = data.period.axis_format();
    let x_label = |x: &f64| {
        let ts = start + Duration::seconds((x * 3600.0).round() as i64);
        ts.format(axis_format).to_string()
    };
    chart
        .configure_mesh()
        .x_desc("Czas")
        .y_desc("Wartości")
        .x_label_formatter(&x_label)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let temperature = RED.mix(0.7);
    let humidity = BLUE.mix(0.7);

    chart
        .draw_series(visible.iter().map(|(x, s)| Circle::new((*x, s.temperature), 3, temperature.filled())))?
        .label("Temperatura")
        .legend(move |(x, y)| Circle::new((x, y), 3, temperature.filled()));
    chart
        .draw_series(visible.iter().map(|(x, s)| Circle::new((*x, s.humidity), 3, humidity.filled())))?
        .label("Wilgotność")
        .legend(move |(x, y)| Circle::new((x, y), 3, humidity.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(visible.len())
}
