//! Chart rendering.
//!
//! Charts are described by a [`ChartSpec`] (kind, labels, values, axis
//! text) and drawn with plotters. The output format follows the file
//! extension. Every chart is drawn into a temporary file next to the
//! target and renamed into place, so a reader never sees a half-written
//! image.

use crate::analysis::TopNResult;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const BAR_COLOR: RGBColor = RGBColor(229, 9, 20);
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const FONT: &str = "sans-serif";

/// Errors raised while rendering or publishing a chart.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Cannot write chart to {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported chart format '{0}' (use .png or .svg)")]
    UnsupportedFormat(String),

    #[error("Chart has no data to draw")]
    EmptyChart,

    #[error("Chart has {labels} labels but {values} values")]
    Mismatch { labels: usize, values: usize },

    #[error("Failed to draw chart: {0}")]
    Render(String),
}

/// Kind of chart to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    /// Pre-binned data drawn as adjacent bars.
    Histogram,
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Display settings for the top-N category chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Top 10 Content Producing Countries on Netflix".to_string(),
            x_label: "Country".to_string(),
            y_label: "Number of Titles".to_string(),
            width: 1000,
            height: 500,
        }
    }
}

impl ChartOptions {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl ChartSpec {
    /// Bar chart of a top-N result, categories in result order.
    pub fn from_top_n(result: &TopNResult, options: &ChartOptions) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: options.title.clone(),
            x_label: options.x_label.clone(),
            y_label: options.y_label.clone(),
            labels: result.labels(),
            values: result.entries.iter().map(|e| e.count as f64).collect(),
        }
    }

    /// Check the data before any file is touched.
    pub fn validate(&self) -> Result<(), ChartError> {
        if self.labels.is_empty() {
            return Err(ChartError::EmptyChart);
        }
        if self.labels.len() != self.values.len() {
            return Err(ChartError::Mismatch {
                labels: self.labels.len(),
                values: self.values.len(),
            });
        }
        Ok(())
    }
}

/// Output image format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self, ChartError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            _ => Err(ChartError::UnsupportedFormat(ext)),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Svg => ".svg",
        }
    }
}

/// Render a top-N result as a bar chart at `path`.
pub fn render_top_n(
    result: &TopNResult,
    options: &ChartOptions,
    path: &Path,
) -> Result<(), ChartError> {
    let spec = ChartSpec::from_top_n(result, options);
    render_spec(&spec, options.size(), path)
}

/// Render any chart spec at `path`, creating missing parent directories and
/// replacing an existing file.
pub fn render_spec(spec: &ChartSpec, size: (u32, u32), path: &Path) -> Result<(), ChartError> {
    spec.validate()?;
    let format = ImageFormat::from_path(path)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|source| ChartError::FileWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let staged = tempfile::Builder::new()
        .prefix(".chart-")
        .suffix(format.suffix())
        .tempfile_in(parent)
        .map_err(|source| ChartError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    debug!("Drawing {:?} chart into {}", spec.kind, staged.path().display());

    match format {
        ImageFormat::Png => draw(BitMapBackend::new(staged.path(), size).into_drawing_area(), spec)?,
        ImageFormat::Svg => draw(SVGBackend::new(staged.path(), size).into_drawing_area(), spec)?,
    }

    if let Some(permissions) = published_permissions(path) {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|source| ChartError::FileWrite {
                path: staged.path().to_path_buf(),
                source,
            })?;
    }

    staged.persist(path).map_err(|e| ChartError::FileWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!("Chart saved to {}", path.display());
    Ok(())
}

/// Permissions for a published chart. An existing target keeps its mode;
/// a new one is world-readable like any regularly created file.
fn published_permissions(path: &Path) -> Option<std::fs::Permissions> {
    if let Ok(meta) = std::fs::metadata(path) {
        return Some(meta.permissions());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(std::fs::Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

fn render_err<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ChartError {
    ChartError::Render(err.to_string())
}

fn draw<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<(), ChartError> {
    root.fill(&WHITE).map_err(render_err)?;

    let count = spec.labels.len() as u32;
    let max = spec.values.iter().copied().fold(0.0_f64, f64::max);
    let min = spec.values.iter().copied().fold(0.0_f64, f64::min);
    let y_top = if max > 0.0 { max * 1.1 } else { 1.0 };
    let y_bottom = if min < 0.0 { min * 1.1 } else { 0.0 };

    // rotated labels need room proportional to the longest one
    let longest = spec.labels.iter().map(|l| l.chars().count()).max().unwrap_or(1) as u32;
    let label_area = (longest * 8 + 30).clamp(50, 240);

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, (FONT, 26))
        .margin(20)
        .x_label_area_size(label_area)
        .y_label_area_size(70)
        .build_cartesian_2d((0..count).into_segmented(), y_bottom..y_top)
        .map_err(render_err)?;

    let labels = &spec.labels;
    let formatter = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&formatter)
        .x_label_style(TextStyle::from((FONT, 14.0).into_font()).transform(FontTransform::Rotate90))
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .axis_desc_style((FONT, 16))
        .draw()
        .map_err(render_err)?;

    match spec.kind {
        ChartKind::Bar | ChartKind::Histogram => {
            let margin = if spec.kind == ChartKind::Histogram { 0 } else { 8 };
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(BAR_COLOR.filled())
                        .margin(margin)
                        .data(spec.values.iter().enumerate().map(|(i, v)| (i as u32, *v))),
                )
                .map_err(render_err)?;
        }
        ChartKind::Line => {
            let points: Vec<(SegmentValue<u32>, f64)> = spec
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| (SegmentValue::CenterOf(i as u32), *v))
                .collect();

            chart
                .draw_series(LineSeries::new(points.clone(), LINE_COLOR.stroke_width(2)))
                .map_err(render_err)?;
            chart
                .draw_series(
                    points
                        .into_iter()
                        .map(|p| Circle::new(p, 3, LINE_COLOR.filled())),
                )
                .map_err(render_err)?;
        }
    }

    root.present().map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CategoryCount;
    use tempfile::TempDir;

    fn sample_result() -> TopNResult {
        TopNResult {
            entries: vec![
                CategoryCount {
                    token: "United States".to_string(),
                    count: 4,
                },
                CategoryCount {
                    token: "India".to_string(),
                    count: 3,
                },
            ],
        }
    }

    #[test]
    fn test_image_format_from_path() {
        assert_eq!(
            ImageFormat::from_path(Path::new("out/top.png")).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_path(Path::new("TOP.SVG")).unwrap(),
            ImageFormat::Svg
        );
        assert!(matches!(
            ImageFormat::from_path(Path::new("top.gif")),
            Err(ChartError::UnsupportedFormat(ext)) if ext == "gif"
        ));
    }

    #[test]
    fn test_spec_from_top_n() {
        let spec = ChartSpec::from_top_n(&sample_result(), &ChartOptions::default());
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.labels, vec!["United States", "India"]);
        assert_eq!(spec.values, vec![4.0, 3.0]);
        assert_eq!(spec.x_label, "Country");
        assert_eq!(spec.y_label, "Number of Titles");
    }

    #[test]
    fn test_empty_chart_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/top.png");

        let result = render_top_n(&TopNResult::default(), &ChartOptions::default(), &path);
        assert!(matches!(result, Err(ChartError::EmptyChart)));
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn test_mismatched_spec() {
        let spec = ChartSpec {
            kind: ChartKind::Line,
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            labels: vec!["2019".to_string(), "2020".to_string()],
            values: vec![1.0],
        };
        assert!(matches!(
            spec.validate(),
            Err(ChartError::Mismatch { labels: 2, values: 1 })
        ));
    }

    #[test]
    fn test_render_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exports/charts/top_countries.png");

        render_top_n(&sample_result(), &ChartOptions::default(), &path).unwrap();

        assert!(path.is_file());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        // no staging files left behind
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".chart-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_render_overwrites_existing_svg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chart.svg");
        std::fs::write(&path, "old").unwrap();

        let spec = ChartSpec {
            kind: ChartKind::Line,
            title: "Titles per year".to_string(),
            x_label: "Year".to_string(),
            y_label: "Titles".to_string(),
            labels: vec!["2019".to_string(), "2020".to_string(), "2021".to_string()],
            values: vec![3.0, 5.0, 4.0],
        };
        render_spec(&spec, (640, 480), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<svg"));
        assert!(content.contains("Titles per year"));
    }

    #[cfg(unix)]
    #[test]
    fn test_new_chart_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("top.png");
        render_top_n(&sample_result(), &ChartOptions::default(), &path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("top.png");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o664)).unwrap();

        render_top_n(&sample_result(), &ChartOptions::default(), &path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
        assert!(std::fs::metadata(&path).unwrap().len() > 3);
    }

    #[test]
    fn test_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let path = blocker.join("top.png");
        let result = render_top_n(&sample_result(), &ChartOptions::default(), &path);
        assert!(matches!(result, Err(ChartError::FileWrite { .. })));
    }
}
