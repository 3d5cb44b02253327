use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error_handling::types::RenderError;
use crate::reporting::types::{Chart, ChartData};
use crate::storage::types::DISPLAY_TIME_FORMAT;

/// The rendering collaborator: turns a chart into one artifact named after
/// `output_key` and reports where it went.
pub trait Renderer {
    fn render(&mut self, chart: &Chart, output_key: &str) -> Result<PathBuf, RenderError>;
}

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 60.0;

/// Writes each chart as a standalone SVG file under `output_dir`.
pub struct SvgRenderer {
    output_dir: PathBuf,
}

impl SvgRenderer {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self, RenderError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `chart` to SVG markup.
    pub fn to_svg(chart: &Chart) -> Result<String, RenderError> {
        if chart.data.is_empty() {
            return Err(RenderError::EmptySeries(chart.title.clone()));
        }
        let mut svg = String::new();
        write_svg(&mut svg, chart)?;
        Ok(svg)
    }
}

fn write_svg(svg: &mut impl fmt::Write, chart: &Chart) -> fmt::Result {
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = WIDTH,
        h = HEIGHT
    )?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0,
        escape(&chart.title)
    )?;
    axes(svg, chart)?;
    match &chart.data {
        ChartData::Line(points) => line(svg, points)?,
        ChartData::Bar(bars) => bar(svg, bars)?,
    }
    writeln!(svg, "</svg>")
}

impl Renderer for SvgRenderer {
    fn render(&mut self, chart: &Chart, output_key: &str) -> Result<PathBuf, RenderError> {
        let svg = Self::to_svg(chart)?;
        let path = self.output_dir.join(format!("{}.svg", output_key));
        fs::write(&path, svg)?;
        info!("Rendered '{}' to {}", chart.title, path.display());
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn plot_width() -> f64 {
    WIDTH - 2.0 * MARGIN
}

fn plot_height() -> f64 {
    HEIGHT - 2.0 * MARGIN
}

fn y_of(value: u64, max: u64) -> f64 {
    HEIGHT - MARGIN - (value as f64 / max.max(1) as f64) * plot_height()
}

fn max_value(chart: &Chart) -> u64 {
    match &chart.data {
        ChartData::Line(points) => points.iter().map(|(_, v)| *v).max().unwrap_or(0),
        ChartData::Bar(bars) => bars.iter().map(|(_, v)| *v).max().unwrap_or(0),
    }
}

fn axes(svg: &mut impl fmt::Write, chart: &Chart) -> fmt::Result {
    let bottom = HEIGHT - MARGIN;
    let right = WIDTH - MARGIN;
    let max = max_value(chart);
    writeln!(
        svg,
        r#"<polyline points="{m},{m} {m},{b} {r},{b}" fill="none" stroke="black"/>"#,
        m = MARGIN,
        b = bottom,
        r = right
    )?;
    writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-size="11">0</text>"#,
        MARGIN - 6.0,
        bottom
    )?;
    writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-size="11">{}</text>"#,
        MARGIN - 6.0,
        MARGIN + 4.0,
        max
    )?;
    writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">{}</text>"#,
        WIDTH / 2.0,
        HEIGHT - 12.0,
        escape(&chart.x_label)
    )?;
    writeln!(
        svg,
        r#"<text x="18" y="{y}" text-anchor="middle" font-size="13" transform="rotate(-90 18 {y})">{}</text>"#,
        escape(&chart.y_label),
        y = HEIGHT / 2.0
    )
}

fn line(svg: &mut impl fmt::Write, points: &[(chrono::NaiveDateTime, u64)]) -> fmt::Result {
    let max = points.iter().map(|(_, v)| *v).max().unwrap_or(0);
    let step = plot_width() / (points.len().saturating_sub(1).max(1)) as f64;
    let coords: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, (_, v))| format!("{:.1},{:.1}", MARGIN + step * i as f64, y_of(*v, max)))
        .collect();
    writeln!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="steelblue" stroke-width="2"/>"#,
        coords.join(" ")
    )?;
    if let (Some((first, _)), Some((last, _))) = (points.first(), points.last()) {
        let baseline = HEIGHT - MARGIN + 16.0;
        writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="10">{}</text>"#,
            MARGIN,
            baseline,
            first.format(DISPLAY_TIME_FORMAT)
        )?;
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-size="10">{}</text>"#,
            WIDTH - MARGIN,
            baseline,
            last.format(DISPLAY_TIME_FORMAT)
        )?;
    }
    debug!("Plotted {} point(s)", points.len());
    Ok(())
}

fn bar(svg: &mut impl fmt::Write, bars: &[(String, u64)]) -> fmt::Result {
    let max = bars.iter().map(|(_, v)| *v).max().unwrap_or(0);
    let slot = plot_width() / bars.len() as f64;
    let width = slot * 0.8;
    for (i, (label, value)) in bars.iter().enumerate() {
        let x = MARGIN + slot * i as f64 + (slot - width) / 2.0;
        let y = y_of(*value, max);
        writeln!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="steelblue"><title>{}: {}</title></rect>"#,
            x,
            y,
            width,
            HEIGHT - MARGIN - y,
            escape(label),
            value
        )?;
        writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="10">{}</text>"#,
            x + width / 2.0,
            HEIGHT - MARGIN + 14.0,
            escape(label)
        )?;
    }
    debug!("Plotted {} bar(s)", bars.len());
    Ok(())
}
