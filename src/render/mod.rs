use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::reports::{ChartKind, ChartStyle, ResultSeries};

/// Sink consuming one result series plus styling. Implementations decide
/// how (or whether) to draw; the core never inspects rendering internals.
pub trait RenderSink {
    fn render(&mut self, series: &ResultSeries, style: &ChartStyle) -> Result<()>;
}

/// Sink that records what it was asked to draw instead of drawing it.
/// Used by tests and dry runs, the way an in-memory storage stands in for
/// the real database.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub rendered: Vec<(String, ResultSeries)>,
}

impl RenderSink for RecordingSink {
    fn render(&mut self, series: &ResultSeries, style: &ChartStyle) -> Result<()> {
        self.rendered.push((style.name.to_string(), series.clone()));
        Ok(())
    }
}

/// Writes one PNG chart per rendered series under an output directory.
pub struct ChartSink {
    output_dir: PathBuf,
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn render_err(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Render(err.to_string())
}

impl ChartSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }
}

impl RenderSink for ChartSink {
    fn render(&mut self, series: &ResultSeries, style: &ChartStyle) -> Result<()> {
        if series.is_empty() {
            info!(chart = style.name, "empty series, no chart written");
            return Ok(());
        }

        let path = self.output_dir.join(format!("{}.png", style.name));
        let root = BitMapBackend::new(&path, (1280, 720)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        match style.kind {
            ChartKind::BarHorizontal => draw_horizontal_bars(&root, series, style)?,
            ChartKind::BarVertical | ChartKind::Histogram => {
                draw_vertical_bars(&root, series, style)?
            }
            ChartKind::GroupedBar => draw_grouped_bars(&root, series, style)?,
        }

        if let Some(annotation) = &series.annotation {
            let text = format!("{}: {:.2}", annotation.caption, annotation.value);
            root.draw(&Text::new(
                text,
                (80, 50),
                ("sans-serif", 24).into_font().color(&RED),
            ))
            .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
        info!(chart = %path.display(), "chart written");
        Ok(())
    }
}

fn max_value(series: &ResultSeries) -> f64 {
    let max = series
        .points
        .iter()
        .map(|point| point.value)
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Ranked bars, best first from the top.
fn draw_horizontal_bars(root: &Area, series: &ResultSeries, style: &ChartStyle) -> Result<()> {
    let count = series.points.len();
    let mut chart = ChartBuilder::on(root)
        .caption(style.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(220)
        .build_cartesian_2d(0.0..max_value(series), 0.0..count as f64)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(style.x_label)
        .y_desc(style.y_label)
        .y_labels(count)
        .y_label_formatter(&|y: &f64| {
            let slot = (y.floor() as usize).min(count.saturating_sub(1));
            series.points[count - 1 - slot].label.clone()
        })
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(series.points.iter().enumerate().map(|(rank, point)| {
            let row = (count - 1 - rank) as f64;
            Rectangle::new(
                [(0.0, row + 0.15), (point.value, row + 0.85)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .map_err(render_err)?;
    Ok(())
}

fn draw_vertical_bars(root: &Area, series: &ResultSeries, style: &ChartStyle) -> Result<()> {
    let count = series.points.len();
    let mut chart = ChartBuilder::on(root)
        .caption(style.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..count as f64, 0.0..max_value(series))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(style.x_label)
        .y_desc(style.y_label)
        .x_labels(count)
        .x_label_formatter(&|x: &f64| {
            let slot = (x.floor() as usize).min(count.saturating_sub(1));
            series.points[slot].label.clone()
        })
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(series.points.iter().enumerate().map(|(slot, point)| {
            Rectangle::new(
                [(slot as f64 + 0.15, 0.0), (slot as f64 + 0.85, point.value)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .map_err(render_err)?;
    Ok(())
}

/// One bar cluster per label, one color per group. Expects the points in
/// label-major order over the full label x group cross-product, which is
/// how the engine emits multi-series results.
fn draw_grouped_bars(root: &Area, series: &ResultSeries, style: &ChartStyle) -> Result<()> {
    let mut labels: Vec<&str> = Vec::new();
    let mut groups: Vec<&str> = Vec::new();
    for point in &series.points {
        if !labels.iter().any(|label| *label == point.label.as_str()) {
            labels.push(point.label.as_str());
        }
        if let Some(group) = point.group.as_deref() {
            if !groups.iter().any(|existing| *existing == group) {
                groups.push(group);
            }
        }
    }
    if groups.is_empty() {
        groups.push("");
    }
    let cluster = labels.len();
    let per_cluster = groups.len();
    let bar_width = 0.8 / per_cluster as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(style.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..cluster as f64, 0.0..max_value(series))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(style.x_label)
        .y_desc(style.y_label)
        .x_labels(cluster)
        .x_label_formatter(&|x: &f64| {
            let slot = (x.floor() as usize).min(cluster.saturating_sub(1));
            labels[slot].to_string()
        })
        .draw()
        .map_err(render_err)?;

    for (group_slot, group) in groups.iter().enumerate() {
        let color = Palette99::pick(group_slot).mix(0.9);
        chart
            .draw_series((0..cluster).map(|label_slot| {
                let value = series
                    .points
                    .get(label_slot * per_cluster + group_slot)
                    .map(|point| point.value)
                    .unwrap_or(0.0);
                let x0 = label_slot as f64 + 0.1 + group_slot as f64 * bar_width;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, value)], color.filled())
            }))
            .map_err(render_err)?
            .label(group.to_string())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
            });
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{report_by_id, Annotation, SeriesPoint};

    fn series(points: Vec<(&str, Option<&str>, f64)>) -> ResultSeries {
        ResultSeries {
            points: points
                .into_iter()
                .map(|(label, group, value)| SeriesPoint {
                    label: label.to_string(),
                    group: group.map(str::to_string),
                    value,
                })
                .collect(),
            annotation: None,
        }
    }

    #[test]
    fn recording_sink_captures_series_in_order() {
        let mut sink = RecordingSink::default();
        let style = &report_by_id(1).unwrap().style;
        sink.render(&series(vec![("Flu", None, 2.0)]), style).unwrap();
        sink.render(&ResultSeries::empty(), style).unwrap();
        assert_eq!(sink.rendered.len(), 2);
        assert_eq!(sink.rendered[0].0, "common_diagnoses");
    }

    #[test]
    fn chart_sink_skips_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ChartSink::new(dir.path()).unwrap();
        let style = &report_by_id(1).unwrap().style;
        sink.render(&ResultSeries::empty(), style).unwrap();
        assert!(!dir.path().join("common_diagnoses.png").exists());
    }

    #[test]
    fn chart_sink_writes_each_chart_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ChartSink::new(dir.path()).unwrap();

        let bars = series(vec![("Flu", None, 3.0), ("Cold", None, 1.0)]);
        sink.render(&bars, &report_by_id(1).unwrap().style).unwrap();
        assert!(dir.path().join("common_diagnoses.png").exists());

        let months = series(vec![("2024-01", None, 2.0), ("2024-02", None, 5.0)]);
        sink.render(&months, &report_by_id(4).unwrap().style).unwrap();
        assert!(dir.path().join("emerging_diagnoses.png").exists());

        let trends = series(vec![
            ("2024-01", Some("Flu"), 2.0),
            ("2024-01", Some("Cold"), 0.0),
            ("2024-02", Some("Flu"), 1.0),
            ("2024-02", Some("Cold"), 4.0),
        ]);
        sink.render(&trends, &report_by_id(2).unwrap().style).unwrap();
        assert!(dir.path().join("monthly_trends.png").exists());

        let mut histogram = series(vec![("0.00-5.00", None, 2.0), ("5.00-10.00", None, 1.0)]);
        histogram.annotation = Some(Annotation {
            caption: "Average price",
            value: 4.2,
        });
        sink.render(&histogram, &report_by_id(7).unwrap().style).unwrap();
        assert!(dir.path().join("price_distribution.png").exists());
    }
}
