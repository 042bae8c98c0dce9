// src/io/graphics.rs

use crate::error::{ReportError, Result};
use crate::io::reader::{Column, ColumnTable};
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const CHART_SIZE: (u32, u32) = (1000, 600);
const BALANCE_SIZE: (u32, u32) = (1000, 900);
const BAR_WIDTH: f64 = 0.35;

/// Columns a mass-balance file must lead with; they go in the table, not the bars.
pub const BALANCE_SUMMARY_COLUMNS: [&str; 4] = ["actual", "calculated", "difference", "delta"];

const ACTUAL_COLOR: RGBColor = RGBColor(0x8B, 0x00, 0x00);
const COMPONENT_COLORS: [RGBColor; 5] = [
    RGBColor(0x78, 0x5E, 0xF0),
    RGBColor(0xFE, 0x61, 0x00),
    RGBColor(0xFF, 0xB0, 0x00),
    RGBColor(0x64, 0x8F, 0xFF),
    RGBColor(0xDC, 0x26, 0x7F),
];

/// What one report's chart pass produced. One broken chart never stops its siblings.
#[derive(Debug, Default)]
pub struct GraphicsSummary {
    pub rendered: usize,
    pub failures: Vec<ReportError>,
}

impl GraphicsSummary {
    pub fn attempted(&self) -> usize {
        self.rendered + self.failures.len()
    }

    pub fn absorb(&mut self, other: GraphicsSummary) {
        self.rendered += other.rendered;
        self.failures.extend(other.failures);
    }

    /// Folds in one file's chart pass; a file that could not be charted at all
    /// becomes a single failure.
    pub fn absorb_file(&mut self, report: &str, path: &Path, outcome: Result<GraphicsSummary>) {
        match outcome {
            Ok(summary) => self.absorb(summary),
            Err(e) => {
                error!(report, path = %path.display(), "charts skipped: {}", e);
                self.failures.push(e);
            }
        }
    }

    fn record(&mut self, report: &str, path: PathBuf, outcome: DrawResult) {
        match outcome {
            Ok(()) => self.rendered += 1,
            Err(e) => {
                error!(report, path = %path.display(), "chart failed: {}", e);
                self.failures.push(ReportError::Render {
                    report: report.to_string(),
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Title shown above a column's chart: the first word of its name, uppercased.
pub fn chart_title(name: &str) -> String {
    name.split_whitespace().next().unwrap_or(name).to_uppercase()
}

fn y_label(column: &Column) -> String {
    format!("{} {}", column.name, column.unit)
}

/// One line chart per data column of a daily file.
///
/// With a `date_step` of 1 every row is dated from its own `year`/`j_day` cells.
/// A larger step dates row `i` as the first row's date plus `i * date_step` days.
pub fn daily_graphics(
    report: &str,
    csv_path: &Path,
    out_dir: &Path,
    date_step: u32,
) -> Result<GraphicsSummary> {
    let table = ColumnTable::read(report, csv_path, 2)?;
    let mut summary = GraphicsSummary::default();
    if table.row_count() == 0 {
        warn!(report, path = %csv_path.display(), "no daily rows to chart");
        return Ok(summary);
    }

    let dates = match date_step {
        0 | 1 => calendar_dates(report, &table)?,
        step => stepped_dates(report, &table, step)?,
    };
    let start = dates[0];
    let xs: Vec<f64> = dates
        .iter()
        .map(|date| (*date - start).num_days() as f64)
        .collect();
    let label = |x: &f64| {
        (start + Duration::days(x.round() as i64))
            .format("%Y-%m-%d")
            .to_string()
    };

    for column in &table.columns {
        let path = out_dir.join(format!("{}.svg", column.name));
        let points: Vec<(f64, f64)> = xs.iter().copied().zip(column.values.iter().copied()).collect();
        let outcome = draw_line_chart(
            &path,
            &chart_title(&column.name),
            "Dates",
            &y_label(column),
            &points,
            &label,
        );
        summary.record(report, path, outcome);
    }

    info!(report, charts = summary.rendered, "daily graphics written");
    Ok(summary)
}

/// One line chart per data column of an annual file, by calendar year.
pub fn annual_graphics(report: &str, csv_path: &Path, out_dir: &Path) -> Result<GraphicsSummary> {
    let table = ColumnTable::read(report, csv_path, 1)?;
    let mut summary = GraphicsSummary::default();
    if table.row_count() == 0 {
        warn!(report, path = %csv_path.display(), "no annual rows to chart");
        return Ok(summary);
    }

    let years: Vec<f64> = table.dates[0].iter().map(|year| *year as f64).collect();
    let label = |x: &f64| format!("{:.0}", x);

    for column in &table.columns {
        let path = out_dir.join(format!("{}_annual.svg", column.name));
        let points: Vec<(f64, f64)> = years.iter().copied().zip(column.values.iter().copied()).collect();
        let outcome = draw_line_chart(
            &path,
            &chart_title(&column.name),
            "Year",
            &y_label(column),
            &points,
            &label,
        );
        summary.record(report, path, outcome);
    }
    Ok(summary)
}

/// Stacked bars of the balance components per year, `actual` overlaid as markers,
/// with the underlying numbers tabulated below the plot.
pub fn mass_balance_graphics(
    report: &str,
    annual_path: &Path,
    out_dir: &Path,
) -> Result<GraphicsSummary> {
    let table = ColumnTable::read(report, annual_path, 1)?;
    let missing: Vec<&str> = BALANCE_SUMMARY_COLUMNS
        .iter()
        .copied()
        .filter(|name| table.column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::Render {
            report: report.to_string(),
            path: annual_path.to_path_buf(),
            reason: format!("mass balance file lacks column(s) {}", missing.join(", ")),
        });
    }

    let mut summary = GraphicsSummary::default();
    if table.row_count() == 0 {
        warn!(report, path = %annual_path.display(), "no annual rows for mass balance");
        return Ok(summary);
    }

    let path = out_dir.join(format!("annual_{}.svg", report));
    let outcome = draw_mass_balance(&path, report, &table);
    summary.record(report, path, outcome);
    Ok(summary)
}

fn calendar_dates(report: &str, table: &ColumnTable) -> Result<Vec<NaiveDate>> {
    table.dates[0]
        .iter()
        .zip(&table.dates[1])
        .enumerate()
        .map(|(row, (year, day))| {
            i32::try_from(*year)
                .ok()
                .zip(u32::try_from(*day).ok())
                .and_then(|(year, day)| NaiveDate::from_yo_opt(year, day))
                .ok_or_else(|| ReportError::Render {
                    report: report.to_string(),
                    path: table.path.clone(),
                    reason: format!("row {}: year {} day {} is not a calendar date", row + 3, year, day),
                })
        })
        .collect()
}

fn stepped_dates(report: &str, table: &ColumnTable, step: u32) -> Result<Vec<NaiveDate>> {
    let first = calendar_dates(report, table)?
        .first()
        .copied()
        .ok_or_else(|| ReportError::Render {
            report: report.to_string(),
            path: table.path.clone(),
            reason: "no rows to date".to_string(),
        })?;
    Ok((0..table.row_count())
        .map(|row| first + Duration::days(row as i64 * i64::from(step)))
        .collect())
}

fn padded(min: f64, max: f64) -> Range<f64> {
    if (max - min).abs() < f64::EPSILON {
        (min - 1.0)..(max + 1.0)
    } else {
        let pad = (max - min) * 0.05;
        (min - pad)..(max + pad)
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn draw_line_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    points: &[(f64, f64)],
    x_label: &dyn Fn(&f64) -> String,
) -> DrawResult {
    let (x_min, x_max) = extent(points.iter().map(|p| p.0)).ok_or("no finite x values")?;
    let (y_min, y_max) = extent(points.iter().map(|p| p.1)).ok_or("no finite values to plot")?;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded(x_min, x_max), padded(y_min, y_max))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_labels(8)
        .x_label_formatter(x_label)
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied().filter(|p| p.1.is_finite()),
        &BLUE,
    ))?;

    root.present()?;
    Ok(())
}

fn draw_mass_balance(path: &Path, report: &str, table: &ColumnTable) -> DrawResult {
    let years: Vec<f64> = table.dates[0].iter().map(|year| *year as f64).collect();
    let actual = table.column("actual").ok_or("missing 'actual' column")?;
    let components: Vec<&Column> = table
        .columns
        .iter()
        .filter(|c| !BALANCE_SUMMARY_COLUMNS.contains(&c.name.as_str()))
        .collect();

    // Bar extents per component, stacked on top of the previous ones.
    let mut base = vec![0.0; years.len()];
    let mut stacks: Vec<Vec<(f64, f64)>> = Vec::with_capacity(components.len());
    for component in &components {
        let spans = base
            .iter_mut()
            .zip(&component.values)
            .map(|(bottom, value)| {
                let span = (*bottom, *bottom + value);
                *bottom += value;
                span
            })
            .collect();
        stacks.push(spans);
    }

    let (x_min, x_max) = extent(years.iter().copied()).ok_or("no years to plot")?;
    let (y_min, y_max) = extent(
        stacks
            .iter()
            .flatten()
            .flat_map(|(lo, hi)| [*lo, *hi])
            .chain(actual.values.iter().copied())
            .chain(std::iter::once(0.0)),
    )
    .ok_or("no finite values to plot")?;

    let root = SVGBackend::new(path, BALANCE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(560);

    let mut chart = ChartBuilder::on(&upper)
        .caption(report, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((x_min - 0.5)..(x_max + 0.5), padded(y_min, y_max))?;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc(actual.unit.as_str())
        .x_labels(years.len().clamp(2, 12))
        .x_label_formatter(&|x| format!("{:.0}", x))
        .draw()?;

    for (index, (component, spans)) in components.iter().zip(&stacks).enumerate() {
        let color = COMPONENT_COLORS[index % COMPONENT_COLORS.len()];
        let bars: Vec<_> = years
            .iter()
            .zip(spans)
            .map(|(x, (bottom, top))| {
                Rectangle::new(
                    [(x - BAR_WIDTH / 2.0, *bottom), (x + BAR_WIDTH / 2.0, *top)],
                    color.filled(),
                )
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(component.name.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    chart
        .draw_series(
            years
                .iter()
                .zip(&actual.values)
                .map(|(x, y)| Cross::new((*x, *y), 6, ACTUAL_COLOR.stroke_width(2))),
        )?
        .label("actual")
        .legend(|(x, y)| Cross::new((x + 6, y), 5, ACTUAL_COLOR.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    draw_table(&lower, table)?;
    root.present()?;
    Ok(())
}

/// Tabulates the annual values: year first, then the summary columns, then components.
fn draw_table(area: &DrawingArea<SVGBackend<'_>, Shift>, table: &ColumnTable) -> DrawResult {
    let mut rows: Vec<(String, Vec<String>)> = vec![(
        "year".to_string(),
        table.dates[0].iter().map(|y| y.to_string()).collect(),
    )];
    let ordered = BALANCE_SUMMARY_COLUMNS
        .iter()
        .filter_map(|name| table.column(name))
        .chain(
            table
                .columns
                .iter()
                .filter(|c| !BALANCE_SUMMARY_COLUMNS.contains(&c.name.as_str())),
        );
    for column in ordered {
        rows.push((
            column.name.clone(),
            column.values.iter().map(|v| format!("{:.3}", v)).collect(),
        ));
    }

    let style = ("sans-serif", 13).into_font().color(&BLACK);
    let (width, _) = area.dim_in_pixel();
    let label_width = 140;
    let columns = table.row_count().max(1) as i32;
    let cell_width = ((width as i32 - label_width - 20) / columns).max(50);

    for (r, (label, cells)) in rows.iter().enumerate() {
        let y = 24 + r as i32 * 22;
        area.draw(&Text::new(label.clone(), (12, y), style.clone()))?;
        for (c, cell) in cells.iter().enumerate() {
            let x = label_width + c as i32 * cell_width;
            area.draw(&Text::new(cell.clone(), (x, y), style.clone()))?;
        }
    }
    Ok(())
}
