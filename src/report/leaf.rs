// src/report/leaf.rs

use crate::error::{ReportError, Result};
#[cfg(test)]
use crate::expr::Sample;
use crate::expr::EvalContext;
use crate::io::graphics::{self, GraphicsSummary};
use crate::io::writer;
use crate::model::state::SimulationState;
use crate::report::binding::{AnnualTable, DailyTable};
use crate::report::traits::{DiagnosticSink, ReportNode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which charts a leaf produces besides the per-column time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    TimeSeries,
    /// Adds the stacked annual balance chart.
    MassBalance,
}

/// What `pen` means while this report samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Farm,
    Pen(usize),
}

/// Where a leaf is within the yearly cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Accumulating,
    Sampled,
    Written,
}

impl Phase {
    fn describe(self) -> &'static str {
        match self {
            Phase::Uninitialized => "the report is not initialized",
            Phase::Accumulating => "daily rows are accumulating",
            Phase::Sampled => "the annual values are sampled but not written",
            Phase::Written => "the year is written but not flushed",
        }
    }
}

/// A report that owns bindings and writes them to `<name>.<ext>` and `<name>_annual.<ext>`.
#[derive(Debug)]
pub struct LeafReport {
    name: String,
    produce_csv: bool,
    produce_graphics: bool,
    extension: String,
    scope: Scope,
    chart: ChartKind,
    date_step: u32,
    daily: DailyTable,
    annual: AnnualTable,
    csv_dir: Option<PathBuf>,
    diagnostic_dir: Option<PathBuf>,
    phase: Phase,
}

impl LeafReport {
    pub fn new(name: &str, produce_csv: bool, produce_graphics: bool) -> Self {
        Self {
            name: name.to_string(),
            produce_csv,
            produce_graphics,
            extension: "csv".to_string(),
            scope: Scope::Farm,
            chart: ChartKind::TimeSeries,
            date_step: 1,
            daily: DailyTable::daily(),
            annual: AnnualTable::annual(),
            csv_dir: None,
            diagnostic_dir: None,
            phase: Phase::Uninitialized,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_chart(mut self, chart: ChartKind) -> Self {
        self.chart = chart;
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Days between consecutive rows on the daily charts' date axis.
    ///
    /// Every `daily_update` still records a row; only the charts use this.
    pub fn with_date_step(mut self, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(ReportError::Config(format!(
                "report '{}': ration_interval must be at least 1",
                self.name
            )));
        }
        self.date_step = step;
        Ok(self)
    }

    pub fn declare_daily(&mut self, name: &str, source: &str, unit: &str) -> Result<()> {
        self.daily.declare(name, source, unit).map_err(|e| self.in_report(e))
    }

    pub fn declare_annual(&mut self, name: &str, source: &str, unit: &str) -> Result<()> {
        self.annual.declare(name, source, unit).map_err(|e| self.in_report(e))
    }

    fn in_report(&self, err: ReportError) -> ReportError {
        match err {
            ReportError::Config(reason) => {
                ReportError::Config(format!("report '{}': {}", self.name, reason))
            }
            other => other,
        }
    }

    #[cfg(test)]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[cfg(test)]
    pub fn chart(&self) -> ChartKind {
        self.chart
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn daily_table(&self) -> &DailyTable {
        &self.daily
    }

    #[cfg(test)]
    pub fn annual_table(&self) -> &AnnualTable {
        &self.annual
    }

    #[cfg(test)]
    pub fn daily_buffer(&self, name: &str) -> Option<&[Sample]> {
        self.daily.get(name).map(|b| b.buffer().as_slice())
    }

    #[cfg(test)]
    pub fn annual_value(&self, name: &str) -> Option<&Sample> {
        self.annual.get(name).map(|b| b.buffer())
    }

    fn csv_path(&self) -> Option<PathBuf> {
        let file = format!("{}.{}", self.name, self.extension);
        self.csv_dir.as_ref().map(|dir| dir.join(file))
    }

    fn annual_csv_path(&self) -> Option<PathBuf> {
        let file = format!("{}_annual.{}", self.name, self.extension);
        self.csv_dir.as_ref().map(|dir| dir.join(file))
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ReportError::Lifecycle {
                report: self.name.clone(),
                operation,
                phase: self.phase.describe(),
            })
        }
    }

    fn output_paths(&self) -> Result<(PathBuf, PathBuf)> {
        self.csv_path()
            .zip(self.annual_csv_path())
            .ok_or_else(|| {
                ReportError::Config(format!(
                    "report '{}' has no output directory assigned",
                    self.name
                ))
            })
    }

    fn context<'s>(&self, state: &'s SimulationState) -> Result<EvalContext<'s>> {
        match self.scope {
            Scope::Farm => Ok(EvalContext::new(state)),
            Scope::Pen(pen_id) => EvalContext::for_pen(state, pen_id),
        }
    }
}

impl ReportNode for LeafReport {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce_csv(&self) -> bool {
        self.produce_csv
    }

    fn produce_graphics(&self) -> bool {
        self.produce_graphics
    }

    fn assign_csv_dir(&mut self, dir: &Path) -> Result<()> {
        self.csv_dir = Some(dir.to_path_buf());
        Ok(())
    }

    fn assign_diagnostic_dir(&mut self, dir: &Path) -> Result<()> {
        self.diagnostic_dir = Some(dir.to_path_buf());
        Ok(())
    }

    fn initialize(&mut self, sink: &dyn DiagnosticSink) -> Result<()> {
        if !self.produce_csv {
            if self.produce_graphics {
                sink.warning(
                    &self.name,
                    "cannot produce graphics for an inactive report, setting produce_graphics to false",
                );
                self.produce_graphics = false;
            }
            return Ok(());
        }
        self.expect_phase("initialize", Phase::Uninitialized)?;

        let (daily_path, annual_path) = self.output_paths()?;
        for (path, names, units) in [
            (&daily_path, self.daily.names(), self.daily.units()),
            (&annual_path, self.annual.names(), self.annual.units()),
        ] {
            if !writer::write_header(path, &names, &units)? {
                sink.warning(
                    &self.name,
                    &format!("{} already has content, header not rewritten", path.display()),
                );
            }
        }

        self.phase = Phase::Accumulating;
        Ok(())
    }

    fn daily_update(&mut self, state: &SimulationState) -> Result<()> {
        if !self.produce_csv {
            return Ok(());
        }
        self.expect_phase("daily_update", Phase::Accumulating)?;

        let ctx = self.context(state)?;
        self.daily.sample(&self.name, &ctx)?;
        debug!(report = %self.name, rows = self.daily.row_count(), "daily sample");
        Ok(())
    }

    fn annual_update(&mut self, state: &SimulationState) -> Result<()> {
        if !self.produce_csv {
            return Ok(());
        }
        self.expect_phase("annual_update", Phase::Accumulating)?;

        let ctx = self.context(state)?;
        self.annual.sample(&self.name, &ctx)?;
        self.phase = Phase::Sampled;
        Ok(())
    }

    fn write_annual_report(&mut self) -> Result<()> {
        if !self.produce_csv {
            return Ok(());
        }
        self.expect_phase("write_annual_report", Phase::Sampled)?;

        let (daily_path, annual_path) = self.output_paths()?;
        let days = writer::append_rows(&daily_path, &self.daily.rows())?;
        writer::append_rows(&annual_path, &[self.annual.row()])?;

        info!(report = %self.name, days, "annual report written");
        self.phase = Phase::Written;
        Ok(())
    }

    fn annual_flush(&mut self) -> Result<()> {
        if !self.produce_csv {
            return Ok(());
        }
        // Flushing anything that has not been written would lose it for good.
        self.expect_phase("annual_flush", Phase::Written)?;

        self.daily.reset();
        self.annual.reset();
        self.phase = Phase::Accumulating;
        Ok(())
    }

    fn produce_report_graphics(&self) -> Result<GraphicsSummary> {
        if !self.produce_csv || !self.produce_graphics {
            return Ok(GraphicsSummary::default());
        }
        if self.phase == Phase::Uninitialized {
            return Err(ReportError::Lifecycle {
                report: self.name.clone(),
                operation: "produce_report_graphics",
                phase: self.phase.describe(),
            });
        }

        let (daily_path, annual_path) = self.output_paths()?;
        let out_dir = self.diagnostic_dir.as_deref().ok_or_else(|| {
            ReportError::Config(format!(
                "report '{}' has no diagnostic directory assigned",
                self.name
            ))
        })?;

        // A file that cannot be charted is a failure of its own charts only.
        let mut summary = GraphicsSummary::default();
        summary.absorb_file(
            &self.name,
            &annual_path,
            graphics::annual_graphics(&self.name, &annual_path, out_dir),
        );
        summary.absorb_file(
            &self.name,
            &daily_path,
            graphics::daily_graphics(&self.name, &daily_path, out_dir, self.date_step),
        );
        if self.chart == ChartKind::MassBalance {
            summary.absorb_file(
                &self.name,
                &annual_path,
                graphics::mass_balance_graphics(&self.name, &annual_path, out_dir),
            );
        }
        Ok(summary)
    }

    #[cfg(test)]
    fn as_leaf(&self) -> Option<&LeafReport> {
        Some(self)
    }
}
