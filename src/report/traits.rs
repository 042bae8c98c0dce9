// src/report/traits.rs

use crate::error::{ReportError, Result};
use crate::io::graphics::GraphicsSummary;
use crate::model::state::SimulationState;
#[cfg(test)]
use crate::report::leaf::LeafReport;
#[cfg(test)]
use std::cell::RefCell;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Receives warnings raised while reports are set up or run.
pub trait DiagnosticSink {
    fn warning(&self, report: &str, message: &str);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, report: &str, message: &str) {
        tracing::warn!(report, "{}", message);
    }
}

/// Keeps every warning in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub warnings: RefCell<Vec<(String, String)>>,
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn warning(&self, report: &str, message: &str) {
        self.warnings
            .borrow_mut()
            .push((report.to_string(), message.to_string()));
    }
}

/// The lifecycle every report, leaf or group, goes through.
///
/// Per simulated year the caller must run `daily_update` once per day, then
/// `annual_update`, `write_annual_report` and `annual_flush`, in that order.
/// A node whose `produce_csv` is false treats every call as a no-op, and a
/// group that is switched off never reaches its children.
pub trait ReportNode: Debug {
    fn name(&self) -> &str;
    fn produce_csv(&self) -> bool;
    fn produce_graphics(&self) -> bool;

    /// Takes ownership of `dir` as this node's CSV location, creating child directories.
    fn assign_csv_dir(&mut self, dir: &Path) -> Result<()>;
    /// Takes ownership of `dir` as this node's chart location, creating child directories.
    fn assign_diagnostic_dir(&mut self, dir: &Path) -> Result<()>;

    fn initialize(&mut self, sink: &dyn DiagnosticSink) -> Result<()>;
    fn daily_update(&mut self, state: &SimulationState) -> Result<()>;
    fn annual_update(&mut self, state: &SimulationState) -> Result<()>;
    fn write_annual_report(&mut self) -> Result<()>;
    fn annual_flush(&mut self) -> Result<()>;
    fn produce_report_graphics(&self) -> Result<GraphicsSummary>;

    #[cfg(test)]
    fn child(&self, _name: &str) -> Option<&dyn ReportNode> {
        None
    }

    #[cfg(test)]
    fn as_leaf(&self) -> Option<&LeafReport> {
        None
    }
}

/// Whether a node should get a chart directory at all.
pub(crate) fn wants_diagnostics(node: &dyn ReportNode) -> bool {
    node.produce_csv() && node.produce_graphics()
}

/// Creates `parent/<name>` for a node and hands it over.
pub(crate) fn create_node_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let dir = parent.join(name);
    std::fs::create_dir(&dir).map_err(|e| ReportError::io(&dir, e))?;
    Ok(dir)
}
