// src/report/group.rs

use crate::error::{ReportError, Result};
use crate::io::graphics::GraphicsSummary;
use crate::model::state::SimulationState;
use crate::report::traits::{create_node_dir, wants_diagnostics, DiagnosticSink, ReportNode};
use indexmap::IndexMap;
use std::path::Path;

/// A report with no bindings of its own that fans every call out to its children.
///
/// Children are visited in the order they were added. If the group itself is
/// switched off, none of them is reached, whatever their own settings say.
#[derive(Debug)]
pub struct GroupReport {
    name: String,
    produce_csv: bool,
    produce_graphics: bool,
    children: IndexMap<String, Box<dyn ReportNode>>,
}

impl GroupReport {
    pub fn new(name: &str, produce_csv: bool, produce_graphics: bool) -> Self {
        Self {
            name: name.to_string(),
            produce_csv,
            produce_graphics,
            children: IndexMap::new(),
        }
    }

    pub fn add_child(&mut self, child: Box<dyn ReportNode>) -> Result<()> {
        let key = child.name().to_string();
        if self.children.contains_key(&key) {
            return Err(ReportError::Config(format!(
                "group '{}' already has a child named '{}'",
                self.name, key
            )));
        }
        self.children.insert(key, child);
        Ok(())
    }

    #[cfg(test)]
    pub fn children(&self) -> impl Iterator<Item = &dyn ReportNode> {
        self.children.values().map(|child| child.as_ref())
    }

    fn each_child(
        &mut self,
        mut call: impl FnMut(&mut dyn ReportNode) -> Result<()>,
    ) -> Result<()> {
        if !self.produce_csv {
            return Ok(());
        }
        for child in self.children.values_mut() {
            if child.produce_csv() {
                call(child.as_mut())?;
            }
        }
        Ok(())
    }
}

impl ReportNode for GroupReport {
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
        if !self.produce_csv {
            return Ok(());
        }
        for (key, child) in self.children.iter_mut() {
            if child.produce_csv() {
                let child_dir = create_node_dir(dir, key)?;
                child.assign_csv_dir(&child_dir)?;
            }
        }
        Ok(())
    }

    fn assign_diagnostic_dir(&mut self, dir: &Path) -> Result<()> {
        if !wants_diagnostics(self) {
            return Ok(());
        }
        for (key, child) in self.children.iter_mut() {
            if wants_diagnostics(child.as_ref()) {
                let child_dir = create_node_dir(dir, key)?;
                child.assign_diagnostic_dir(&child_dir)?;
            }
        }
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
        // Children apply the graphics rule to themselves, so every child is visited.
        for child in self.children.values_mut() {
            child.initialize(sink)?;
        }
        Ok(())
    }

    fn daily_update(&mut self, state: &SimulationState) -> Result<()> {
        self.each_child(|child| child.daily_update(state))
    }

    fn annual_update(&mut self, state: &SimulationState) -> Result<()> {
        self.each_child(|child| child.annual_update(state))
    }

    fn write_annual_report(&mut self) -> Result<()> {
        self.each_child(|child| child.write_annual_report())
    }

    fn annual_flush(&mut self) -> Result<()> {
        self.each_child(|child| child.annual_flush())
    }

    fn produce_report_graphics(&self) -> Result<GraphicsSummary> {
        let mut summary = GraphicsSummary::default();
        if !self.produce_csv || !self.produce_graphics {
            return Ok(summary);
        }
        for child in self.children.values() {
            summary.absorb(child.produce_report_graphics()?);
        }
        Ok(summary)
    }

    #[cfg(test)]
    fn child(&self, name: &str) -> Option<&dyn ReportNode> {
        self.children.get(name).map(|child| child.as_ref())
    }
}
