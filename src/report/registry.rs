// src/report/registry.rs

use crate::error::{ReportError, Result};
use crate::io::graphics::GraphicsSummary;
use crate::model::state::SimulationState;
use crate::report::catalog;
use crate::report::config::OutputConfig;
use crate::report::leaf::Scope;
use crate::report::traits::{create_node_dir, wants_diagnostics, DiagnosticSink, ReportNode};
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

/// Owns every top-level report and drives them through the yearly cycle.
///
/// Top-level nodes are, in order: `field_report`, `feed_storage_report`,
/// `mass_balance_report`, `custom_report`, then one `pen_<id>` group per pen
/// present in the simulation state when the registry was built.
#[derive(Debug)]
pub struct ReportRegistry {
    nodes: IndexMap<String, Box<dyn ReportNode>>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    pub fn from_config(config: &OutputConfig, state: &SimulationState) -> Result<Self> {
        let ext = config.file_extension.as_str();
        let mut registry = Self::new();

        registry.insert(
            "field_report",
            Box::new(catalog::field_report(&config.field_report, ext)?),
        )?;
        registry.insert(
            "feed_storage_report",
            Box::new(catalog::build_leaf(
                &config.feed_storage_report,
                &catalog::FEED_STORAGE,
                ext,
                Scope::Farm,
            )?),
        )?;
        registry.insert(
            "mass_balance_report",
            Box::new(catalog::mass_balance_report(&config.mass_balance_report, ext)?),
        )?;
        registry.insert(
            "custom_report",
            Box::new(catalog::build_leaf(
                &config.custom_report,
                &catalog::CUSTOM,
                ext,
                Scope::Farm,
            )?),
        )?;

        for pen_id in pen_ids(state)? {
            let group = catalog::pen_report(&config.pen_report, ext, pen_id)?;
            registry.insert(&format!("pen_{}", pen_id), Box::new(group))?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, key: &str, node: Box<dyn ReportNode>) -> Result<()> {
        if self.nodes.contains_key(key) {
            return Err(ReportError::Config(format!("duplicate report '{}'", key)));
        }
        self.nodes.insert(key.to_string(), node);
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Looks a node up by its slash-separated path, e.g. `pen_0/ration_report`.
    #[cfg(test)]
    pub fn find(&self, path: &str) -> Option<&dyn ReportNode> {
        let mut parts = path.split('/');
        let mut node: &dyn ReportNode = self.nodes.get(parts.next()?)?.as_ref();
        for part in parts {
            node = node.child(part)?;
        }
        Some(node)
    }

    /// Recreates `dir` from scratch and hands every CSV-producing node its subdirectory.
    pub fn initialize_output_dir(&mut self, dir: &Path) -> Result<()> {
        recreate_dir(dir)?;
        for (key, node) in self.nodes.iter_mut() {
            if node.produce_csv() {
                let node_dir = create_node_dir(dir, key)?;
                node.assign_csv_dir(&node_dir)?;
            }
        }
        info!(dir = %dir.display(), "output directory ready");
        Ok(())
    }

    pub fn initialize_diagnostic_dir(&mut self, dir: &Path) -> Result<()> {
        recreate_dir(dir)?;
        for (key, node) in self.nodes.iter_mut() {
            if wants_diagnostics(node.as_ref()) {
                let node_dir = create_node_dir(dir, key)?;
                node.assign_diagnostic_dir(&node_dir)?;
            }
        }
        info!(dir = %dir.display(), "diagnostic directory ready");
        Ok(())
    }

    /// Writes every header. Must follow `initialize_output_dir`.
    pub fn initialize_reports(&mut self, sink: &dyn DiagnosticSink) -> Result<()> {
        for node in self.nodes.values_mut() {
            node.initialize(sink)?;
        }
        Ok(())
    }

    pub fn daily_update(&mut self, state: &SimulationState) -> Result<()> {
        self.each_active(|node| node.daily_update(state))
    }

    pub fn annual_update(&mut self, state: &SimulationState) -> Result<()> {
        self.each_active(|node| node.annual_update(state))
    }

    pub fn write_annual_report(&mut self) -> Result<()> {
        self.each_active(|node| node.write_annual_report())
    }

    pub fn annual_flush(&mut self) -> Result<()> {
        self.each_active(|node| node.annual_flush())
    }

    /// Renders charts for every node that asked for them.
    ///
    /// A chart that fails to draw, or a file that cannot be read back, is
    /// counted in the summary and every other chart is still attempted.
    pub fn produce_graphics(&self) -> Result<GraphicsSummary> {
        let mut summary = GraphicsSummary::default();
        for node in self.nodes.values() {
            if wants_diagnostics(node.as_ref()) {
                summary.absorb(node.produce_report_graphics()?);
            }
        }
        info!(
            rendered = summary.rendered,
            failed = summary.failures.len(),
            "graphics done"
        );
        Ok(summary)
    }

    fn each_active(
        &mut self,
        mut call: impl FnMut(&mut dyn ReportNode) -> Result<()>,
    ) -> Result<()> {
        for node in self.nodes.values_mut() {
            if node.produce_csv() {
                call(node.as_mut())?;
            }
        }
        Ok(())
    }
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pen identifiers in `all_pens` order; each must be a valid index into that list.
fn pen_ids(state: &SimulationState) -> Result<Vec<usize>> {
    let pens = state.pens()?;
    let mut ids = Vec::with_capacity(pens.len());
    for (position, pen) in pens.iter().enumerate() {
        let id = match pen.get("id") {
            None => position,
            Some(value) => value
                .as_u64()
                .and_then(|id| usize::try_from(id).ok())
                .ok_or_else(|| {
                    ReportError::Config(format!("pen at position {} has an invalid id {}", position, value))
                })?,
        };
        if id >= pens.len() {
            return Err(ReportError::PenOutOfRange {
                pen_id: id,
                pen_count: pens.len(),
            });
        }
        if ids.contains(&id) {
            return Err(ReportError::Config(format!("pen id {} appears twice", id)));
        }
        ids.push(id);
    }
    Ok(ids)
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::traits::RecordingSink;
    use serde_json::json;
    use std::fs;

    fn state(day: u32, pens: usize) -> SimulationState {
        let all_pens: Vec<_> = (0..pens)
            .map(|id| {
                json!({
                    "id": id,
                    "animals_in_pen": vec![json!({"id": 1}); id + 1],
                    "pen_populated": true,
                    "ration": {"objective": 2.5},
                    "avg_growth": 0.8,
                    "avg_milk": 30.0
                })
            })
            .collect();
        SimulationState {
            time: json!({"cal_year": 2021, "year": 1, "day": day}),
            animal_management: json!({ "all_pens": all_pens }),
            ..Default::default()
        }
    }

    /// Only the pen template is switched on so the soil and crop roots can stay empty.
    fn pens_only() -> OutputConfig {
        let mut config = OutputConfig::default();
        config.field_report.produce_csv = false;
        config.feed_storage_report.produce_csv = false;
        config.mass_balance_report.produce_csv = false;
        config.custom_report.produce_csv = false;
        config
    }

    #[test]
    fn builds_one_group_per_pen() {
        let registry = ReportRegistry::from_config(&OutputConfig::default(), &state(1, 3)).unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(
            keys,
            vec![
                "field_report",
                "feed_storage_report",
                "mass_balance_report",
                "custom_report",
                "pen_0",
                "pen_1",
                "pen_2"
            ]
        );
        assert!(registry.find("pen_2/manure_report").is_some());
        assert!(registry.find("pen_3").is_none());
        assert!(registry.find("field_report/soil_report").is_some());
    }

    #[test]
    fn pen_id_beyond_the_pen_list_is_fatal() {
        let mut sim = state(1, 3);
        sim.animal_management["all_pens"][1]["id"] = json!(5);
        let err = ReportRegistry::from_config(&OutputConfig::default(), &sim).unwrap_err();
        assert!(matches!(
            err,
            ReportError::PenOutOfRange {
                pen_id: 5,
                pen_count: 3
            }
        ));
    }

    #[test]
    fn output_dir_mirrors_the_report_tree() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("output");
        fs::create_dir_all(out.join("stale")).unwrap();

        let mut registry = ReportRegistry::from_config(&pens_only(), &state(1, 2)).unwrap();
        registry.initialize_output_dir(&out).unwrap();

        assert!(!out.join("stale").exists());
        assert!(!out.join("field_report").exists());
        assert!(out.join("pen_1").join("growth_report").is_dir());
    }

    #[test]
    fn runs_a_short_year_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("output");
        let mut registry = ReportRegistry::from_config(&pens_only(), &state(1, 2)).unwrap();
        registry.initialize_output_dir(&out).unwrap();
        registry.initialize_reports(&RecordingSink::default()).unwrap();

        for day in 1..=3 {
            registry.daily_update(&state(day, 2)).unwrap();
        }
        registry.annual_update(&state(3, 2)).unwrap();
        registry.write_annual_report().unwrap();
        registry.annual_flush().unwrap();

        let text = fs::read_to_string(out.join("pen_1/growth_report/growth_report.csv")).unwrap();
        assert_eq!(
            text,
            "year,j_day,num_animals_in_pen,average_growth,average_milk\n\
             ,,,kg,kg\n\
             2021,1,2,0.8,30.0\n\
             2021,2,2,0.8,30.0\n\
             2021,3,2,0.8,30.0\n"
        );
        let annual =
            fs::read_to_string(out.join("pen_0/ration_report/ration_report_annual.csv")).unwrap();
        let lines: Vec<&str> = annual.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!((lines[0], lines[2]), ("year", "2021"));
    }

    #[test]
    fn evaluation_failure_names_report_and_binding() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = ReportRegistry::from_config(&pens_only(), &state(1, 1)).unwrap();
        registry.initialize_output_dir(root.path()).unwrap();
        registry.initialize_reports(&RecordingSink::default()).unwrap();

        let mut broken = state(1, 1);
        broken.animal_management["all_pens"][0]
            .as_object_mut()
            .unwrap()
            .remove("avg_milk");
        let err = registry.daily_update(&broken).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("growth_report"));
        assert!(text.contains("average_milk"));
    }

    #[test]
    fn graphics_skip_nodes_without_csv() {
        let root = tempfile::tempdir().unwrap();
        let mut config = pens_only();
        config.pen_report.produce_graphics = false;
        let mut registry = ReportRegistry::from_config(&config, &state(1, 1)).unwrap();
        registry.initialize_output_dir(&root.path().join("out")).unwrap();
        registry
            .initialize_diagnostic_dir(&root.path().join("diag"))
            .unwrap();
        let sink = RecordingSink::default();
        registry.initialize_reports(&sink).unwrap();

        // every disabled top-level node asked for graphics and was corrected
        assert_eq!(sink.warnings.borrow().len(), 4);
        let summary = registry.produce_graphics().unwrap();
        assert_eq!(summary.attempted(), 0);
        assert_eq!(fs::read_dir(root.path().join("diag")).unwrap().count(), 0);
    }

    #[test]
    fn one_corrupted_file_does_not_stop_other_charts() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        let mut registry = ReportRegistry::from_config(&pens_only(), &state(1, 2)).unwrap();
        registry.initialize_output_dir(&out).unwrap();
        registry
            .initialize_diagnostic_dir(&root.path().join("diag"))
            .unwrap();
        registry.initialize_reports(&RecordingSink::default()).unwrap();
        for day in 1..=3 {
            registry.daily_update(&state(day, 2)).unwrap();
        }
        registry.annual_update(&state(3, 2)).unwrap();
        registry.write_annual_report().unwrap();
        registry.annual_flush().unwrap();

        let healthy = registry.produce_graphics().unwrap();
        assert!(healthy.attempted() > 0);
        assert!(!healthy
            .failures
            .iter()
            .any(|e| matches!(e, ReportError::ColumnMismatch { .. })));

        let ration_annual = out.join("pen_0/ration_report/ration_report_annual.csv");
        fs::write(&ration_annual, "year\n\"\"\n2021,99\n").unwrap();

        let summary = registry.produce_graphics().unwrap();
        // the broken file adds one failure; pen_1 and pen_0's daily charts are all still tried
        assert_eq!(summary.attempted(), healthy.attempted() + 1);
        let mismatches: Vec<_> = summary
            .failures
            .iter()
            .filter(|e| matches!(e, ReportError::ColumnMismatch { .. }))
            .collect();
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].to_string().contains("ration_report_annual.csv"));
    }
}
