// src/report/config.rs

use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// A user-declared binding appended after a leaf's built-in table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub unit: String,
}

/// Settings for a report that owns bindings.
///
/// `produce_csv`, `produce_graphics` and `report_name` have no defaults;
/// leaving one out is a configuration error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafConfig {
    pub produce_csv: bool,
    pub produce_graphics: bool,
    pub report_name: String,
    /// Days between rows on the daily charts' date axis. Every day is still recorded.
    #[serde(default = "default_interval", alias = "sample_interval")]
    pub ration_interval: u32,
    #[serde(default)]
    pub daily_variables: Vec<BindingConfig>,
    #[serde(default)]
    pub annual_variables: Vec<BindingConfig>,
}

fn default_interval() -> u32 {
    1
}

impl LeafConfig {
    pub fn enabled(report_name: &str) -> Self {
        Self {
            produce_csv: true,
            produce_graphics: true,
            report_name: report_name.to_string(),
            ration_interval: 1,
            daily_variables: Vec::new(),
            annual_variables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldReportConfig {
    pub produce_csv: bool,
    pub produce_graphics: bool,
    pub report_name: String,
    pub crop_report: LeafConfig,
    pub soil_report: LeafConfig,
    pub soil_nitrogen_report: LeafConfig,
    pub soil_phosphorus_report: LeafConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MassBalanceConfig {
    pub produce_csv: bool,
    pub produce_graphics: bool,
    pub report_name: String,
    pub water_balance: LeafConfig,
    pub phosphorus_balance: LeafConfig,
    pub nitrogen_balance: LeafConfig,
}

/// Template applied to every pen found in the simulation state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PenReportConfig {
    pub produce_csv: bool,
    pub produce_graphics: bool,
    pub report_name: String,
    pub ration_report: LeafConfig,
    pub growth_report: LeafConfig,
    pub manure_report: LeafConfig,
}

/// Everything the registry needs to build its reports.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_diagnostic_dir")]
    pub diagnostic_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub file_extension: String,
    pub field_report: FieldReportConfig,
    pub feed_storage_report: LeafConfig,
    pub mass_balance_report: MassBalanceConfig,
    pub custom_report: LeafConfig,
    pub pen_report: PenReportConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_diagnostic_dir() -> PathBuf {
    PathBuf::from("diagnostics")
}

fn default_extension() -> String {
    "csv".to_string()
}

impl Default for OutputConfig {
    /// Every report on, graphics included.
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            diagnostic_dir: default_diagnostic_dir(),
            file_extension: default_extension(),
            field_report: FieldReportConfig {
                produce_csv: true,
                produce_graphics: true,
                report_name: "field_report".to_string(),
                crop_report: LeafConfig::enabled("crop_report"),
                soil_report: LeafConfig::enabled("soil_report"),
                soil_nitrogen_report: LeafConfig::enabled("soil_nitrogen_report"),
                soil_phosphorus_report: LeafConfig::enabled("soil_phosphorus_report"),
            },
            feed_storage_report: LeafConfig::enabled("feed_storage_report"),
            mass_balance_report: MassBalanceConfig {
                produce_csv: true,
                produce_graphics: true,
                report_name: "mass_balance_report".to_string(),
                water_balance: LeafConfig::enabled("water_balance"),
                phosphorus_balance: LeafConfig::enabled("phosphorus_balance"),
                nitrogen_balance: LeafConfig::enabled("nitrogen_balance"),
            },
            custom_report: LeafConfig::enabled("custom_report"),
            pen_report: PenReportConfig {
                produce_csv: true,
                produce_graphics: true,
                report_name: "pen_report".to_string(),
                ration_report: LeafConfig::enabled("ration_report"),
                growth_report: LeafConfig::enabled("growth_report"),
                manure_report: LeafConfig::enabled("manure_report"),
            },
        }
    }
}

impl OutputConfig {
    #[cfg(test)]
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn leaves(&self) -> Vec<&LeafConfig> {
        vec![
            &self.field_report.crop_report,
            &self.field_report.soil_report,
            &self.field_report.soil_nitrogen_report,
            &self.field_report.soil_phosphorus_report,
            &self.feed_storage_report,
            &self.mass_balance_report.water_balance,
            &self.mass_balance_report.phosphorus_balance,
            &self.mass_balance_report.nitrogen_balance,
            &self.custom_report,
            &self.pen_report.ration_report,
            &self.pen_report.growth_report,
            &self.pen_report.manure_report,
        ]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.file_extension.trim_start_matches('.').is_empty() {
            return Err(ReportError::Config("file_extension must not be empty".to_string()));
        }
        let groups = [
            &self.field_report.report_name,
            &self.mass_balance_report.report_name,
            &self.pen_report.report_name,
        ];
        let leaves = self.leaves();
        let names = groups
            .into_iter()
            .chain(leaves.iter().map(|leaf| &leaf.report_name));
        for name in names {
            if name.is_empty() {
                return Err(ReportError::Config("report_name must not be empty".to_string()));
            }
        }
        for leaf in leaves {
            if leaf.ration_interval == 0 {
                return Err(ReportError::Config(format!(
                    "report '{}': ration_interval must be at least 1",
                    leaf.report_name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(name: &str) -> serde_json::Value {
        json!({"produce_csv": true, "produce_graphics": false, "report_name": name})
    }

    fn full() -> serde_json::Value {
        json!({
            "field_report": {
                "produce_csv": true, "produce_graphics": false, "report_name": "field_report",
                "crop_report": leaf("crop_report"),
                "soil_report": leaf("soil_report"),
                "soil_nitrogen_report": leaf("soil_nitrogen_report"),
                "soil_phosphorus_report": leaf("soil_phosphorus_report")
            },
            "feed_storage_report": leaf("feed_storage_report"),
            "mass_balance_report": {
                "produce_csv": false, "produce_graphics": false, "report_name": "mass_balance_report",
                "water_balance": leaf("water_balance"),
                "phosphorus_balance": leaf("phosphorus_balance"),
                "nitrogen_balance": leaf("nitrogen_balance")
            },
            "custom_report": {
                "produce_csv": true, "produce_graphics": false, "report_name": "custom_report",
                "daily_variables": [{"name": "pens", "expression": "len(animal_management.all_pens)"}]
            },
            "pen_report": {
                "produce_csv": true, "produce_graphics": false, "report_name": "pen_report",
                "ration_report": {
                    "produce_csv": true, "produce_graphics": false,
                    "report_name": "ration_report", "ration_interval": 7
                },
                "growth_report": leaf("growth_report"),
                "manure_report": leaf("manure_report")
            }
        })
    }

    #[test]
    fn parses_full_configuration_with_defaults() {
        let config = OutputConfig::from_json(&full().to_string()).unwrap();
        assert_eq!(config.file_extension, "csv");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.pen_report.ration_report.ration_interval, 7);
        assert_eq!(config.pen_report.growth_report.ration_interval, 1);
        assert!(!config.mass_balance_report.produce_csv);
        assert_eq!(config.custom_report.daily_variables[0].unit, "");
    }

    #[test]
    fn missing_node_key_is_fatal() {
        let mut value = full();
        value["feed_storage_report"]
            .as_object_mut()
            .unwrap()
            .remove("produce_graphics");
        let err = OutputConfig::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
        assert!(err.to_string().contains("produce_graphics"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut value = full();
        value["pen_report"]["ration_report"]["ration_interval"] = json!(0);
        assert!(OutputConfig::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn empty_group_name_is_rejected() {
        let mut value = full();
        value["pen_report"]["report_name"] = json!("");
        assert!(OutputConfig::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn default_enables_every_leaf() {
        let config = OutputConfig::default();
        assert_eq!(config.leaves().len(), 12);
        assert!(config.leaves().iter().all(|l| l.produce_csv && l.produce_graphics));
    }
}
