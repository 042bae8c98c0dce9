// src/simulation/config.rs

use crate::error::{ReportError, Result};
use crate::report::config::OutputConfig;
use serde::Deserialize;
use std::path::Path;

/// Knobs for the synthetic farm driving the reports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub start_year: i32,
    pub years: u32,
    pub pens: usize,
    pub animals_per_pen: usize,
    pub seed: u64,
    /// Render charts after the last year.
    pub produce_graphics: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_year: 2020,
            years: 2,
            pens: 3,
            animals_per_pen: 12,
            seed: 42,
            produce_graphics: true,
        }
    }
}

/// The whole input file: `{"run": {...}, "output": {...}}`.
///
/// Either section may be left out, in which case its defaults apply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub run: RunConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.output.validate()?;
        if config.run.years == 0 {
            return Err(ReportError::Config("run.years must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.run.years, 2);
        assert_eq!(config.output.file_extension, "csv");
    }

    #[test]
    fn run_section_overrides_defaults() {
        let config = AppConfig::from_json(r#"{"run": {"years": 5, "pens": 1}}"#).unwrap();
        assert_eq!((config.run.years, config.run.pens), (5, 1));
        assert_eq!(config.run.start_year, 2020);
    }

    #[test]
    fn zero_years_is_rejected() {
        assert!(AppConfig::from_json(r#"{"run": {"years": 0}}"#).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::from_json(r#"{"run": {"weeks": 5}}"#).is_err());
    }
}
