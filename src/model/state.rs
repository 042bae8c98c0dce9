// src/model/state.rs

use crate::error::{ReportError, Result};
use serde::Serialize;
use serde_json::Value;

/// The closed set of objects a binding expression may start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRoot {
    Time,
    Soil,
    Crop,
    AnimalManagement,
    Feed,
    Weather,
    /// Only resolvable inside a pen-scoped report.
    Pen,
}

impl ContextRoot {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(Self::Time),
            "soil" => Some(Self::Soil),
            "crop" | "crop_type" => Some(Self::Crop),
            "animal_management" => Some(Self::AnimalManagement),
            "feed" => Some(Self::Feed),
            "weather" => Some(Self::Weather),
            "pen" => Some(Self::Pen),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Soil => "soil",
            Self::Crop => "crop",
            Self::AnimalManagement => "animal_management",
            Self::Feed => "feed",
            Self::Weather => "weather",
            Self::Pen => "pen",
        }
    }
}

/// Read-only view of the simulation at one point in time.
///
/// Each sub-object is kept as a JSON tree so reports can reach any field the
/// simulation exposes without knowing its concrete Rust type.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub time: Value,
    pub soil: Value,
    pub crop: Value,
    pub animal_management: Value,
    pub feed: Value,
    pub weather: Value,
}

impl SimulationState {
    /// Captures a typed simulation component under the given root.
    pub fn set<T: Serialize>(&mut self, root: ContextRoot, component: &T) -> Result<()> {
        let value = serde_json::to_value(component)?;
        match root {
            ContextRoot::Time => self.time = value,
            ContextRoot::Soil => self.soil = value,
            ContextRoot::Crop => self.crop = value,
            ContextRoot::AnimalManagement => self.animal_management = value,
            ContextRoot::Feed => self.feed = value,
            ContextRoot::Weather => self.weather = value,
            ContextRoot::Pen => {
                return Err(ReportError::Config(
                    "pens are captured through animal_management, not directly".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Farm-wide roots. `Pen` is never available here; see [`SimulationState::pen`].
    pub fn root(&self, root: ContextRoot) -> Option<&Value> {
        match root {
            ContextRoot::Time => Some(&self.time),
            ContextRoot::Soil => Some(&self.soil),
            ContextRoot::Crop => Some(&self.crop),
            ContextRoot::AnimalManagement => Some(&self.animal_management),
            ContextRoot::Feed => Some(&self.feed),
            ContextRoot::Weather => Some(&self.weather),
            ContextRoot::Pen => None,
        }
    }

    /// The ordered pen collection, `animal_management.all_pens`.
    pub fn pens(&self) -> Result<&[Value]> {
        self.animal_management
            .get("all_pens")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                ReportError::Config("animal_management exposes no 'all_pens' list".to_string())
            })
    }

    /// Resolves `all_pens[pen_id]`. Out-of-range ids are an error, never a wrap-around.
    pub fn pen(&self, pen_id: usize) -> Result<&Value> {
        let pens = self.pens()?;
        pens.get(pen_id).ok_or(ReportError::PenOutOfRange {
            pen_id,
            pen_count: pens.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_pens() -> SimulationState {
        SimulationState {
            animal_management: json!({
                "all_pens": [{"id": 0}, {"id": 1}, {"id": 2}]
            }),
            ..Default::default()
        }
    }

    #[test]
    fn roots_parse_from_expression_names() {
        assert_eq!(ContextRoot::from_name("crop_type"), Some(ContextRoot::Crop));
        assert_eq!(ContextRoot::from_name("pen"), Some(ContextRoot::Pen));
        assert_eq!(ContextRoot::from_name("globals"), None);
    }

    #[test]
    fn pen_lookup_is_bounds_checked() {
        let state = three_pens();
        assert_eq!(state.pen(2).unwrap()["id"], json!(2));
        match state.pen(5) {
            Err(ReportError::PenOutOfRange { pen_id, pen_count }) => {
                assert_eq!(pen_id, 5);
                assert_eq!(pen_count, 3);
            }
            other => panic!("expected PenOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn set_captures_serializable_components() {
        #[derive(Serialize)]
        struct Clock {
            cal_year: i32,
            day: u32,
        }

        let mut state = SimulationState::default();
        state
            .set(ContextRoot::Time, &Clock { cal_year: 2020, day: 3 })
            .unwrap();
        assert_eq!(state.time["cal_year"], json!(2020));
        assert!(state.set(ContextRoot::Pen, &Clock { cal_year: 0, day: 0 }).is_err());
    }
}
