// src/model/farm.rs

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Serialize as DeriveSerialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, DeriveSerialize)]
pub struct Time {
    pub cal_year: i32,
    /// 1-based simulation year.
    pub year: u32,
    /// Julian day, 1-based.
    pub day: u32,
}

/// Daily quantities plus their running totals for the current year.
///
/// Serializes flat: every quantity `x` appears as `x` (today's value) and
/// `x_annual` (sum since the last [`FluxLedger::reset_totals`]).
#[derive(Debug, Clone, Default)]
pub struct FluxLedger {
    today: BTreeMap<&'static str, f64>,
    totals: BTreeMap<&'static str, f64>,
}

impl FluxLedger {
    pub fn record(&mut self, name: &'static str, value: f64) {
        self.today.insert(name, value);
        *self.totals.entry(name).or_insert(0.0) += value;
    }

    pub fn today(&self, name: &str) -> f64 {
        self.today.get(name).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn total(&self, name: &str) -> f64 {
        self.totals.get(name).copied().unwrap_or(0.0)
    }

    pub fn reset_totals(&mut self) {
        for total in self.totals.values_mut() {
            *total = 0.0;
        }
    }
}

impl Serialize for FluxLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.today.len() + self.totals.len()))?;
        for (name, value) in &self.today {
            map.serialize_entry(name, value)?;
        }
        for (name, value) in &self.totals {
            map.serialize_entry(&format!("{}_annual", name), value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, DeriveSerialize)]
pub struct SoilLayer {
    /// Field capacity, mm.
    pub capacity: f64,
    pub soil_water: f64,
    pub temperature: f64,
    pub trans_act: f64,
    pub evap: f64,
    pub perc: f64,
    #[serde(rename = "NO3")]
    pub no3: f64,
    #[serde(rename = "NH4")]
    pub nh4: f64,
    #[serde(rename = "active_N")]
    pub active_n: f64,
    #[serde(rename = "stable_N")]
    pub stable_n: f64,
    pub labile_p: f64,
    pub nitrification: f64,
    pub volatilization: f64,
    pub denitrification: f64,
    #[serde(rename = "totNitriVolatil")]
    pub tot_nitri_volatil: f64,
    #[serde(rename = "nTrans")]
    pub n_trans: f64,
    #[serde(rename = "NO3_perc")]
    pub no3_perc: f64,
    #[serde(rename = "NH4_perc")]
    pub nh4_perc: f64,
    #[serde(rename = "active_N_perc")]
    pub active_n_perc: f64,
}

impl SoilLayer {
    pub fn new(capacity: f64, no3: f64, nh4: f64, active_n: f64, stable_n: f64) -> Self {
        Self {
            capacity,
            soil_water: capacity * 0.6,
            no3,
            nh4,
            active_n,
            stable_n,
            labile_p: 20.0,
            ..Default::default()
        }
    }

    pub fn mineral_n(&self) -> f64 {
        self.no3 + self.nh4
    }
}

#[derive(Debug, Clone, DeriveSerialize)]
pub struct Soil {
    pub soil_layers: Vec<SoilLayer>,
    #[serde(flatten)]
    pub fluxes: FluxLedger,
}

impl Soil {
    pub fn three_layer() -> Self {
        Self {
            soil_layers: vec![
                SoilLayer::new(30.0, 12.0, 4.0, 300.0, 1200.0),
                SoilLayer::new(60.0, 8.0, 2.0, 250.0, 1500.0),
                SoilLayer::new(90.0, 5.0, 1.0, 150.0, 1800.0),
            ],
            fluxes: FluxLedger::default(),
        }
    }

    pub fn total_water(&self) -> f64 {
        self.soil_layers.iter().map(|l| l.soil_water).sum()
    }

    pub fn total_mineral_n(&self) -> f64 {
        self.soil_layers.iter().map(SoilLayer::mineral_n).sum()
    }

    pub fn total_labile_p(&self) -> f64 {
        self.soil_layers.iter().map(|l| l.labile_p).sum()
    }
}

#[derive(Debug, Clone, Default, DeriveSerialize)]
pub struct Crop {
    pub name: String,
    #[serde(rename = "fr_PHU")]
    pub fr_phu: f64,
    pub biomass_actual: f64,
    #[serde(rename = "LAI_actual")]
    pub lai_actual: f64,
    #[serde(rename = "bio_N")]
    pub bio_n: f64,
    #[serde(rename = "bio_P")]
    pub bio_p: f64,
    pub z_root: f64,
    pub yield_actual: f64,
    /// Harvested yield of the current year.
    pub yield_actual_annual: f64,
}

#[derive(Debug, Clone, Default, DeriveSerialize)]
pub struct Feed {
    #[serde(rename = "DM")]
    pub dm: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "CP")]
    pub cp: f64,
    #[serde(rename = "NPN")]
    pub npn: f64,
    #[serde(rename = "C_loss")]
    pub c_loss: f64,
    #[serde(rename = "CP_loss")]
    pub cp_loss: f64,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct Animal {
    pub id: usize,
    pub body_weight: f64,
    pub daily_growth: f64,
    pub milk_yield: f64,
}

#[derive(Debug, Clone, DeriveSerialize)]
pub struct Pen {
    pub id: usize,
    pub animals_in_pen: Vec<Animal>,
    pub pen_populated: bool,
    pub ration: BTreeMap<String, f64>,
    pub avg_growth: f64,
    pub avg_milk: f64,
}

impl Pen {
    pub fn new(id: usize, animals: Vec<Animal>) -> Self {
        let mut pen = Self {
            id,
            pen_populated: !animals.is_empty(),
            animals_in_pen: animals,
            ration: BTreeMap::new(),
            avg_growth: 0.0,
            avg_milk: 0.0,
        };
        pen.refresh_averages();
        pen
    }

    /// Recomputes the per-pen averages from the animals currently housed.
    pub fn refresh_averages(&mut self) {
        self.pen_populated = !self.animals_in_pen.is_empty();
        let count = self.animals_in_pen.len() as f64;
        if count == 0.0 {
            self.avg_growth = 0.0;
            self.avg_milk = 0.0;
            return;
        }
        self.avg_growth = self.animals_in_pen.iter().map(|a| a.daily_growth).sum::<f64>() / count;
        self.avg_milk = self.animals_in_pen.iter().map(|a| a.milk_yield).sum::<f64>() / count;
    }
}

#[derive(Debug, Clone, Default, DeriveSerialize)]
pub struct AnimalManagement {
    pub all_pens: Vec<Pen>,
}

#[derive(Debug, Clone, Default, DeriveSerialize)]
pub struct Weather {
    /// Daily rainfall in mm, indexed `[year - 1][day - 1]`.
    pub rainfall: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ledger_exposes_today_and_year_total() {
        let mut ledger = FluxLedger::default();
        ledger.record("runoff", 1.5);
        ledger.record("runoff", 2.0);
        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(value["runoff"], json!(2.0));
        assert_eq!(value["runoff_annual"], json!(3.5));

        ledger.reset_totals();
        assert_eq!(ledger.total("runoff"), 0.0);
        assert_eq!(ledger.today("runoff"), 2.0);
    }

    #[test]
    fn soil_serializes_layers_and_fluxes_side_by_side() {
        let mut soil = Soil::three_layer();
        soil.fluxes.record("Tsurf", 4.0);
        let value = serde_json::to_value(&soil).unwrap();
        assert_eq!(value["soil_layers"].as_array().unwrap().len(), 3);
        assert_eq!(value["soil_layers"][0]["NO3"], json!(12.0));
        assert_eq!(value["Tsurf"], json!(4.0));
    }

    #[test]
    fn empty_pen_is_not_populated() {
        let pen = Pen::new(0, Vec::new());
        assert!(!pen.pen_populated);
        assert_eq!(pen.avg_milk, 0.0);
    }
}
