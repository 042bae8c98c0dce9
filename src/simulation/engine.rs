// src/simulation/engine.rs

use crate::error::{ReportError, Result};
use crate::model::farm::{Animal, AnimalManagement, Crop, Feed, Pen, Soil, Time, Weather};
use crate::model::state::{ContextRoot, SimulationState};
use crate::report::registry::ReportRegistry;
use crate::simulation::config::RunConfig;
use crate::simulation::weather::{days_in_year, generate_rainfall};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use tracing::info;

const PLANTING_DAY: u32 = 120;
const HARVEST_DAY: u32 = 270;
const DAILY_INTAKE_KG: f64 = 20.0;

/// A small synthetic farm that exposes every field the built-in reports read.
///
/// The process models are deliberately crude; they exist to give the reports
/// plausible, internally consistent numbers to record.
pub struct FarmSimulation {
    config: RunConfig,
    rng: StdRng,
    noise: Normal<f64>,

    pub time: Time,
    pub soil: Soil,
    pub crop: Crop,
    pub feed: Feed,
    pub animals: AnimalManagement,
    pub weather: Weather,
}

impl FarmSimulation {
    pub fn new(config: RunConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let noise = Normal::new(0.0, 1.0)
            .map_err(|e| ReportError::Config(format!("noise distribution: {}", e)))?;
        let weather = generate_rainfall(&mut rng, config.start_year, config.years, 0.3, 8.0, 6.0);

        let mut all_pens = Vec::with_capacity(config.pens);
        for pen_id in 0..config.pens {
            let animals = (0..config.animals_per_pen)
                .map(|k| Animal {
                    id: pen_id * 1000 + k,
                    body_weight: rng.gen_range(420.0..520.0),
                    daily_growth: 0.0,
                    milk_yield: 0.0,
                })
                .collect();
            all_pens.push(Pen::new(pen_id, animals));
        }

        let feed = Feed {
            dm: 250_000.0,
            ..Default::default()
        };

        Ok(Self {
            time: Time {
                cal_year: config.start_year,
                year: 1,
                day: 1,
            },
            config,
            rng,
            noise,
            soil: Soil::three_layer(),
            crop: Crop {
                name: "corn".to_string(),
                ..Default::default()
            },
            feed,
            animals: AnimalManagement { all_pens },
            weather,
        })
    }

    /// Captures the current state for the reports to read.
    pub fn snapshot(&self) -> Result<SimulationState> {
        let mut state = SimulationState::default();
        state.set(ContextRoot::Time, &self.time)?;
        state.set(ContextRoot::Soil, &self.soil)?;
        state.set(ContextRoot::Crop, &self.crop)?;
        state.set(ContextRoot::AnimalManagement, &self.animals)?;
        state.set(ContextRoot::Feed, &self.feed)?;
        state.set(ContextRoot::Weather, &self.weather)?;
        Ok(state)
    }

    /// Runs every configured year, driving `registry` through its daily and yearly cycle.
    pub fn run(&mut self, registry: &mut ReportRegistry) -> Result<()> {
        for year in 1..=self.config.years {
            self.begin_year(year);
            let days = days_in_year(self.time.cal_year);

            for day in 1..=days {
                self.time.day = day;
                self.step_day();
                registry.daily_update(&self.snapshot()?)?;
            }

            // =================================================================
            // YEAR END
            // =================================================================
            registry.annual_update(&self.snapshot()?)?;
            registry.write_annual_report()?;
            registry.annual_flush()?;

            info!(
                cal_year = self.time.cal_year,
                days,
                yield_kg_ha = self.crop.yield_actual_annual,
                "year complete"
            );
        }
        Ok(())
    }

    fn begin_year(&mut self, year: u32) {
        self.time.year = year;
        self.time.cal_year = self.config.start_year + (year as i32 - 1);
        self.time.day = 1;
        self.soil.fluxes.reset_totals();
        self.crop.yield_actual_annual = 0.0;
        self.feed.c_loss = 0.0;
        self.feed.cp_loss = 0.0;
    }

    fn step_day(&mut self) {
        let rain = self
            .weather
            .rainfall
            .get(self.time.year as usize - 1)
            .and_then(|year| year.get(self.time.day as usize - 1))
            .copied()
            .unwrap_or(0.0);

        self.step_water(rain);
        let (n_uptake, p_uptake) = self.step_nutrients();
        self.step_crop(n_uptake, p_uptake);
        self.step_animals();
        self.step_feed();
    }

    fn gauss(&mut self, scale: f64) -> f64 {
        self.noise.sample(&mut self.rng) * scale
    }

    // =====================================================================
    // WATER
    // =====================================================================

    fn step_water(&mut self, rain: f64) {
        let days = days_in_year(self.time.cal_year) as f64;
        let angle = 2.0 * PI * (self.time.day as f64 - 105.0) / days;
        let tsurf = 10.0 + 12.0 * angle.sin() + self.gauss(2.0);

        let et_max = (0.2 * (tsurf + 5.0)).max(0.0);
        let cover = (self.crop.lai_actual / 3.0).min(1.0);
        let trans_max = et_max * cover;
        let evap_max = et_max - trans_max;
        let runoff = if rain > 15.0 { (rain - 15.0) * 0.4 } else { 0.0 };
        let sed = runoff * 0.02;
        let residue = 500.0 + 0.1 * self.crop.biomass_actual;

        let water_before = self.soil.total_water();
        let mut incoming = rain - runoff;
        let mut previous_temp = tsurf;
        let (mut evap_sum, mut trans_sum) = (0.0, 0.0);
        const EVAP_SHARE: [f64; 3] = [0.7, 0.25, 0.05];
        const ROOT_SHARE: [f64; 3] = [0.5, 0.3, 0.2];

        for (i, layer) in self.soil.soil_layers.iter_mut().enumerate() {
            let damping = [0.3, 0.1, 0.05].get(i).copied().unwrap_or(0.05);
            layer.temperature += damping * (previous_temp - layer.temperature);
            previous_temp = layer.temperature;

            layer.soil_water += incoming;
            layer.perc = (layer.soil_water - layer.capacity).max(0.0);
            layer.soil_water -= layer.perc;
            incoming = layer.perc;

            layer.evap = (evap_max * EVAP_SHARE.get(i).copied().unwrap_or(0.0))
                .min(layer.soil_water * 0.5);
            layer.soil_water -= layer.evap;
            layer.trans_act = (trans_max * ROOT_SHARE.get(i).copied().unwrap_or(0.0))
                .min(layer.soil_water * 0.5);
            layer.soil_water -= layer.trans_act;

            evap_sum += layer.evap;
            trans_sum += layer.trans_act;
        }
        let drainage = incoming;
        let delta_sw = self.soil.total_water() - water_before;
        let p_calc = runoff + evap_sum + trans_sum + drainage + delta_sw;

        let fluxes = &mut self.soil.fluxes;
        fluxes.record("Tsurf", tsurf);
        fluxes.record("ET_max", et_max);
        fluxes.record("ET_act", evap_sum + trans_sum);
        fluxes.record("trans_max", trans_max);
        fluxes.record("evap_max", evap_max);
        fluxes.record("runoff", runoff);
        fluxes.record("sed", sed);
        fluxes.record("residue", residue);
        fluxes.record("evap_sum", evap_sum);
        fluxes.record("trans_sum", trans_sum);
        fluxes.record("drainage", drainage);
        fluxes.record("delta_SW", delta_sw);
        fluxes.record("p_act", rain);
        fluxes.record("p_calc", p_calc);
        fluxes.record("water_balance_difference", rain - p_calc);
    }

    // =====================================================================
    // NITROGEN AND PHOSPHORUS
    // =====================================================================

    /// Cycles N and P through the layers; returns the crop's (N, P) uptake.
    fn step_nutrients(&mut self) -> (f64, f64) {
        let day = self.time.day;
        let spreading = (90..=300).contains(&day) && day % 30 == 0;
        let (manure_n, manure_p) = if spreading { (40.0, 8.0) } else { (0.0, 0.0) };

        let runoff = self.soil.fluxes.today("runoff");
        let sed = self.soil.fluxes.today("sed");
        let fresh_n = self.soil.fluxes.today("residue") * 0.015;
        let n_before = self.soil.total_mineral_n();
        let p_before = self.soil.total_labile_p();

        let layers = &mut self.soil.soil_layers;
        if let Some(top) = layers.first_mut() {
            top.nh4 += manure_n * 0.6;
            top.no3 += manure_n * 0.4;
            top.labile_p += manure_p;
        }

        // Surface losses come off the top layer only.
        let (mut no3_runoff, mut nh4_runoff, mut p_runoff) = (0.0, 0.0, 0.0);
        let (mut nh4_erosion, mut active_erosion, mut stable_erosion, mut p_erosion) =
            (0.0, 0.0, 0.0, 0.0);
        if let Some(top) = layers.first_mut() {
            let wash = runoff / (top.soil_water + runoff).max(1.0);
            no3_runoff = top.no3 * wash * 0.2;
            nh4_runoff = top.nh4 * wash * 0.05;
            p_runoff = top.labile_p * wash * 0.01;
            nh4_erosion = top.nh4 * sed * 0.01;
            active_erosion = top.active_n * sed * 0.0001;
            stable_erosion = top.stable_n * sed * 0.00005;
            p_erosion = top.labile_p * sed * 0.001;

            top.no3 -= no3_runoff;
            top.nh4 -= nh4_runoff + nh4_erosion;
            top.active_n -= active_erosion;
            top.stable_n -= stable_erosion;
            top.labile_p -= p_runoff + p_erosion;
        }

        let (mut gaseous, mut n_uptake, mut p_uptake) = (0.0, 0.0, 0.0);
        let (mut carried_no3, mut carried_nh4, mut carried_active, mut carried_p) =
            (0.0, 0.0, 0.0, 0.0);
        for (i, layer) in layers.iter_mut().enumerate() {
            layer.no3 += carried_no3;
            layer.nh4 += carried_nh4;
            layer.active_n += carried_active;
            layer.labile_p += carried_p;

            let warmth = (layer.temperature / 25.0).clamp(0.0, 1.0);
            let humified = layer.stable_n * 0.00005;
            layer.stable_n -= humified;
            layer.active_n += humified;
            let mineralized = layer.active_n * 0.0005 * warmth;
            layer.active_n -= mineralized;
            layer.nh4 += mineralized;

            layer.nitrification = layer.nh4 * 0.05 * warmth;
            layer.nh4 -= layer.nitrification;
            layer.no3 += layer.nitrification;
            layer.volatilization = if i == 0 { layer.nh4 * 0.01 } else { 0.0 };
            layer.nh4 -= layer.volatilization;
            layer.tot_nitri_volatil = layer.nitrification + layer.volatilization;
            layer.denitrification = if layer.soil_water > 0.9 * layer.capacity {
                layer.no3 * 0.02
            } else {
                0.0
            };
            layer.no3 -= layer.denitrification;
            gaseous += layer.volatilization + layer.denitrification;

            layer.n_trans = (layer.trans_act * 0.05).min(layer.no3 * 0.5);
            layer.no3 -= layer.n_trans;
            n_uptake += layer.n_trans;
            let p_taken = (layer.n_trans * 0.15).min(layer.labile_p * 0.5);
            layer.labile_p -= p_taken;
            p_uptake += p_taken;

            let moving = layer.perc / (layer.soil_water + layer.perc).max(1.0);
            layer.no3_perc = layer.no3 * moving * 0.5;
            layer.nh4_perc = layer.nh4 * moving * 0.05;
            layer.active_n_perc = layer.active_n * moving * 0.001;
            let p_perc = layer.labile_p * moving * 0.001;
            layer.no3 -= layer.no3_perc;
            layer.nh4 -= layer.nh4_perc;
            layer.active_n -= layer.active_n_perc;
            layer.labile_p -= p_perc;

            carried_no3 = layer.no3_perc;
            carried_nh4 = layer.nh4_perc;
            carried_active = layer.active_n_perc;
            carried_p = p_perc;
        }

        let n_drainage = carried_no3 + carried_nh4;
        let n_runoff = no3_runoff + nh4_runoff;
        let delta_n = self.soil.total_mineral_n() - n_before;
        let n_calc = n_drainage + n_runoff + nh4_erosion + n_uptake + gaseous + delta_n;
        let delta_p = self.soil.total_labile_p() - p_before;
        let p_calc = carried_p + p_runoff + p_erosion + p_uptake + delta_p;

        let fluxes = &mut self.soil.fluxes;
        fluxes.record("fresh_N", fresh_n);
        fluxes.record("NO3_runoff", no3_runoff);
        fluxes.record("NH4_runoff", nh4_runoff);
        fluxes.record("NH4_erosion", nh4_erosion);
        fluxes.record("active_N_erosion", active_erosion);
        fluxes.record("stable_N_erosion", stable_erosion);
        fluxes.record("fresh_N_erosion", fresh_n * sed * 0.001);
        fluxes.record("NO3_drainage", carried_no3);
        fluxes.record("NH4_drainage", carried_nh4);
        fluxes.record("active_N_drainage", carried_active);

        fluxes.record("manure_N", manure_n);
        fluxes.record("N_calc", n_calc);
        fluxes.record("N_balance_difference", manure_n - n_calc);
        fluxes.record("delta_N", delta_n);
        fluxes.record("N_drainage", n_drainage);
        fluxes.record("N_runoff", n_runoff);
        fluxes.record("N_erosion", nh4_erosion);
        fluxes.record("N_uptake", n_uptake);

        fluxes.record("manure_P", manure_p);
        fluxes.record("P_calc", p_calc);
        fluxes.record("P_balance_difference", manure_p - p_calc);
        fluxes.record("delta_P", delta_p);
        fluxes.record("P_drainage", carried_p);
        fluxes.record("P_runoff", p_runoff);
        fluxes.record("P_erosion", p_erosion);
        fluxes.record("P_uptake", p_uptake);

        (n_uptake, p_uptake)
    }

    // =====================================================================
    // CROP, ANIMALS, FEED
    // =====================================================================

    fn step_crop(&mut self, n_uptake: f64, p_uptake: f64) {
        let day = self.time.day;
        let crop = &mut self.crop;
        crop.yield_actual = 0.0;

        if !(PLANTING_DAY..=HARVEST_DAY).contains(&day) {
            crop.fr_phu = 0.0;
            crop.lai_actual = 0.0;
            crop.z_root = 0.0;
            return;
        }

        crop.fr_phu = f64::from(day - PLANTING_DAY) / f64::from(HARVEST_DAY - PLANTING_DAY);
        let vigour = 4.0 * crop.fr_phu * (1.0 - crop.fr_phu);
        let trans_max = self.soil.fluxes.today("trans_max");
        let stress = if trans_max > 0.0 {
            (self.soil.fluxes.today("trans_sum") / trans_max).min(1.0)
        } else {
            1.0
        };
        crop.biomass_actual += 120.0 * vigour * stress;
        crop.lai_actual = 5.0 * vigour;
        crop.z_root = 1000.0 * crop.fr_phu;
        crop.bio_n += n_uptake;
        crop.bio_p += p_uptake;

        if day == HARVEST_DAY {
            crop.yield_actual = crop.biomass_actual * 0.45;
            crop.yield_actual_annual += crop.yield_actual;
            self.feed.dm += crop.yield_actual * 0.9;
            crop.biomass_actual = 0.0;
            crop.bio_n = 0.0;
            crop.bio_p = 0.0;
        }
    }

    fn step_animals(&mut self) {
        let head_count: usize = self.animals.all_pens.iter().map(|p| p.animals_in_pen.len()).sum();
        let draws: Vec<(f64, f64)> = (0..head_count)
            .map(|_| (self.gauss(0.1), self.gauss(4.0)))
            .collect();

        let mut draws = draws.into_iter();
        for pen in &mut self.animals.all_pens {
            for animal in &mut pen.animals_in_pen {
                let (growth_noise, milk_noise) = draws.next().unwrap_or((0.0, 0.0));
                animal.daily_growth = 0.8 + growth_noise;
                animal.body_weight += animal.daily_growth;
                animal.milk_yield = (30.0 + milk_noise).max(0.0);
            }
            pen.refresh_averages();
            let cost = if pen.pen_populated {
                2.5 + 0.02 * pen.avg_milk
            } else {
                0.0
            };
            pen.ration.insert("objective".to_string(), cost);
        }
    }

    fn step_feed(&mut self) {
        let head_count: usize = self
            .animals
            .all_pens
            .iter()
            .map(|p| p.animals_in_pen.len())
            .sum();
        let feed = &mut self.feed;
        let shrink = feed.dm * 0.0005;
        feed.dm = (feed.dm - shrink - head_count as f64 * DAILY_INTAKE_KG).max(0.0);

        feed.c = feed.dm * 0.45;
        feed.n = feed.dm * 0.025;
        feed.p = feed.dm * 0.004;
        let cp = feed.n * 6.25;
        feed.cp_loss += (feed.cp - cp).max(0.0) * 0.01;
        feed.cp = cp;
        feed.npn = feed.cp * 0.1;
        feed.c_loss += shrink * 0.45;
    }
}
