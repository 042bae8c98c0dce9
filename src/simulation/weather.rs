// src/simulation/weather.rs

use crate::model::farm::Weather;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Number of days in a calendar year.
pub fn days_in_year(cal_year: i32) -> u32 {
    NaiveDate::from_ymd_opt(cal_year, 12, 31)
        .map(|d| d.ordinal())
        .unwrap_or(365)
}

/// Generates daily rainfall for `years` calendar years starting at `start_year`.
///
/// Each day rains with probability `wet_chance`; wet-day depth is drawn from a
/// Normal distribution and clamped at zero.
///
/// # Arguments
/// * `start_year` - First calendar year.
/// * `years` - Length of the simulation.
/// * `wet_chance` - Daily probability of rain (e.g., 0.3).
/// * `mean` - Average depth on a wet day, mm.
/// * `std_dev` - Spread of wet-day depth, mm.
pub fn generate_rainfall<R: Rng>(
    rng: &mut R,
    start_year: i32,
    years: u32,
    wet_chance: f64,
    mean: f64,
    std_dev: f64,
) -> Weather {
    // A non-finite or negative spread falls back to a fixed depth.
    let normal = Normal::new(mean, std_dev).ok();

    let mut rainfall = Vec::with_capacity(years as usize);
    for offset in 0..years {
        let days = days_in_year(start_year + offset as i32);
        let mut year = Vec::with_capacity(days as usize);
        for _ in 0..days {
            if !rng.gen_bool(wet_chance.clamp(0.0, 1.0)) {
                year.push(0.0);
                continue;
            }
            let depth = match &normal {
                Some(normal) => normal.sample(rng),
                None => mean,
            };
            year.push(depth.max(0.0));
        }
        rainfall.push(year);
    }

    Weather { rainfall }
}
