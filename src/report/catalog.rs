// src/report/catalog.rs
//
// Built-in report tables. Each row is (column name, expression, unit); the
// `year`/`j_day` date axis is added by the leaf itself and is not listed here.

use crate::error::Result;
use crate::report::config::{FieldReportConfig, LeafConfig, MassBalanceConfig, PenReportConfig};
use crate::report::group::GroupReport;
use crate::report::leaf::{ChartKind, LeafReport, Scope};

pub type Row = (&'static str, &'static str, &'static str);

#[derive(Debug, Clone, Copy)]
pub struct LeafTable {
    pub daily: &'static [Row],
    pub annual: &'static [Row],
    pub chart: ChartKind,
}

// ============================================================================
// Field
// ============================================================================

pub const CROP: LeafTable = LeafTable {
    daily: &[
        ("fr_PHU", "crop_type.fr_PHU", "%"),
        ("biomass", "crop_type.biomass_actual", "kg ha^-1"),
        ("LAI_actual", "crop_type.LAI_actual", "m^2/m^2"),
        ("Bio_N", "crop_type.bio_N", "kg N ha^-1"),
        ("Bio_P", "crop_type.bio_P", "kg P ha^-1"),
        ("rooting_depth", "crop_type.z_root", "mm"),
        ("yield_actual", "crop_type.yield_actual", "kg ha^-1"),
    ],
    annual: &[("yield", "crop_type.yield_actual_annual", "kg/ha")],
    chart: ChartKind::TimeSeries,
};

pub const SOIL: LeafTable = LeafTable {
    daily: &[
        ("precip", "weather.rainfall[time.year - 1][time.day - 1]", "mm"),
        ("runoff", "soil.runoff", "mm"),
        ("ET_max", "soil.ET_max", "mm d^-1"),
        ("ET_act", "soil.ET_act", "mm H20"),
        ("trans_max", "soil.trans_max", "mm H20"),
        ("evap_max", "soil.evap_max", "mm H20"),
        ("surface_temp", "soil.Tsurf", "C"),
        ("sediment_yield", "soil.sed", "metric tons"),
        ("residue", "soil.residue", "kg/ha"),
        ("trans_act_L1", "soil.soil_layers[0].trans_act", "mm H20"),
        ("trans_act_L2", "soil.soil_layers[1].trans_act", "mm H20"),
        ("trans_act_L3", "soil.soil_layers[2].trans_act", "mm H20"),
        ("soil_water_L1", "soil.soil_layers[0].soil_water", "mm"),
        ("soil_water_L2", "soil.soil_layers[1].soil_water", "mm"),
        ("soil_water_L3", "soil.soil_layers[2].soil_water", "mm"),
        ("evap_L1", "soil.soil_layers[0].evap", "mm H20"),
        ("evap_L2", "soil.soil_layers[1].evap", "mm H20"),
        ("evap_L3", "soil.soil_layers[2].evap", "mm H20"),
        ("perc_L1", "soil.soil_layers[0].perc", "mm H20"),
        ("perc_L2", "soil.soil_layers[1].perc", "mm H20"),
        ("perc_L3", "soil.soil_layers[2].perc", "mm H20"),
        ("temperature_L1", "soil.soil_layers[0].temperature", "C"),
        ("temperature_L2", "soil.soil_layers[1].temperature", "C"),
        ("temperature_L3", "soil.soil_layers[2].temperature", "C"),
    ],
    annual: &[
        ("ET_max", "soil.ET_max_annual", "mm H20"),
        ("ET", "soil.ET_act_annual", "mm H20"),
    ],
    chart: ChartKind::TimeSeries,
};

pub const SOIL_NITROGEN: LeafTable = LeafTable {
    daily: &[
        ("NO3_L1", "soil.soil_layers[0].NO3", "kg"),
        ("NO3_L2", "soil.soil_layers[1].NO3", "kg"),
        ("NO3_L3", "soil.soil_layers[2].NO3", "kg"),
        ("NH4_L1", "soil.soil_layers[0].NH4", "kg"),
        ("NH4_L2", "soil.soil_layers[1].NH4", "kg"),
        ("NH4_L3", "soil.soil_layers[2].NH4", "kg"),
        ("active_N_L1", "soil.soil_layers[0].active_N", "kg"),
        ("active_N_L2", "soil.soil_layers[1].active_N", "kg"),
        ("active_N_L3", "soil.soil_layers[2].active_N", "kg"),
        ("stable_N_L1", "soil.soil_layers[0].stable_N", "kg"),
        ("stable_N_L2", "soil.soil_layers[1].stable_N", "kg"),
        ("stable_N_L3", "soil.soil_layers[2].stable_N", "kg"),
        ("fresh_N", "soil.fresh_N", "kg"),
        ("Nitri_L1", "soil.soil_layers[0].nitrification", "kg/ha"),
        ("Nitri_L2", "soil.soil_layers[1].nitrification", "kg/ha"),
        ("Nitri_L3", "soil.soil_layers[2].nitrification", "kg/ha"),
        ("Volati_L1", "soil.soil_layers[0].volatilization", "kg/ha"),
        ("Volati_L2", "soil.soil_layers[1].volatilization", "kg/ha"),
        ("Volati_L3", "soil.soil_layers[2].volatilization", "kg/ha"),
        ("Denitri_L1", "soil.soil_layers[0].denitrification", "kg/ha"),
        ("Denitri_L2", "soil.soil_layers[1].denitrification", "kg/ha"),
        ("Denitri_L3", "soil.soil_layers[2].denitrification", "kg/ha"),
        ("NO3_runoff", "soil.NO3_runoff", "kg/ha"),
        ("NH4_runoff", "soil.NH4_runoff", "kg/ha"),
        ("NO3_perc_L1", "soil.soil_layers[0].NO3_perc", "kg/ha"),
        ("NO3_perc_L2", "soil.soil_layers[1].NO3_perc", "kg/ha"),
        ("NO3_perc_L3", "soil.soil_layers[2].NO3_perc", "kg/ha"),
        ("NH4_perc_L1", "soil.soil_layers[0].NH4_perc", "kg/ha"),
        ("NH4_perc_L2", "soil.soil_layers[1].NH4_perc", "kg/ha"),
        ("NH4_perc_L3", "soil.soil_layers[2].NH4_perc", "kg/ha"),
        ("NH4_erosion", "soil.NH4_erosion", "kg/ha"),
        ("active_N_erosion", "soil.active_N_erosion", "kg/ha"),
        ("stable_N_erosion", "soil.stable_N_erosion", "kg/ha"),
        ("fresh_N_erosion", "soil.fresh_N_erosion", "kg/ha"),
    ],
    annual: &[
        ("NO3_runoff", "soil.NO3_runoff_annual", "kg/ha"),
        ("NH4_runoff", "soil.NH4_runoff_annual", "kg/ha"),
        ("NH4_erosion", "soil.NH4_erosion_annual", "kg/ha"),
        ("active_N_erosion", "soil.active_N_erosion_annual", "kg/ha"),
        ("stable_N_erosion", "soil.stable_N_erosion_annual", "kg/ha"),
        ("fresh_N_erosion", "soil.fresh_N_erosion_annual", "kg/ha"),
        ("NO3_drainage", "soil.NO3_drainage_annual", "kg/ha"),
        ("NH4_drainage", "soil.NH4_drainage_annual", "kg/ha"),
        ("active_N_drainage", "soil.active_N_drainage_annual", "kg/ha"),
    ],
    chart: ChartKind::TimeSeries,
};

pub const SOIL_PHOSPHORUS: LeafTable = LeafTable {
    daily: &[],
    annual: &[],
    chart: ChartKind::TimeSeries,
};

// ============================================================================
// Feed and custom
// ============================================================================

pub const FEED_STORAGE: LeafTable = LeafTable {
    daily: &[],
    annual: &[
        ("DM", "feed.DM", "kg"),
        ("C", "feed.C", "kg"),
        ("N", "feed.N", "kg"),
        ("P", "feed.P", "kg"),
        ("CP", "feed.CP", "kg"),
        ("NPN", "feed.NPN", "kg"),
        ("C_loss", "feed.C_loss", "kg"),
        ("CP_loss", "feed.CP_loss", "kg"),
    ],
    chart: ChartKind::TimeSeries,
};

/// Empty on purpose: its columns come from `daily_variables`/`annual_variables`.
pub const CUSTOM: LeafTable = LeafTable {
    daily: &[],
    annual: &[],
    chart: ChartKind::TimeSeries,
};

// ============================================================================
// Mass balance
// ============================================================================

pub const WATER_BALANCE: LeafTable = LeafTable {
    daily: &[
        ("actual", "soil.p_act", "mmH2O"),
        ("calculated", "soil.p_calc", "mmH2O"),
        ("difference", "soil.water_balance_difference", "mmH2O"),
        ("delta", "soil.delta_SW", "mmH2O"),
        ("runoff", "soil.runoff", "mmH2O"),
        ("evaporation", "soil.evap_sum", "mmH2O"),
        ("transpiration", "soil.trans_sum", "mmH2O"),
        ("drainage", "soil.drainage", "mmH2O"),
    ],
    annual: &[
        ("actual", "round(soil.p_act_annual, 3)", "mmH2O"),
        ("calculated", "round(soil.p_calc_annual, 3)", "mmH2O"),
        ("difference", "round(soil.water_balance_difference_annual, 3)", "mmH2O"),
        ("delta", "round(soil.delta_SW_annual, 3)", "mmH2O"),
        ("runoff", "round(soil.runoff_annual, 3)", "mmH2O"),
        ("evaporation", "round(soil.evap_sum_annual, 3)", "mmH2O"),
        ("transpiration", "round(soil.trans_sum_annual, 3)", "mmH2O"),
        ("drainage", "round(soil.drainage_annual, 3)", "mmH2O"),
    ],
    chart: ChartKind::MassBalance,
};

pub const PHOSPHORUS_BALANCE: LeafTable = LeafTable {
    daily: &[
        ("actual", "soil.manure_P", "kg"),
        ("calculated", "soil.P_calc", "kg"),
        ("difference", "soil.P_balance_difference", "kg"),
        ("delta", "soil.delta_P", "kg"),
        ("P_drainage", "soil.P_drainage", "kg"),
        ("P_runoff", "soil.P_runoff", "kg"),
        ("P_erosion", "soil.P_erosion", "kg"),
        ("P_uptake", "soil.P_uptake", "kg"),
    ],
    annual: &[
        ("actual", "soil.manure_P_annual", "kg"),
        ("calculated", "soil.P_calc_annual", "kg"),
        ("difference", "soil.P_balance_difference_annual", "kg"),
        ("delta", "soil.delta_P_annual", "kg"),
        ("P_drainage", "soil.P_drainage_annual", "kg"),
        ("P_runoff", "soil.P_runoff_annual", "kg"),
        ("P_erosion", "soil.P_erosion_annual", "kg"),
        ("P_uptake", "soil.P_uptake_annual", "kg"),
    ],
    chart: ChartKind::MassBalance,
};

pub const NITROGEN_BALANCE: LeafTable = LeafTable {
    daily: &[
        ("actual", "soil.manure_N", "kg"),
        ("calculated", "soil.N_calc", "kg"),
        ("difference", "soil.N_balance_difference", "kg"),
        ("delta", "soil.delta_N", "kg N"),
        ("N_drainage", "soil.N_drainage", "kg"),
        ("N_runoff", "soil.N_runoff", "kg"),
        ("N_erosion", "soil.N_erosion", "kg"),
        ("N_uptake", "soil.N_uptake", "kg"),
    ],
    annual: &[
        ("actual", "soil.manure_N_annual", "kg"),
        ("calculated", "soil.N_calc_annual", "kg"),
        ("difference", "soil.N_balance_difference_annual", "kg"),
        ("delta", "soil.delta_N_annual", "kg"),
        ("N_drainage", "soil.N_drainage_annual", "kg"),
        ("N_runoff", "soil.N_runoff_annual", "kg"),
        ("N_erosion", "soil.N_erosion_annual", "kg"),
        ("N_uptake", "soil.N_uptake_annual", "kg"),
    ],
    chart: ChartKind::MassBalance,
};

// ============================================================================
// Pens
// ============================================================================

pub const RATION: LeafTable = LeafTable {
    daily: &[
        ("num_animals", "len(pen.animals_in_pen)", ""),
        (
            "achieved_price",
            "pen.ration['objective'] if pen.pen_populated else 0",
            "",
        ),
    ],
    annual: &[],
    chart: ChartKind::TimeSeries,
};

pub const GROWTH: LeafTable = LeafTable {
    daily: &[
        ("num_animals_in_pen", "len(pen.animals_in_pen)", ""),
        ("average_growth", "pen.avg_growth", "kg"),
        ("average_milk", "pen.avg_milk", "kg"),
    ],
    annual: &[],
    chart: ChartKind::TimeSeries,
};

pub const MANURE: LeafTable = LeafTable {
    daily: &[("num_animals", "len(pen.animals_in_pen)", "")],
    annual: &[],
    chart: ChartKind::TimeSeries,
};

/// Builds one leaf from its table plus whatever the configuration adds.
pub fn build_leaf(
    config: &LeafConfig,
    table: &LeafTable,
    extension: &str,
    scope: Scope,
) -> Result<LeafReport> {
    let mut leaf = LeafReport::new(&config.report_name, config.produce_csv, config.produce_graphics)
        .with_scope(scope)
        .with_chart(table.chart)
        .with_extension(extension)
        .with_date_step(config.ration_interval)?;

    for (name, expression, unit) in table.daily {
        leaf.declare_daily(name, expression, unit)?;
    }
    for extra in &config.daily_variables {
        leaf.declare_daily(&extra.name, &extra.expression, &extra.unit)?;
    }
    for (name, expression, unit) in table.annual {
        leaf.declare_annual(name, expression, unit)?;
    }
    for extra in &config.annual_variables {
        leaf.declare_annual(&extra.name, &extra.expression, &extra.unit)?;
    }
    Ok(leaf)
}

fn group_of(
    name: &str,
    produce_csv: bool,
    produce_graphics: bool,
    leaves: &[(&LeafConfig, &LeafTable)],
    extension: &str,
    scope: Scope,
) -> Result<GroupReport> {
    let mut group = GroupReport::new(name, produce_csv, produce_graphics);
    for (config, table) in leaves {
        group.add_child(Box::new(build_leaf(config, table, extension, scope)?))?;
    }
    Ok(group)
}

pub fn field_report(config: &FieldReportConfig, extension: &str) -> Result<GroupReport> {
    group_of(
        &config.report_name,
        config.produce_csv,
        config.produce_graphics,
        &[
            (&config.crop_report, &CROP),
            (&config.soil_report, &SOIL),
            (&config.soil_nitrogen_report, &SOIL_NITROGEN),
            (&config.soil_phosphorus_report, &SOIL_PHOSPHORUS),
        ],
        extension,
        Scope::Farm,
    )
}

pub fn mass_balance_report(config: &MassBalanceConfig, extension: &str) -> Result<GroupReport> {
    group_of(
        &config.report_name,
        config.produce_csv,
        config.produce_graphics,
        &[
            (&config.water_balance, &WATER_BALANCE),
            (&config.phosphorus_balance, &PHOSPHORUS_BALANCE),
            (&config.nitrogen_balance, &NITROGEN_BALANCE),
        ],
        extension,
        Scope::Farm,
    )
}

/// The `pen_<id>` group for one pen, built from the shared pen template.
pub fn pen_report(config: &PenReportConfig, extension: &str, pen_id: usize) -> Result<GroupReport> {
    group_of(
        &format!("pen_{}", pen_id),
        config.produce_csv,
        config.produce_graphics,
        &[
            (&config.ration_report, &RATION),
            (&config.growth_report, &GROWTH),
            (&config.manure_report, &MANURE),
        ],
        extension,
        Scope::Pen(pen_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::config::{BindingConfig, OutputConfig};
    use crate::report::traits::ReportNode;

    #[test]
    fn every_table_parses() {
        let config = OutputConfig::default();
        assert!(field_report(&config.field_report, "csv").is_ok());
        assert!(mass_balance_report(&config.mass_balance_report, "csv").is_ok());
        assert!(pen_report(&config.pen_report, "csv", 0).is_ok());
        assert!(build_leaf(&config.feed_storage_report, &FEED_STORAGE, "csv", Scope::Farm).is_ok());
    }

    #[test]
    fn tables_start_with_the_date_axis() {
        let leaf = build_leaf(&LeafConfig::enabled("soil_report"), &SOIL, "csv", Scope::Farm).unwrap();
        let names = leaf.daily_table().names();
        assert_eq!(&names[..3], &["year", "j_day", "precip"]);
        assert_eq!(leaf.annual_table().names(), vec!["year", "ET_max", "ET"]);
    }

    #[test]
    fn balance_leaves_lead_with_summary_components() {
        let leaf = build_leaf(
            &LeafConfig::enabled("water_balance"),
            &WATER_BALANCE,
            "csv",
            Scope::Farm,
        )
        .unwrap();
        assert_eq!(leaf.chart(), ChartKind::MassBalance);
        assert_eq!(
            &leaf.annual_table().names()[1..5],
            &["actual", "calculated", "difference", "delta"]
        );
    }

    #[test]
    fn extra_bindings_append_after_built_ins() {
        let mut config = LeafConfig::enabled("custom_report");
        config.daily_variables.push(BindingConfig {
            name: "rain".to_string(),
            expression: "weather.rainfall[0][0]".to_string(),
            unit: "mm".to_string(),
        });
        let leaf = build_leaf(&config, &CUSTOM, "csv", Scope::Farm).unwrap();
        assert_eq!(leaf.daily_table().names(), vec!["year", "j_day", "rain"]);
        assert_eq!(leaf.daily_table().units(), vec!["", "", "mm"]);
    }

    #[test]
    fn extra_binding_cannot_shadow_a_built_in() {
        let mut config = LeafConfig::enabled("growth_report");
        config.daily_variables.push(BindingConfig {
            name: "average_milk".to_string(),
            expression: "pen.avg_milk * 2".to_string(),
            unit: String::new(),
        });
        let err = build_leaf(&config, &GROWTH, "csv", Scope::Pen(0)).unwrap_err();
        assert!(err.to_string().contains("growth_report"));
    }

    #[test]
    fn pen_groups_are_named_by_pen() {
        let group = pen_report(&OutputConfig::default().pen_report, "csv", 3).unwrap();
        assert_eq!(group.name(), "pen_3");
        let ration = group.child("ration_report").and_then(|c| c.as_leaf()).unwrap();
        assert_eq!(ration.scope(), Scope::Pen(3));
    }
}
