// src/report/binding.rs

use crate::error::{ReportError, Result};
use crate::expr::{EvalContext, Expr, Sample};
use crate::model::state::ContextRoot;
use indexmap::IndexMap;

/// Storage behind a binding: a growing series for daily tables, one cell for annual ones.
pub trait Buffer: Default {
    fn record(&mut self, sample: Sample);
    fn reset(&mut self);
}

impl Buffer for Vec<Sample> {
    fn record(&mut self, sample: Sample) {
        self.push(sample);
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl Buffer for Sample {
    fn record(&mut self, sample: Sample) {
        *self = sample;
    }

    fn reset(&mut self) {
        *self = Sample::default();
    }
}

/// A named observable: where it is read from, its unit, and what has been recorded so far.
#[derive(Debug, Clone)]
pub struct VariableBinding<B> {
    name: String,
    source: String,
    expression: Expr,
    unit: String,
    buffer: B,
}

impl<B: Buffer> VariableBinding<B> {
    pub fn new(name: &str, source: &str, unit: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            expression: Expr::parse(source)?,
            unit: unit.to_string(),
            buffer: B::default(),
        })
    }

    /// `time.<field>` binding used for the date axis; built without parsing.
    fn time_axis(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            source: format!("time.{}", field),
            expression: Expr::Field(Box::new(Expr::Root(ContextRoot::Time)), field.to_string()),
            unit: String::new(),
            buffer: B::default(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &B {
        &self.buffer
    }
}

pub type DailyTable = BindingTable<Vec<Sample>>;
pub type AnnualTable = BindingTable<Sample>;

/// Ordered name -> binding table. Declaration order is column order.
#[derive(Debug, Clone)]
pub struct BindingTable<B> {
    bindings: IndexMap<String, VariableBinding<B>>,
}

impl<B: Buffer> BindingTable<B> {
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str, source: &str, unit: &str) -> Result<()> {
        if self.bindings.contains_key(name) {
            return Err(ReportError::Config(format!(
                "variable '{}' is declared twice",
                name
            )));
        }
        let binding = VariableBinding::new(name, source, unit)?;
        self.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    fn insert_axis(&mut self, name: &str, field: &str) {
        self.bindings
            .insert(name.to_string(), VariableBinding::time_axis(name, field));
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&VariableBinding<B>> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    pub fn units(&self) -> Vec<&str> {
        self.bindings.values().map(VariableBinding::unit).collect()
    }

    /// Evaluates every binding, then records all of them.
    ///
    /// Nothing is recorded unless every expression succeeds, so buffers never
    /// drift out of step with one another.
    pub fn sample(&mut self, report: &str, ctx: &EvalContext<'_>) -> Result<()> {
        let mut samples = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings.values() {
            let sample = ctx
                .evaluate(&binding.expression)
                .map_err(|reason| ReportError::Evaluation {
                    report: report.to_string(),
                    binding: binding.name.clone(),
                    expression: binding.source.clone(),
                    reason,
                })?;
            samples.push(sample);
        }
        for (binding, sample) in self.bindings.values_mut().zip(samples) {
            binding.buffer.record(sample);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.buffer.reset();
        }
    }
}

impl<B: Buffer> Default for BindingTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTable<Vec<Sample>> {
    /// A daily table already carrying the `year`, `j_day` date axis.
    pub fn daily() -> Self {
        let mut table = Self::new();
        table.insert_axis("year", "cal_year");
        table.insert_axis("j_day", "day");
        table
    }

    /// Days recorded since the last reset.
    pub fn row_count(&self) -> usize {
        self.bindings
            .values()
            .next()
            .map_or(0, |binding| binding.buffer.len())
    }

    /// Recorded days as text rows, in column order.
    pub fn rows(&self) -> Vec<Vec<String>> {
        (0..self.row_count())
            .map(|day| {
                self.bindings
                    .values()
                    .map(|binding| binding.buffer[day].to_string())
                    .collect()
            })
            .collect()
    }
}

impl BindingTable<Sample> {
    /// An annual table already carrying the `year` column.
    pub fn annual() -> Self {
        let mut table = Self::new();
        table.insert_axis("year", "cal_year");
        table
    }

    pub fn row(&self) -> Vec<String> {
        self.bindings
            .values()
            .map(|binding| binding.buffer.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::state::SimulationState;
    use serde_json::json;

    fn state(day: u32, tsurf: f64) -> SimulationState {
        SimulationState {
            time: json!({"cal_year": 2020, "day": day}),
            soil: json!({"Tsurf": tsurf}),
            ..Default::default()
        }
    }

    #[test]
    fn daily_table_starts_with_date_axis() {
        let table = DailyTable::daily();
        assert_eq!(table.names(), vec!["year", "j_day"]);
        assert_eq!(AnnualTable::annual().names(), vec!["year"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut table = DailyTable::daily();
        assert!(matches!(
            table.declare("year", "time.cal_year", ""),
            Err(ReportError::Config(_))
        ));
    }

    #[test]
    fn failed_sample_records_nothing() {
        let mut table = DailyTable::daily();
        table.declare("temp", "soil.Tsurf", "C").unwrap();
        table.declare("broken", "soil.missing", "").unwrap();

        let err = table
            .sample("soil_report", &EvalContext::new(&state(1, 5.0)))
            .unwrap_err();
        match err {
            ReportError::Evaluation {
                report, binding, ..
            } => {
                assert_eq!(report, "soil_report");
                assert_eq!(binding, "broken");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(table.row_count(), 0);
        assert!(table.get("year").unwrap().buffer().is_empty());
    }

    #[test]
    fn buffers_grow_together_and_reset_to_empty() {
        let mut table = DailyTable::daily();
        table.declare("temp", "soil.Tsurf", "C").unwrap();
        for day in 1..=4 {
            table
                .sample("soil_report", &EvalContext::new(&state(day, 1.0)))
                .unwrap();
        }
        for name in table.names() {
            assert_eq!(table.get(name).unwrap().buffer().len(), 4);
        }
        table.reset();
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn annual_values_overwrite_and_reset_to_zero() {
        let mut table = AnnualTable::annual();
        table.declare("temp", "soil.Tsurf", "C").unwrap();
        table
            .sample("soil_report", &EvalContext::new(&state(1, 2.0)))
            .unwrap();
        table
            .sample("soil_report", &EvalContext::new(&state(2, 3.0)))
            .unwrap();
        assert_eq!(table.row(), vec!["2020", "3.0"]);
        table.reset();
        assert_eq!(table.get("temp").unwrap().buffer(), &Sample::Integer(0));
    }
}
