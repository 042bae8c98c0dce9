// src/expr/eval.rs

use crate::error::Result;
use crate::expr::parser::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::model::state::{ContextRoot, SimulationState};
use serde_json::Value;
use std::fmt;

type EvalResult<T> = std::result::Result<T, String>;

/// One recorded cell of a report.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Default for Sample {
    fn default() -> Self {
        Sample::Integer(0)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Integer(value) => write!(f, "{}", value),
            // Debug keeps the decimal point on whole floats: 5.0 rather than 5
            Sample::Float(value) => write!(f, "{:?}", value),
            Sample::Text(value) => f.write_str(value),
        }
    }
}

/// The objects an expression may see: the farm-wide state, plus one pen for pen reports.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    state: &'a SimulationState,
    pen: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    pub fn new(state: &'a SimulationState) -> Self {
        Self { state, pen: None }
    }

    /// Binds `pen` to `all_pens[pen_id]`; fails if the pen does not exist.
    pub fn for_pen(state: &'a SimulationState, pen_id: usize) -> Result<Self> {
        let pen = state.pen(pen_id)?;
        Ok(Self {
            state,
            pen: Some(pen),
        })
    }

    fn root(&self, root: ContextRoot) -> EvalResult<&'a Value> {
        match root {
            ContextRoot::Pen => self
                .pen
                .ok_or_else(|| "'pen' is only available in pen reports".to_string()),
            other => self
                .state
                .root(other)
                .ok_or_else(|| format!("'{}' is not available", other.name())),
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Sample> {
        self.eval(expr)?.into_sample()
    }

    fn eval(&self, expr: &Expr) -> EvalResult<Operand<'a>> {
        match expr {
            Expr::Root(root) => self.root(*root).map(Operand::Node),
            Expr::Integer(value) => Ok(Operand::Integer(*value)),
            Expr::Float(value) => Ok(Operand::Float(*value)),
            Expr::Text(value) => Ok(Operand::Text(value.clone())),
            Expr::Bool(value) => Ok(Operand::Bool(*value)),
            Expr::Field(base, name) => match self.eval(base)? {
                Operand::Node(Value::Object(map)) => map
                    .get(name)
                    .map(Operand::Node)
                    .ok_or_else(|| format!("no field '{}'", name)),
                other => Err(format!(
                    "cannot read field '{}' from {}",
                    name,
                    other.kind()
                )),
            },
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?.scalar()?;
                index_into(base, index)
            }
            Expr::Unary(UnaryOp::Neg, operand) => match self.eval(operand)?.scalar()? {
                Operand::Integer(value) => value
                    .checked_neg()
                    .map(Operand::Integer)
                    .ok_or_else(|| "integer overflow".to_string()),
                Operand::Float(value) => Ok(Operand::Float(-value)),
                Operand::Bool(value) => Ok(Operand::Integer(-(value as i64))),
                other => Err(format!("cannot negate {}", other.kind())),
            },
            Expr::Unary(UnaryOp::Not, operand) => {
                Ok(Operand::Bool(!self.eval(operand)?.truthy()))
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                if !self.eval(lhs)?.truthy() {
                    return Ok(Operand::Bool(false));
                }
                Ok(Operand::Bool(self.eval(rhs)?.truthy()))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                if self.eval(lhs)?.truthy() {
                    return Ok(Operand::Bool(true));
                }
                Ok(Operand::Bool(self.eval(rhs)?.truthy()))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?.scalar()?;
                let rhs = self.eval(rhs)?.scalar()?;
                binary(*op, lhs, rhs)
            }
            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call(Builtin::Len, args) => match self.eval(first_arg("len", args)?)? {
                Operand::Node(Value::Array(items)) => Ok(Operand::Integer(items.len() as i64)),
                Operand::Node(Value::Object(map)) => Ok(Operand::Integer(map.len() as i64)),
                Operand::Node(Value::String(text)) => {
                    Ok(Operand::Integer(text.chars().count() as i64))
                }
                Operand::Text(text) => Ok(Operand::Integer(text.chars().count() as i64)),
                other => Err(format!("len() is not defined for {}", other.kind())),
            },
            Expr::Call(Builtin::Round, args) => {
                let value = self.eval(first_arg("round", args)?)?.scalar()?;
                let digits = match args.get(1) {
                    Some(arg) => match self.eval(arg)?.scalar()? {
                        Operand::Integer(n) => Some(n),
                        other => return Err(format!("round() digits must be an integer, got {}", other.kind())),
                    },
                    None => None,
                };
                round(value, digits)
            }
        }
    }
}

fn first_arg<'e>(name: &str, args: &'e [Expr]) -> EvalResult<&'e Expr> {
    args.first()
        .ok_or_else(|| format!("{}() needs at least one argument", name))
}

/// Intermediate evaluation result. `Node` borrows straight from the state tree.
#[derive(Debug, Clone)]
enum Operand<'a> {
    Node(&'a Value),
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl<'a> Operand<'a> {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Node(Value::Null) => "null",
            Operand::Node(Value::Bool(_)) | Operand::Bool(_) => "a boolean",
            Operand::Node(Value::Number(_)) | Operand::Integer(_) | Operand::Float(_) => {
                "a number"
            }
            Operand::Node(Value::String(_)) | Operand::Text(_) => "a string",
            Operand::Node(Value::Array(_)) => "a list",
            Operand::Node(Value::Object(_)) => "an object",
        }
    }

    /// Unwraps JSON leaves into plain scalars; containers stay as nodes.
    fn scalar(self) -> EvalResult<Operand<'a>> {
        match self {
            Operand::Node(Value::Number(number)) => {
                if let Some(value) = number.as_i64() {
                    Ok(Operand::Integer(value))
                } else {
                    number
                        .as_f64()
                        .map(Operand::Float)
                        .ok_or_else(|| format!("number {} is out of range", number))
                }
            }
            Operand::Node(Value::Bool(value)) => Ok(Operand::Bool(*value)),
            Operand::Node(Value::String(value)) => Ok(Operand::Text(value.clone())),
            other => Ok(other),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Operand::Node(Value::Null) => false,
            Operand::Node(Value::Bool(value)) | Operand::Bool(value) => *value,
            Operand::Node(Value::Number(number)) => number.as_f64().is_some_and(|v| v != 0.0),
            Operand::Node(Value::String(text)) => !text.is_empty(),
            Operand::Node(Value::Array(items)) => !items.is_empty(),
            Operand::Node(Value::Object(map)) => !map.is_empty(),
            Operand::Integer(value) => *value != 0,
            Operand::Float(value) => *value != 0.0,
            Operand::Text(text) => !text.is_empty(),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Operand::Integer(value) => Some(*value as f64),
            Operand::Float(value) => Some(*value),
            Operand::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn into_sample(self) -> EvalResult<Sample> {
        match self.scalar()? {
            Operand::Integer(value) => Ok(Sample::Integer(value)),
            Operand::Float(value) => Ok(Sample::Float(value)),
            Operand::Bool(value) => Ok(Sample::Integer(value as i64)),
            Operand::Text(value) => Ok(Sample::Text(value)),
            other => Err(format!(
                "expression produced {}, expected a number or a string",
                other.kind()
            )),
        }
    }
}

fn index_into<'a>(base: Operand<'a>, index: Operand<'a>) -> EvalResult<Operand<'a>> {
    match (base, index) {
        (Operand::Node(Value::Array(items)), Operand::Integer(position)) => {
            let slot = usize::try_from(position)
                .map_err(|_| format!("negative index {} is not allowed", position))?;
            items.get(slot).map(Operand::Node).ok_or_else(|| {
                format!("index {} is out of range for a list of {}", position, items.len())
            })
        }
        (Operand::Node(Value::Object(map)), Operand::Text(key)) => map
            .get(&key)
            .map(Operand::Node)
            .ok_or_else(|| format!("no key '{}'", key)),
        (base, index) => Err(format!(
            "cannot index {} with {}",
            base.kind(),
            index.kind()
        )),
    }
}

fn binary<'a>(op: BinaryOp, lhs: Operand<'a>, rhs: Operand<'a>) -> EvalResult<Operand<'a>> {
    if let (Operand::Text(a), Operand::Text(b)) = (&lhs, &rhs) {
        return match op {
            BinaryOp::Eq => Ok(Operand::Bool(a == b)),
            BinaryOp::Ne => Ok(Operand::Bool(a != b)),
            _ => Err("strings only support '==' and '!='".to_string()),
        };
    }

    let integers = match (&lhs, &rhs) {
        (Operand::Integer(a), Operand::Integer(b)) => Some((*a, *b)),
        _ => None,
    };
    let (a, b) = match (lhs.number(), rhs.number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(format!(
                "cannot combine {} and {}",
                lhs.kind(),
                rhs.kind()
            ))
        }
    };

    let overflow = || "integer overflow".to_string();
    match op {
        BinaryOp::Add => match integers {
            Some((x, y)) => x.checked_add(y).map(Operand::Integer).ok_or_else(overflow),
            None => Ok(Operand::Float(a + b)),
        },
        BinaryOp::Sub => match integers {
            Some((x, y)) => x.checked_sub(y).map(Operand::Integer).ok_or_else(overflow),
            None => Ok(Operand::Float(a - b)),
        },
        BinaryOp::Mul => match integers {
            Some((x, y)) => x.checked_mul(y).map(Operand::Integer).ok_or_else(overflow),
            None => Ok(Operand::Float(a * b)),
        },
        BinaryOp::Div => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(Operand::Float(a / b))
            }
        }
        BinaryOp::Lt => Ok(Operand::Bool(a < b)),
        BinaryOp::Le => Ok(Operand::Bool(a <= b)),
        BinaryOp::Gt => Ok(Operand::Bool(a > b)),
        BinaryOp::Ge => Ok(Operand::Bool(a >= b)),
        BinaryOp::Eq => Ok(Operand::Bool(a == b)),
        BinaryOp::Ne => Ok(Operand::Bool(a != b)),
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit in eval"),
    }
}

/// Half-to-even rounding. One argument yields an integer, two keep the input's type.
///
/// Negative `digits` round to tens, hundreds and so on, for integers as well as floats.
fn round<'a>(value: Operand<'a>, digits: Option<i64>) -> EvalResult<Operand<'a>> {
    match (value, digits) {
        (Operand::Integer(value), None) => Ok(Operand::Integer(value)),
        (Operand::Integer(value), Some(digits)) if digits >= 0 => Ok(Operand::Integer(value)),
        (Operand::Integer(value), Some(digits)) => round_integer(value, digits.unsigned_abs()),
        (Operand::Float(value), None) => {
            let rounded = value.round_ties_even();
            if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
                Ok(Operand::Integer(rounded as i64))
            } else {
                Err(format!("cannot round {} to an integer", value))
            }
        }
        (Operand::Float(value), Some(digits)) => {
            if !value.is_finite() {
                return Err(format!("cannot round {}", value));
            }
            // Past these bounds f64 either has no digits left to drop or nothing survives.
            let digits = digits.clamp(-400, 400) as i32;
            let scale = 10f64.powi(digits);
            let scaled = value * scale;
            if scale == 0.0 {
                Ok(Operand::Float(0.0 * value.signum()))
            } else if !scaled.is_finite() {
                Ok(Operand::Float(value))
            } else {
                Ok(Operand::Float(scaled.round_ties_even() / scale))
            }
        }
        (other, _) => Err(format!("round() is not defined for {}", other.kind())),
    }
}

/// Rounds to the nearest multiple of `10^places`, ties to the even multiple.
fn round_integer<'a>(value: i64, places: u64) -> EvalResult<Operand<'a>> {
    let step = match u32::try_from(places).ok().and_then(|p| 10i128.checked_pow(p)) {
        Some(step) => step,
        // larger than any i64, so everything rounds to zero
        None => return Ok(Operand::Integer(0)),
    };
    let value = i128::from(value);
    let (quotient, remainder) = (value.div_euclid(step), value.rem_euclid(step));
    let up = remainder * 2 > step || (remainder * 2 == step && quotient % 2 != 0);
    let rounded = (if up { quotient + 1 } else { quotient }) * step;
    i64::try_from(rounded)
        .map(Operand::Integer)
        .map_err(|_| "integer overflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use serde_json::json;

    fn state() -> SimulationState {
        SimulationState {
            time: json!({"cal_year": 2020, "year": 1, "day": 2}),
            soil: json!({
                "Tsurf": 5.0,
                "p_act_annual": 812.34567,
                "soil_layers": [{"NO3": 1.5}, {"NO3": 2.5}]
            }),
            weather: json!({"rainfall": [[0.0, 3.25, 1.0]]}),
            animal_management: json!({
                "all_pens": [
                    {"id": 0, "pen_populated": false, "animals_in_pen": []},
                    {"id": 1, "pen_populated": true, "animals_in_pen": [1, 2], "ration": {"objective": 3.5}},
                    {"id": 2, "pen_populated": true, "animals_in_pen": [7, 8, 9], "ration": {"objective": 4.0}}
                ]
            }),
            ..Default::default()
        }
    }

    fn eval(ctx: &EvalContext<'_>, text: &str) -> EvalResult<Sample> {
        ctx.evaluate(&Expr::parse(text).unwrap())
    }

    #[test]
    fn reads_fields_and_layers() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert_eq!(eval(&ctx, "time.cal_year"), Ok(Sample::Integer(2020)));
        assert_eq!(eval(&ctx, "soil.Tsurf"), Ok(Sample::Float(5.0)));
        assert_eq!(eval(&ctx, "soil.soil_layers[1].NO3"), Ok(Sample::Float(2.5)));
        assert_eq!(
            eval(&ctx, "weather.rainfall[time.year - 1][time.day - 1]"),
            Ok(Sample::Float(3.25))
        );
    }

    #[test]
    fn missing_fields_fail_instead_of_defaulting() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert!(eval(&ctx, "soil.runoff").unwrap_err().contains("runoff"));
        assert!(eval(&ctx, "soil.soil_layers[3].NO3").is_err());
        assert!(eval(&ctx, "soil.soil_layers[-1].NO3").is_err());
        assert!(eval(&ctx, "soil.soil_layers").is_err());
        assert!(eval(&ctx, "pen.pen_populated").is_err());
    }

    #[test]
    fn pen_scope_reads_the_selected_pen() {
        let state = state();
        let ctx = EvalContext::for_pen(&state, 2).unwrap();
        assert_eq!(eval(&ctx, "len(pen.animals_in_pen)"), Ok(Sample::Integer(3)));
        assert_eq!(
            eval(&ctx, "pen.ration['objective'] if pen.pen_populated else 0"),
            Ok(Sample::Float(4.0))
        );
    }

    #[test]
    fn pen_scope_rejects_missing_pen() {
        let state = state();
        assert!(matches!(
            EvalContext::for_pen(&state, 5),
            Err(ReportError::PenOutOfRange { pen_id: 5, pen_count: 3 })
        ));
    }

    #[test]
    fn conditional_skips_untaken_branch() {
        let state = state();
        let ctx = EvalContext::for_pen(&state, 0).unwrap();
        // pen 0 has no ration; the else branch must be taken without touching it
        assert_eq!(
            eval(&ctx, "pen.ration['objective'] if pen.pen_populated else 0"),
            Ok(Sample::Integer(0))
        );
    }

    #[test]
    fn round_follows_half_to_even() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert_eq!(eval(&ctx, "round(soil.p_act_annual, 3)"), Ok(Sample::Float(812.346)));
        assert_eq!(eval(&ctx, "round(2.5)"), Ok(Sample::Integer(2)));
        assert_eq!(eval(&ctx, "round(3.5)"), Ok(Sample::Integer(4)));
    }

    #[test]
    fn negative_digits_round_to_tens_and_hundreds() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert_eq!(eval(&ctx, "round(1234, -2)"), Ok(Sample::Integer(1200)));
        assert_eq!(eval(&ctx, "round(1250, -2)"), Ok(Sample::Integer(1200)));
        assert_eq!(eval(&ctx, "round(1350, -2)"), Ok(Sample::Integer(1400)));
        assert_eq!(eval(&ctx, "round(-1250, -2)"), Ok(Sample::Integer(-1200)));
        assert_eq!(eval(&ctx, "round(1234, -40)"), Ok(Sample::Integer(0)));
        assert_eq!(eval(&ctx, "round(1250.0, -2)"), Ok(Sample::Float(1200.0)));
    }

    #[test]
    fn extreme_digits_never_produce_nan() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert_eq!(
            eval(&ctx, "round(soil.p_act_annual, 400)"),
            Ok(Sample::Float(812.34567))
        );
        assert_eq!(eval(&ctx, "round(soil.p_act_annual, -400)"), Ok(Sample::Float(0.0)));
        assert_eq!(eval(&ctx, "round(0.0, 999999)"), Ok(Sample::Float(0.0)));
    }

    #[test]
    fn call_without_arguments_is_an_error() {
        let state = state();
        let ctx = EvalContext::new(&state);
        for builtin in [Builtin::Len, Builtin::Round] {
            let err = ctx.evaluate(&Expr::Call(builtin, Vec::new())).unwrap_err();
            assert!(err.contains("argument"));
        }
    }

    #[test]
    fn arithmetic_keeps_integers_until_division() {
        let state = state();
        let ctx = EvalContext::new(&state);
        assert_eq!(eval(&ctx, "time.day * 2 + 1"), Ok(Sample::Integer(5)));
        assert_eq!(eval(&ctx, "time.day / 4"), Ok(Sample::Float(0.5)));
        assert!(eval(&ctx, "time.day / 0").is_err());
        assert_eq!(eval(&ctx, "time.day > 1 and not False"), Ok(Sample::Integer(1)));
    }

    #[test]
    fn samples_render_as_decimal_text() {
        assert_eq!(Sample::Integer(2020).to_string(), "2020");
        assert_eq!(Sample::Float(5.0).to_string(), "5.0");
        assert_eq!(Sample::Float(6.5).to_string(), "6.5");
        assert_eq!(Sample::Text("corn".to_string()).to_string(), "corn");
    }
}
