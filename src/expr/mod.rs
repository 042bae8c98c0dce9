// src/expr/mod.rs

//! The binding expression language.
//!
//! A deliberately small language: field access, indexing, arithmetic,
//! comparisons, `a if cond else b`, and the builtins `len` and `round`.
//! Expressions are parsed once when a report is built and evaluated every
//! time the report samples.

pub mod eval;
pub mod parser;

pub use eval::{EvalContext, Sample};
pub use parser::Expr;
