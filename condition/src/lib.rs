//! EDCHECK Condition Model
//!
//! One shared view of "what does this rule's condition say", consumed by
//! every downstream component instead of per-module regex parsing.
//!
//! Responsibilities:
//! - Extract `Form.Field` references and atomic comparisons
//! - Parse conditions into a typed expression tree (best effort)
//! - Directly evaluate a parsed condition against test data
//!
//! Extraction is side-effect-free and total: unparseable fragments are
//! omitted from results, never raised as errors.

mod eval;
mod expr;
mod extract;
mod parse;

pub use eval::evaluate;
pub use expr::{CompareOp, Comparison, ConditionExpr, FieldRef, Operand};
pub use extract::{extract_comparisons, extract_field_references};
pub use parse::parse_condition;
