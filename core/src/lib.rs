//! EDCHECK Core
//!
//! Shared data model for the edit-check rule engine.
//!
//! Responsibilities:
//! - Field values and the clinical field type system
//! - Study specifications (forms and their fields)
//! - Edit-check rules and their severities
//! - Generated test cases and their technique tags
//! - Validation results with typed findings

mod error;
mod result;
mod rule;
mod spec;
mod testcase;
mod value;

pub use error::{CoreError, CoreResult};
pub use result::{Finding, FindingKind, ValidationResult};
pub use rule::{Rule, RuleSeverity};
pub use spec::{Field, FieldType, Form, Specification};
pub use testcase::{single_value, Technique, TestCase, TestData};
pub use value::{days_from_civil, iso_from_days, Value};
