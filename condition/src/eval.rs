//! Direct evaluation of a parsed condition against test data.
//!
//! This is the sandboxed evaluator used by multi-modal verification: a
//! tree walk over [`ConditionExpr`], never a general-purpose eval.
//!
//! Missing-data semantics fail closed: a comparison touching a missing
//! field or a null value is false, `IS NULL` on a missing field is true,
//! and a numeric comparison against non-numeric data is false.

use crate::expr::{CompareOp, Comparison, ConditionExpr, FieldRef, Operand};
use edcheck_core::{TestData, Value};

/// Evaluate a condition tree against test data.
///
/// Returns `None` when no definite truth value can be established
/// (e.g. a connective whose decided members do not settle the result).
pub fn evaluate(expr: &ConditionExpr, data: &TestData) -> Option<bool> {
    match expr {
        ConditionExpr::Comparison(cmp) => Some(eval_comparison(cmp, data)),
        ConditionExpr::And(parts) => {
            let mut all_known = true;
            for part in parts {
                match evaluate(part, data) {
                    Some(false) => return Some(false),
                    Some(true) => {}
                    None => all_known = false,
                }
            }
            if all_known {
                Some(true)
            } else {
                None
            }
        }
        ConditionExpr::Or(parts) => {
            let mut all_known = true;
            for part in parts {
                match evaluate(part, data) {
                    Some(true) => return Some(true),
                    Some(false) => {}
                    None => all_known = false,
                }
            }
            if all_known {
                Some(false)
            } else {
                None
            }
        }
        ConditionExpr::Not(inner) => evaluate(inner, data).map(|b| !b),
        ConditionExpr::IfThenElse {
            cond,
            then,
            otherwise,
        } => match evaluate(cond, data)? {
            true => evaluate(then, data),
            false => match otherwise {
                Some(e) => evaluate(e, data),
                // IF without ELSE is a material implication.
                None => Some(true),
            },
        },
        ConditionExpr::IsNull { field, negated } => {
            let missing = matches!(lookup(field, data), None | Some(Value::Null));
            Some(missing != *negated)
        }
        ConditionExpr::InSet {
            field,
            values,
            negated,
        } => {
            let contained = match lookup(field, data) {
                Some(Value::String(s)) => values.iter().any(|v| v == s),
                Some(Value::Int(i)) => values.iter().any(|v| v == &i.to_string()),
                Some(Value::Float(f)) => values.iter().any(|v| v == &f.to_string()),
                _ => return Some(false),
            };
            Some(contained != *negated)
        }
        ConditionExpr::Between { field, lo, hi } => {
            let n = lookup(field, data).and_then(numeric_view);
            Some(n.map(|n| n >= *lo && n <= *hi).unwrap_or(false))
        }
    }
}

fn lookup<'d>(field: &FieldRef, data: &'d TestData) -> Option<&'d Value> {
    data.get(&field.form)?.get(&field.field)
}

/// Numeric view of a value: numbers as themselves, dates as epoch days.
fn numeric_view(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Date(d) => Some(*d as f64),
        _ => None,
    }
}

fn eval_comparison(cmp: &Comparison, data: &TestData) -> bool {
    let lhs = resolve(&cmp.lhs, data);
    let rhs = resolve(&cmp.rhs, data);
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return false;
    };
    compare_values(&lhs, cmp.op, &rhs)
}

/// Resolve an operand to a concrete value. Field lookups that miss, or
/// hit a null, resolve to `None`.
fn resolve(operand: &Operand, data: &TestData) -> Option<Value> {
    match operand {
        Operand::Field(field) => match lookup(field, data) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        },
        Operand::Number(n) => Some(Value::Float(*n)),
        Operand::Text(s) => Some(Value::String(s.clone())),
        Operand::Flag(b) => Some(Value::Bool(*b)),
    }
}

fn compare_values(lhs: &Value, op: CompareOp, rhs: &Value) -> bool {
    // Numeric and date values compare on the number line; an ISO date
    // string facing a date value is promoted to epoch days.
    if let (Some(l), Some(r)) = (comparable_number(lhs, rhs), comparable_number(rhs, lhs)) {
        return op.holds_f64(l, r);
    }
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            // Ordered operators are undefined on free text.
            _ => false,
        },
        (Value::Bool(l), Value::Bool(r)) => match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            _ => false,
        },
        // Type confusion fails closed.
        _ => false,
    }
}

/// Numeric view of `value`, allowing an ISO date string when the other
/// side is a date.
fn comparable_number(value: &Value, other: &Value) -> Option<f64> {
    if let Some(n) = numeric_view(value) {
        return Some(n);
    }
    if other.is_date() {
        if let Value::String(s) = value {
            return Value::date_from_iso(s).and_then(|v| numeric_view(&v));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_condition;
    use edcheck_core::single_value;

    fn data_with(entries: &[(&str, &str, Value)]) -> TestData {
        let mut data = TestData::new();
        for (form, field, value) in entries {
            data.entry(form.to_string())
                .or_default()
                .insert(field.to_string(), value.clone());
        }
        data
    }

    #[test]
    fn test_numeric_comparison() {
        let expr = parse_condition("Demographics.Age >= 18").unwrap();
        let adult = single_value("Demographics", "Age", Value::Int(30));
        let minor = single_value("Demographics", "Age", Value::Int(12));
        assert_eq!(evaluate(&expr, &adult), Some(true));
        assert_eq!(evaluate(&expr, &minor), Some(false));
    }

    #[test]
    fn test_field_to_field_comparison() {
        let expr = parse_condition("VitalSigns.SystolicBP <= VitalSigns.DiastolicBP").unwrap();
        let inverted = data_with(&[
            ("VitalSigns", "SystolicBP", Value::Int(70)),
            ("VitalSigns", "DiastolicBP", Value::Int(90)),
        ]);
        let normal = data_with(&[
            ("VitalSigns", "SystolicBP", Value::Int(120)),
            ("VitalSigns", "DiastolicBP", Value::Int(80)),
        ]);
        assert_eq!(evaluate(&expr, &inverted), Some(true));
        assert_eq!(evaluate(&expr, &normal), Some(false));
    }

    #[test]
    fn test_missing_field_fails_closed() {
        let expr = parse_condition("Demographics.Age >= 18").unwrap();
        let empty = TestData::new();
        assert_eq!(evaluate(&expr, &empty), Some(false));

        let null = single_value("Demographics", "Age", Value::Null);
        assert_eq!(evaluate(&expr, &null), Some(false));
    }

    #[test]
    fn test_type_confusion_fails_closed() {
        let expr = parse_condition("Demographics.Age >= 18").unwrap();
        let confused = single_value("Demographics", "Age", Value::String("not_a_number".into()));
        assert_eq!(evaluate(&expr, &confused), Some(false));
    }

    #[test]
    fn test_is_null() {
        let expr = parse_condition("AdverseEvents.EndDate IS NULL").unwrap();
        assert_eq!(evaluate(&expr, &TestData::new()), Some(true));

        let with_date = single_value("AdverseEvents", "EndDate", Value::Date(19_000));
        assert_eq!(evaluate(&expr, &with_date), Some(false));
    }

    #[test]
    fn test_date_comparison() {
        let expr = parse_condition("Visit.EndDate >= Visit.StartDate").unwrap();
        let ok = data_with(&[
            ("Visit", "StartDate", Value::date_from_iso("2024-01-10").unwrap()),
            ("Visit", "EndDate", Value::date_from_iso("2024-01-12").unwrap()),
        ]);
        let bad = data_with(&[
            ("Visit", "StartDate", Value::date_from_iso("2024-01-10").unwrap()),
            ("Visit", "EndDate", Value::date_from_iso("2024-01-02").unwrap()),
        ]);
        assert_eq!(evaluate(&expr, &ok), Some(true));
        assert_eq!(evaluate(&expr, &bad), Some(false));
    }

    #[test]
    fn test_connectives_and_if_then() {
        let expr = parse_condition("Demographics.Age >= 18 AND Demographics.Sex = \"Male\"").unwrap();
        let both = data_with(&[
            ("Demographics", "Age", Value::Int(40)),
            ("Demographics", "Sex", Value::String("Male".into())),
        ]);
        let one = data_with(&[
            ("Demographics", "Age", Value::Int(40)),
            ("Demographics", "Sex", Value::String("Female".into())),
        ]);
        assert_eq!(evaluate(&expr, &both), Some(true));
        assert_eq!(evaluate(&expr, &one), Some(false));

        let cond = parse_condition("IF Demographics.Age >= 65 THEN Labs.Creatinine <= 1.5").unwrap();
        let young = single_value("Demographics", "Age", Value::Int(30));
        assert_eq!(evaluate(&cond, &young), Some(true));
    }

    #[test]
    fn test_between_and_in_set() {
        let between = parse_condition("VitalSigns.HeartRate BETWEEN 40 AND 120").unwrap();
        let hr = single_value("VitalSigns", "HeartRate", Value::Int(72));
        assert_eq!(evaluate(&between, &hr), Some(true));
        let hr = single_value("VitalSigns", "HeartRate", Value::Int(200));
        assert_eq!(evaluate(&between, &hr), Some(false));

        let in_set = parse_condition("Demographics.Sex IN (\"Male\", \"Female\")").unwrap();
        let sex = single_value("Demographics", "Sex", Value::String("Male".into()));
        assert_eq!(evaluate(&in_set, &sex), Some(true));
        let sex = single_value("Demographics", "Sex", Value::String("Other".into()));
        assert_eq!(evaluate(&in_set, &sex), Some(false));
    }
}
