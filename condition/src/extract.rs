//! Regex-based extraction of field references and atomic comparisons.

use crate::expr::{CompareOp, Comparison, FieldRef, Operand};
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn field_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

fn comparison_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Operator alternation is ordered longest-first so `<=` never
    // lexes as `<` followed by a stray `=`.
    RE.get_or_init(|| {
        Regex::new(
            r#"([A-Za-z0-9_.]+)\s*(<=|>=|!=|<>|==|=|<|>)\s*("[^"]*"|'[^']*'|[A-Za-z0-9_.\-]+)"#,
        )
        .unwrap()
    })
}

/// Extract the set of `Form.Field` references mentioned in a condition.
///
/// Total: unparseable fragments are simply not reported.
pub fn extract_field_references(condition: &str) -> BTreeSet<FieldRef> {
    let mut refs = BTreeSet::new();
    for caps in field_ref_re().captures_iter(condition) {
        let token = format!("{}.{}", &caps[1], &caps[2]);
        if let Some(field_ref) = FieldRef::parse(&token) {
            refs.insert(field_ref);
        }
    }
    refs
}

/// Extract the atomic comparisons appearing in a condition, in order.
///
/// Boolean structure is not recovered here; callers that need only the
/// atoms combine them conjunctively as an approximation.
pub fn extract_comparisons(condition: &str) -> Vec<Comparison> {
    let mut comparisons = Vec::new();
    for caps in comparison_re().captures_iter(condition) {
        let Some(op) = CompareOp::parse(&caps[2]) else {
            continue;
        };
        let lhs = Operand::parse(&caps[1]);
        let rhs = Operand::parse(&caps[3]);
        // At least one side must be a field reference for the atom to
        // say anything about the data.
        if lhs.as_field().is_none() && rhs.as_field().is_none() {
            continue;
        }
        comparisons.push(Comparison::new(lhs, op, rhs));
    }
    comparisons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_field_references() {
        let refs = extract_field_references(
            "VitalSigns.SystolicBP <= VitalSigns.DiastolicBP AND Demographics.Age >= 18",
        );
        assert_eq!(refs.len(), 3);
        assert!(refs.contains(&FieldRef::new("VitalSigns", "SystolicBP")));
        assert!(refs.contains(&FieldRef::new("Demographics", "Age")));
    }

    #[test]
    fn test_numeric_literals_are_not_references() {
        let refs = extract_field_references("Labs.Glucose > 3.5");
        assert_eq!(refs.len(), 1);
        assert!(refs.contains(&FieldRef::new("Labs", "Glucose")));
    }

    #[test]
    fn test_extract_comparisons() {
        let cmps = extract_comparisons("Demographics.Age >= 18 AND Labs.Glucose < 7.8");
        assert_eq!(cmps.len(), 2);
        assert_eq!(cmps[0].op, CompareOp::Ge);
        assert_eq!(cmps[0].rhs, Operand::Number(18.0));
        assert_eq!(cmps[1].op, CompareOp::Lt);
    }

    #[test]
    fn test_extract_field_to_field_comparison() {
        let cmps = extract_comparisons("VitalSigns.SystolicBP <= VitalSigns.DiastolicBP");
        assert_eq!(cmps.len(), 1);
        assert_eq!(cmps[0].op, CompareOp::Le);
        assert!(cmps[0].lhs.as_field().is_some());
        assert!(cmps[0].rhs.as_field().is_some());
    }

    #[test]
    fn test_quoted_literals() {
        let cmps = extract_comparisons("Demographics.Sex = \"Male\"");
        assert_eq!(cmps.len(), 1);
        assert_eq!(cmps[0].rhs, Operand::Text("Male".into()));
    }

    #[test]
    fn test_unparseable_fragments_are_omitted() {
        assert!(extract_comparisons("the weight looks wrong").is_empty());
        assert!(extract_field_references("no references here").is_empty());
        // A literal-only comparison carries no field information.
        assert!(extract_comparisons("1 = 1").is_empty());
    }
}
