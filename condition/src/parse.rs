//! Best-effort parsing of formalized conditions into expression trees.
//!
//! The grammar is the formalization stage's output language: atomic
//! comparisons joined by `AND`/`OR`/`NOT`, parentheses, `IF..THEN..ELSE`,
//! `IS [NOT] NULL`, `[NOT] IN (..)`, and `BETWEEN .. AND ..`. Parsing is
//! total: a fragment that fits nothing yields `None` rather than an error.

use crate::expr::{CompareOp, Comparison, ConditionExpr, FieldRef, Operand};
use crate::extract::extract_comparisons;

/// Parse a condition string into an expression tree, best effort.
pub fn parse_condition(condition: &str) -> Option<ConditionExpr> {
    let trimmed = condition.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_expr(trimmed)
}

fn parse_expr(input: &str) -> Option<ConditionExpr> {
    let input = strip_outer_parens(input.trim());

    if let Some(expr) = parse_if_then_else(input) {
        return Some(expr);
    }

    // OR binds loosest, then AND.
    let or_parts = split_top_level(input, "OR");
    if or_parts.len() > 1 {
        let parsed: Vec<_> = or_parts.iter().filter_map(|p| parse_expr(p)).collect();
        return non_empty_connective(parsed, ConditionExpr::Or);
    }

    let and_parts = split_top_level(input, "AND");
    if and_parts.len() > 1 {
        let parsed: Vec<_> = and_parts.iter().filter_map(|p| parse_expr(p)).collect();
        return non_empty_connective(parsed, ConditionExpr::And);
    }

    if let Some(rest) = strip_keyword_prefix(input, "NOT") {
        return parse_expr(rest).map(|e| ConditionExpr::Not(Box::new(e)));
    }

    parse_atom(input)
}

fn non_empty_connective(
    parts: Vec<ConditionExpr>,
    build: fn(Vec<ConditionExpr>) -> ConditionExpr,
) -> Option<ConditionExpr> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(build(parts)),
    }
}

fn parse_if_then_else(input: &str) -> Option<ConditionExpr> {
    let rest = strip_keyword_prefix(input, "IF")?;
    let then_pos = find_top_level_keyword(rest, "THEN")?;
    let cond = parse_expr(&rest[..then_pos])?;
    let after_then = &rest[then_pos + "THEN".len()..];
    let (then_part, else_part) = match find_top_level_keyword(after_then, "ELSE") {
        Some(else_pos) => (
            &after_then[..else_pos],
            Some(&after_then[else_pos + "ELSE".len()..]),
        ),
        None => (after_then, None),
    };
    let then = parse_expr(then_part)?;
    let otherwise = match else_part {
        Some(e) => Some(Box::new(parse_expr(e)?)),
        None => None,
    };
    Some(ConditionExpr::IfThenElse {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise,
    })
}

fn parse_atom(input: &str) -> Option<ConditionExpr> {
    let input = input.trim();

    if let Some(expr) = parse_is_null(input) {
        return Some(expr);
    }
    if let Some(expr) = parse_in_set(input) {
        return Some(expr);
    }
    if let Some(expr) = parse_between(input) {
        return Some(expr);
    }

    extract_comparisons(input)
        .into_iter()
        .next()
        .map(ConditionExpr::Comparison)
}

fn parse_is_null(input: &str) -> Option<ConditionExpr> {
    let upper = input.to_ascii_uppercase();
    let (negated, field_part) = if let Some(pos) = upper.find(" IS NOT NULL") {
        (true, &input[..pos])
    } else if let Some(pos) = upper.find(" IS NULL") {
        (false, &input[..pos])
    } else {
        return None;
    };
    let field = FieldRef::parse(field_part.trim())?;
    Some(ConditionExpr::IsNull { field, negated })
}

fn parse_in_set(input: &str) -> Option<ConditionExpr> {
    let upper = input.to_ascii_uppercase();
    let (negated, in_pos, kw_len) = if let Some(pos) = upper.find(" NOT IN ") {
        (true, pos, " NOT IN ".len())
    } else if let Some(pos) = upper.find(" IN ") {
        (false, pos, " IN ".len())
    } else {
        return None;
    };
    let field = FieldRef::parse(input[..in_pos].trim())?;
    let list = input[in_pos + kw_len..].trim();
    let list = list.strip_prefix('(')?.strip_suffix(')')?;
    let values: Vec<String> = list
        .split(',')
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(ConditionExpr::InSet {
        field,
        values,
        negated,
    })
}

fn parse_between(input: &str) -> Option<ConditionExpr> {
    let upper = input.to_ascii_uppercase();
    let between_pos = upper.find(" BETWEEN ")?;
    let field = FieldRef::parse(input[..between_pos].trim())?;
    let bounds = &input[between_pos + " BETWEEN ".len()..];
    let and_pos = bounds.to_ascii_uppercase().find(" AND ")?;
    let lo: f64 = bounds[..and_pos].trim().parse().ok()?;
    let hi: f64 = bounds[and_pos + " AND ".len()..].trim().parse().ok()?;
    Some(ConditionExpr::Between { field, lo, hi })
}

/// Split on a keyword at paren depth zero, outside quotes. An `AND`
/// that completes a pending `BETWEEN` is part of that atom, not a
/// connective, and is skipped.
fn split_top_level<'a>(input: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut pending_between = 0usize;
    for (pos, word) in top_level_words(input) {
        let upper = word.to_ascii_uppercase();
        if upper == "BETWEEN" {
            pending_between += 1;
            continue;
        }
        if upper == "AND" && pending_between > 0 {
            pending_between -= 1;
            continue;
        }
        if upper == keyword {
            parts.push(&input[start..pos]);
            start = pos + word.len();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn find_top_level_keyword(input: &str, keyword: &str) -> Option<usize> {
    top_level_words(input)
        .into_iter()
        .find(|(_, w)| w.eq_ignore_ascii_case(keyword))
        .map(|(pos, _)| pos)
}

/// Words at paren depth zero and outside quotes, with byte offsets.
fn top_level_words(input: &str) -> Vec<(usize, &str)> {
    let bytes = input.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut word_start: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => {
                quote = Some(b);
                word_start = None;
            }
            b'(' => {
                depth += 1;
                word_start = None;
            }
            b')' => {
                depth -= 1;
                word_start = None;
            }
            _ if b.is_ascii_alphanumeric() || b == b'_' => {
                if depth == 0 && word_start.is_none() {
                    word_start = Some(i);
                }
            }
            _ => {
                if let Some(start) = word_start.take() {
                    if depth == 0 {
                        words.push((start, &input[start..i]));
                    }
                }
            }
        }
    }
    if let Some(start) = word_start {
        if depth == 0 {
            words.push((start, &input[start..]));
        }
    }
    words
}

fn strip_keyword_prefix<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = input
        .get(..keyword.len())
        .filter(|p| p.eq_ignore_ascii_case(keyword))
        .map(|_| &input[keyword.len()..])?;
    // Must be a word boundary, not a prefix of an identifier.
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '(' => Some(rest),
        _ => None,
    }
}

/// Strip one level of enclosing parentheses when they match.
fn strip_outer_parens(input: &str) -> &str {
    let trimmed = input.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return trimmed;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut depth = 0i32;
    for b in inner.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return trimmed;
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        strip_outer_parens(inner)
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(form: &str, field: &str, op: CompareOp, value: f64) -> ConditionExpr {
        ConditionExpr::Comparison(Comparison::new(
            Operand::Field(FieldRef::new(form, field)),
            op,
            Operand::Number(value),
        ))
    }

    #[test]
    fn test_single_comparison() {
        let expr = parse_condition("Demographics.Age >= 18").unwrap();
        assert_eq!(expr, cmp("Demographics", "Age", CompareOp::Ge, 18.0));
    }

    #[test]
    fn test_and_or_precedence() {
        let expr = parse_condition("A.X > 1 AND A.Y < 2 OR A.Z = 3").unwrap();
        match expr {
            ConditionExpr::Or(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], ConditionExpr::And(_)));
                assert_eq!(parts[1], cmp("A", "Z", CompareOp::Eq, 3.0));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_group() {
        let expr = parse_condition("(A.X > 1 OR A.Y < 2) AND A.Z = 3").unwrap();
        match expr {
            ConditionExpr::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], ConditionExpr::Or(_)));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_not() {
        let expr = parse_condition("NOT A.X > 1").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Not(Box::new(cmp("A", "X", CompareOp::Gt, 1.0)))
        );
    }

    #[test]
    fn test_if_then_else() {
        let expr =
            parse_condition("IF Demographics.Age >= 65 THEN Labs.Creatinine <= 1.5 ELSE Labs.Creatinine <= 2.0")
                .unwrap();
        match expr {
            ConditionExpr::IfThenElse {
                cond, otherwise, ..
            } => {
                assert_eq!(*cond, cmp("Demographics", "Age", CompareOp::Ge, 65.0));
                assert!(otherwise.is_some());
            }
            other => panic!("expected IfThenElse, got {:?}", other),
        }
    }

    #[test]
    fn test_is_null() {
        let expr = parse_condition("AdverseEvents.EndDate IS NOT NULL").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::IsNull {
                field: FieldRef::new("AdverseEvents", "EndDate"),
                negated: true,
            }
        );
    }

    #[test]
    fn test_in_set() {
        let expr = parse_condition("Demographics.Sex IN (\"Male\", \"Female\")").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::InSet {
                field: FieldRef::new("Demographics", "Sex"),
                values: vec!["Male".into(), "Female".into()],
                negated: false,
            }
        );
    }

    #[test]
    fn test_between_keeps_its_and() {
        let expr = parse_condition("VitalSigns.HeartRate BETWEEN 40 AND 120").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Between {
                field: FieldRef::new("VitalSigns", "HeartRate"),
                lo: 40.0,
                hi: 120.0,
            }
        );

        // A BETWEEN atom conjoined with a comparison still splits right.
        let expr =
            parse_condition("VitalSigns.HeartRate BETWEEN 40 AND 120 AND Demographics.Age >= 18")
                .unwrap();
        match expr {
            ConditionExpr::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_returns_none() {
        assert_eq!(parse_condition(""), None);
        assert_eq!(parse_condition("the subject seems unwell"), None);
    }
}
