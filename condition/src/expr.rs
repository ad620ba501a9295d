//! Typed condition expression tree.

use std::fmt;

/// A `Form.Field` reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    pub form: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(form: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            field: field.into(),
        }
    }

    /// Parse a dotted `Form.Field` token.
    pub fn parse(token: &str) -> Option<Self> {
        let (form, field) = token.split_once('.')?;
        if form.is_empty() || field.is_empty() {
            return None;
        }
        // Pure numeric tokens like "3.14" are literals, not references.
        if form.chars().all(|c| c.is_ascii_digit()) && field.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(form, field))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.form, self.field)
    }
}

/// The six comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Parse an operator token. Accepts SQL-style `<>` for inequality.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" | "==" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    /// Logical negation: `NOT (a < b)` is `a >= b`.
    pub fn negate(&self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    /// Algebraic inverse for swapped operands: `a < b` is `b > a`.
    pub fn inverse(&self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }

    /// Apply the operator to an ordering of two f64 values.
    pub fn holds_f64(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }

    /// True when the operator accepts exact equality (`=`, `<=`, `>=`).
    pub fn is_inclusive(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Le | CompareOp::Ge)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(token)
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldRef),
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Operand {
    /// Parse an operand token: quoted string, number, boolean, or
    /// `Form.Field` reference. Bare words fall back to text.
    pub fn parse(token: &str) -> Operand {
        let token = token.trim();
        if (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
            || (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
        {
            return Operand::Text(token[1..token.len() - 1].to_string());
        }
        if let Ok(n) = token.parse::<f64>() {
            return Operand::Number(n);
        }
        match token.to_ascii_lowercase().as_str() {
            "true" => return Operand::Flag(true),
            "false" => return Operand::Flag(false),
            _ => {}
        }
        if let Some(field_ref) = FieldRef::parse(token) {
            return Operand::Field(field_ref);
        }
        Operand::Text(token.to_string())
    }

    pub fn as_field(&self) -> Option<&FieldRef> {
        match self {
            Operand::Field(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(r) => write!(f, "{}", r),
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Text(s) => write!(f, "\"{}\"", s),
            Operand::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// An atomic comparison `lhs op rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: Operand,
    pub op: CompareOp,
    pub rhs: Operand,
}

impl Comparison {
    pub fn new(lhs: Operand, op: CompareOp, rhs: Operand) -> Self {
        Self { lhs, op, rhs }
    }

    /// Field references on either side.
    pub fn field_refs(&self) -> impl Iterator<Item = &FieldRef> {
        self.lhs.as_field().into_iter().chain(self.rhs.as_field())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// A parsed rule condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    Comparison(Comparison),
    And(Vec<ConditionExpr>),
    Or(Vec<ConditionExpr>),
    Not(Box<ConditionExpr>),
    IfThenElse {
        cond: Box<ConditionExpr>,
        then: Box<ConditionExpr>,
        otherwise: Option<Box<ConditionExpr>>,
    },
    IsNull {
        field: FieldRef,
        negated: bool,
    },
    InSet {
        field: FieldRef,
        values: Vec<String>,
        negated: bool,
    },
    Between {
        field: FieldRef,
        lo: f64,
        hi: f64,
    },
}

impl ConditionExpr {
    /// All field references mentioned anywhere in the tree.
    pub fn field_refs(&self) -> Vec<FieldRef> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs.dedup();
        refs
    }

    fn collect_refs(&self, out: &mut Vec<FieldRef>) {
        match self {
            ConditionExpr::Comparison(cmp) => {
                out.extend(cmp.field_refs().cloned());
            }
            ConditionExpr::And(parts) | ConditionExpr::Or(parts) => {
                for part in parts {
                    part.collect_refs(out);
                }
            }
            ConditionExpr::Not(inner) => inner.collect_refs(out),
            ConditionExpr::IfThenElse {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_refs(out);
                then.collect_refs(out);
                if let Some(e) = otherwise {
                    e.collect_refs(out);
                }
            }
            ConditionExpr::IsNull { field, .. }
            | ConditionExpr::InSet { field, .. }
            | ConditionExpr::Between { field, .. } => out.push(field.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ref_parse() {
        let r = FieldRef::parse("VitalSigns.SystolicBP").unwrap();
        assert_eq!(r.form, "VitalSigns");
        assert_eq!(r.field, "SystolicBP");
        assert_eq!(r.to_string(), "VitalSigns.SystolicBP");

        assert_eq!(FieldRef::parse("3.14"), None);
        assert_eq!(FieldRef::parse("noDot"), None);
    }

    #[test]
    fn test_op_algebra() {
        assert_eq!(CompareOp::parse("<>"), Some(CompareOp::Ne));
        assert_eq!(CompareOp::Lt.negate(), CompareOp::Ge);
        assert_eq!(CompareOp::Lt.inverse(), CompareOp::Gt);
        assert_eq!(CompareOp::Eq.inverse(), CompareOp::Eq);
        assert!(CompareOp::Ge.is_inclusive());
        assert!(!CompareOp::Gt.is_inclusive());
        assert!(CompareOp::Le.holds_f64(2.0, 2.0));
        assert!(!CompareOp::Lt.holds_f64(2.0, 2.0));
    }

    #[test]
    fn test_operand_parse() {
        assert_eq!(Operand::parse("18"), Operand::Number(18.0));
        assert_eq!(Operand::parse("\"Male\""), Operand::Text("Male".into()));
        assert_eq!(Operand::parse("true"), Operand::Flag(true));
        assert_eq!(
            Operand::parse("Demographics.Age"),
            Operand::Field(FieldRef::new("Demographics", "Age"))
        );
        assert_eq!(Operand::parse("Unknown"), Operand::Text("Unknown".into()));
    }

    #[test]
    fn test_expr_field_refs() {
        let expr = ConditionExpr::And(vec![
            ConditionExpr::Comparison(Comparison::new(
                Operand::Field(FieldRef::new("A", "X")),
                CompareOp::Gt,
                Operand::Number(1.0),
            )),
            ConditionExpr::IsNull {
                field: FieldRef::new("B", "Y"),
                negated: true,
            },
        ]);
        let refs = expr.field_refs();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&FieldRef::new("A", "X")));
        assert!(refs.contains(&FieldRef::new("B", "Y")));
    }
}
