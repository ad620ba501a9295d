//! Study specifications: forms and their fields.

use crate::error::{CoreError, CoreResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic type of a study field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Numeric,
    Date,
    DateTime,
    Time,
    Categorical,
    Boolean,
    Text,
}

impl FieldType {
    /// Lenient alias mapping used by upstream parsers. Unknown aliases
    /// fall back to `Text`.
    pub fn from_alias(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "number" | "numeric" | "integer" | "float" | "double" | "decimal" => {
                FieldType::Numeric
            }
            "date" => FieldType::Date,
            "datetime" | "timestamp" => FieldType::DateTime,
            "time" => FieldType::Time,
            "categorical" | "category" | "enum" | "enumeration" | "codelist" => {
                FieldType::Categorical
            }
            "boolean" | "bool" | "logical" | "yes/no" => FieldType::Boolean,
            _ => FieldType::Text,
        }
    }

    /// Returns true for date-like types (date, datetime, time).
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime | FieldType::Time)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Categorical => "categorical",
            FieldType::Boolean => "boolean",
            FieldType::Text => "text",
        };
        f.write_str(name)
    }
}

/// A field in a study form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub label: Option<String>,
    pub required: bool,
    /// Valid values for categorical fields.
    pub valid_values: Option<Vec<String>>,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
}

impl Field {
    /// Create a field with just a name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            required: false,
            valid_values: None,
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_valid_values(mut self, values: Vec<String>) -> Self {
        self.valid_values = Some(values);
        self
    }

    pub fn with_range(mut self, min: Value, max: Value) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }
}

/// A form in a study specification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Form {
    pub name: String,
    pub label: Option<String>,
    /// Ordered field list. Field names are unique within a form.
    pub fields: Vec<Field>,
}

impl Form {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            fields: Vec::new(),
        }
    }

    /// Add a field, replacing any existing field with the same name.
    pub fn add_field(&mut self, field: Field) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.add_field(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A study specification: a mapping from form name to form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Specification {
    pub forms: BTreeMap<String, Form>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a form, replacing any existing form with the same name.
    pub fn add_form(&mut self, form: Form) {
        self.forms.insert(form.name.clone(), form);
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.add_form(form);
        self
    }

    /// Look up a field by form name and field name.
    pub fn get_field(&self, form_name: &str, field_name: &str) -> Option<&Field> {
        self.forms.get(form_name)?.get_field(field_name)
    }

    /// Look up a field, erroring when form or field is absent.
    pub fn require_field(&self, form_name: &str, field_name: &str) -> CoreResult<&Field> {
        let form = self
            .forms
            .get(form_name)
            .ok_or_else(|| CoreError::unknown_form(form_name))?;
        form.get_field(field_name)
            .ok_or_else(|| CoreError::unknown_field(form_name, field_name))
    }

    /// Field type for a reference, falling back to `Text` when the
    /// field is not declared (the upstream parser's convention).
    pub fn field_type_or_text(&self, form_name: &str, field_name: &str) -> FieldType {
        self.get_field(form_name, field_name)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Text)
    }

    /// Valid values for a categorical field, empty when undeclared.
    pub fn valid_values(&self, form_name: &str, field_name: &str) -> Vec<String> {
        self.get_field(form_name, field_name)
            .and_then(|f| f.valid_values.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals_spec() -> Specification {
        Specification::new().with_form(
            Form::new("VitalSigns")
                .with_field(
                    Field::new("SystolicBP", FieldType::Numeric)
                        .with_range(Value::Int(60), Value::Int(250)),
                )
                .with_field(
                    Field::new("DiastolicBP", FieldType::Numeric)
                        .with_range(Value::Int(30), Value::Int(150)),
                ),
        )
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!(FieldType::from_alias("integer"), FieldType::Numeric);
        assert_eq!(FieldType::from_alias("codelist"), FieldType::Categorical);
        assert_eq!(FieldType::from_alias("yes/no"), FieldType::Boolean);
        assert_eq!(FieldType::from_alias("mystery"), FieldType::Text);
    }

    #[test]
    fn test_field_lookup() {
        let spec = vitals_spec();
        let field = spec.get_field("VitalSigns", "SystolicBP").unwrap();
        assert_eq!(field.field_type, FieldType::Numeric);
        assert_eq!(field.min_value, Some(Value::Int(60)));

        assert!(spec.get_field("VitalSigns", "HeartRate").is_none());
        assert!(spec.get_field("Labs", "SystolicBP").is_none());
    }

    #[test]
    fn test_require_field_errors() {
        let spec = vitals_spec();
        assert!(spec.require_field("VitalSigns", "SystolicBP").is_ok());
        assert!(spec.require_field("Labs", "SystolicBP").is_err());
        assert!(spec.require_field("VitalSigns", "HeartRate").is_err());
    }

    #[test]
    fn test_add_field_replaces_same_name() {
        let mut form = Form::new("Demographics");
        form.add_field(Field::new("Age", FieldType::Text));
        form.add_field(Field::new("Age", FieldType::Numeric));
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.get_field("Age").unwrap().field_type, FieldType::Numeric);
    }
}
