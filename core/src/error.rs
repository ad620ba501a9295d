//! Core error types.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown form: {name}")]
    UnknownForm { name: String },

    #[error("Unknown field: {form}.{field}")]
    UnknownField { form: String, field: String },
}

impl CoreError {
    pub fn unknown_form(name: impl Into<String>) -> Self {
        Self::UnknownForm { name: name.into() }
    }

    pub fn unknown_field(form: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            form: form.into(),
            field: field.into(),
        }
    }
}
