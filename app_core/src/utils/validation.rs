// tools for validation of input

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    field: String,
    // e.g. "required", "invalid_format"
    code: String,
    // human-friendly (or build from code)
    message: String,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {}", self.field, self.code)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl std::error::Error for FieldError {}

impl FieldError {
    pub fn get_field(&self) -> &str {
        &self.field
    }
    pub fn get_code(&self) -> &str {
        &self.code
    }
    pub fn get_message(&self) -> &str {
        &self.message
    }

    pub fn builder() -> FieldErrorBuilder<NoField> {
        FieldErrorBuilder {
            field: NoField {},
            code: "".into(),
            message: "".into(),
        }
    }
}

#[derive(Debug, Clone, Error, Default, Serialize, Deserialize, PartialEq, Eq)]
#[error("validation failed with {} error(s)", errors.len())]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl From<FieldError> for ValidationErrors {
    fn from(value: FieldError) -> Self {
        Self {
            errors: vec![value],
        }
    }
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }
    pub fn add(&mut self, err: FieldError) {
        self.errors.push(err);
    }
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
    /// Finish a validation pass: empty error set is Ok.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationErrors>;

pub struct NoField {}
pub struct Field(String);

pub struct FieldErrorBuilder<F> {
    field: F,
    code: String,
    message: String,
}

impl FieldErrorBuilder<NoField> {
    pub fn set_field(self, field: impl Into<String>) -> FieldErrorBuilder<Field> {
        FieldErrorBuilder {
            field: Field(field.into()),
            code: self.code,
            message: self.message,
        }
    }
}

impl FieldErrorBuilder<Field> {
    /// set code to required
    pub fn add_required(mut self) -> Self {
        self.code = "required".into();
        self
    }
    /// set code to invalid_format
    pub fn add_invalid_format(mut self) -> Self {
        self.code = "invalid_format".into();
        self
    }
    /// set user defined code
    pub fn add_user_defined_code(mut self, code: &str) -> Self {
        self.code = code.into();
        self
    }
    /// set human readable message
    pub fn add_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
    /// build FieldError
    pub fn build(self) -> FieldError {
        FieldError {
            field: self.field.0,
            code: self.code,
            message: self.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_field_and_code() {
        let err = FieldError::builder()
            .set_field("tag")
            .add_invalid_format()
            .add_message("tag must be at most 4 characters")
            .build();
        assert_eq!(err.get_field(), "tag");
        assert_eq!(err.get_code(), "invalid_format");
        assert_eq!(err.to_string(), "tag: tag must be at most 4 characters");
    }

    #[test]
    fn empty_error_set_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        let mut errs = ValidationErrors::new();
        errs.add(FieldError::builder().set_field("name").add_required().build());
        assert!(errs.into_result().is_err());
    }
}
