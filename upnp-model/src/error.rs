use thiserror::Error;

/// A single structural problem found while validating a device or service model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{scope}.{property}: {message}")]
pub struct ValidationError {
    /// The kind of model element that failed (e.g. `Device`, `Service`)
    pub scope: &'static str,
    /// The offending property
    pub property: String,
    /// Human readable description
    pub message: String,
}

impl ValidationError {
    pub fn new(scope: &'static str, property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope,
            property: property.into(),
            message: message.into(),
        }
    }
}

/// All validation errors collected for one model graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{context}: {} validation error(s)", .errors.len())]
pub struct ValidationErrors {
    pub context: String,
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Turn a list of collected errors into a result, failing if the list is non-empty
    pub fn check(context: impl Into<String>, errors: Vec<ValidationError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self {
                context: context.into(),
                errors,
            })
        }
    }
}

/// Returned when a string cannot be parsed into one of the model identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct InvalidValueError {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidValueError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
