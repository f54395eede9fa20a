use thiserror::Error;

/// A boundary payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
