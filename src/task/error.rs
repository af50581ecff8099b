//! Task error taxonomy.

use serde::Serialize;
use thiserror::Error;

use crate::store::StorageError;

/// A single violated validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Malformed or out-of-range input. Carries every violated field,
    /// not just the first one found.
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// The record does not exist or is not owned by the caller. The two
    /// cases are deliberately indistinguishable.
    #[error("task not found")]
    NotFound,

    /// Persistence fault or timeout. Not retried here.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}
