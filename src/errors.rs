use thiserror::Error;

use crate::inspection::InspectionId;
use crate::mapping::Operation;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum InspectionError {
    /// Represents a submission or query that failed validation before
    /// any storage call was attempted.
    #[error("invalid submission: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Represents a statement whose placeholders do not match the
    /// values supplied for it.
    #[error("statement expects {placeholders} parameters but {values} values were supplied")]
    Arity { placeholders: usize, values: usize },

    /// Represents an error returned by the database. The message is
    /// deliberately opaque; the source carries the details.
    #[error("storage failure")]
    Storage { source: sqlx::Error },

    /// Represents an operation on a record that doesn’t exist or has
    /// already been deleted.
    #[error("inspection {0} not found or already inactive")]
    NotFound(InspectionId),

    /// Represents an ID in a path that couldn’t be parsed.
    #[error("invalid inspection ID: {0}")]
    InvalidId(String),

    /// Represents a statement handed to the wrong gateway method, such
    /// as an insertion passed to `update`.
    #[error("{operation:?} statement passed to {method}")]
    Misdirected {
        operation: Operation,
        method: &'static str,
    },
}

/// The broad class an [`InspectionError`] belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Arity,
    Storage,
    NotFound,
    Internal,
}

impl InspectionError {
    pub fn kind(&self) -> ErrorKind {
        use InspectionError::*;

        match self {
            Validation(..) | InvalidId(..) => ErrorKind::Validation,
            Arity { .. } => ErrorKind::Arity,
            Storage { .. } => ErrorKind::Storage,
            NotFound(..) => ErrorKind::NotFound,
            Misdirected { .. } => ErrorKind::Internal,
        }
    }

    /// Shorthand for a validation error about a single field.
    pub fn field(error: FieldError) -> Self {
        InspectionError::Validation(vec![error])
    }
}

/// A problem with one submitted field.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FieldError {
    /// A mandatory field was absent or blank.
    #[error("{field} is required")]
    Missing { field: String },

    /// A field was present but couldn’t be interpreted.
    #[error("{field} must be {expected} (got {value:?})")]
    Malformed {
        field: String,
        value: String,
        expected: &'static str,
    },
}

impl FieldError {
    pub fn missing(field: impl Into<String>) -> Self {
        FieldError::Missing {
            field: field.into(),
        }
    }

    pub fn malformed(field: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        FieldError::Malformed {
            field: field.into(),
            value: value.into(),
            expected,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FieldError::Missing { field } | FieldError::Malformed { field, .. } => field,
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<sqlx::Error> for InspectionError {
    fn from(source: sqlx::Error) -> Self {
        InspectionError::Storage { source }
    }
}
