use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Id, StableId};

/// Errors surfaced by the record stores and editors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Client-side validation failed; nothing was sent to the backend.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A backend call failed. The local state is left as it was before the call.
    #[error("{operation} failed for '{key}': {source:#}")]
    Persistence {
        operation: &'static str,
        key: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("no record with stable id {0}")]
    RecordNotFound(StableId),

    #[error("no attribute with stable id {0}")]
    AttributeNotFound(StableId),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("no record is selected")]
    NoSelection,

    #[error("a save is already in flight for this record")]
    SaveInProgress,
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(operation: &'static str, key: impl Into<Id>, source: anyhow::Error) -> Self {
        Self::Persistence {
            operation,
            key: key.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// One problem found while validating a record before persisting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    EmptyBusinessKey,
    DuplicateBusinessKey { key: Id },
    EmptyAttributeKey { index: usize },
    DuplicateAttributeKey { key: Id },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBusinessKey => write!(f, "id must not be empty"),
            Self::DuplicateBusinessKey { key } => write!(f, "id '{}' is already in use", key),
            Self::EmptyAttributeKey { index } => {
                write!(f, "attribute #{} has an empty id", index + 1)
            }
            Self::DuplicateAttributeKey { key } => {
                write!(f, "attribute id '{}' appears more than once", key)
            }
        }
    }
}

/// All validation problems found for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.issues.iter().map(|issue| issue.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
