//! Error types for the alteration engine.

use std::fmt;

use crate::schema::FieldUid;

/// Errors that can occur while planning or applying a table alteration.
#[derive(Debug, thiserror::Error)]
pub enum AlterError {
    /// The table does not exist in the catalog.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// An action references a field that neither exists in the table nor is
    /// inserted earlier in the batch.
    #[error("Field with uid {uid} does not exist in table '{table}'")]
    UnknownField {
        /// Table name.
        table: String,
        /// The unresolved field identity.
        uid: FieldUid,
    },

    /// The property name is not known to the requirement classifier.
    #[error("Unknown field property '{0}'")]
    UnknownProperty(String),

    /// The value given for a property has the wrong shape.
    #[error("Invalid value for property '{property}': {message}")]
    InvalidPropertyValue {
        /// Property name.
        property: String,
        /// What was wrong with the value.
        message: String,
    },

    /// The action batch is ill-formed.
    #[error("Invalid action batch: {0}")]
    InvalidBatch(String),

    /// The resulting table definition is not valid.
    #[error("Invalid table schema: {0}")]
    InvalidSchema(String),

    /// Error reported by the schema catalog adapter.
    #[error("Catalog error: {0}")]
    Catalog(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The operation was stopped by the caller or by the adapter.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AlterError {
    /// Wraps an adapter-specific error.
    #[must_use]
    pub fn catalog(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Catalog(err.into())
    }

    /// Returns true if this error represents a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Result type for alteration operations.
pub type Result<T> = std::result::Result<T, AlterError>;

/// Three-valued outcome of an operation: success, failure or cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation completed.
    Success,
    /// The operation failed; carries the reported message.
    Failed(String),
    /// The operation was cancelled; carries where it stopped.
    Cancelled(String),
}

impl Outcome {
    /// Returns true for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for [`Outcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true for [`Outcome::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<&AlterError> for Outcome {
    fn from(err: &AlterError) -> Self {
        match err {
            AlterError::Cancelled(stage) => Self::Cancelled(stage.clone()),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl<T> From<Result<T>> for Outcome {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::from(&err),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::Cancelled(stage) => write!(f, "cancelled: {stage}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(Outcome::from(Ok::<(), AlterError>(())), Outcome::Success);

        let failed = Outcome::from(Err::<(), _>(AlterError::TableNotFound("t".into())));
        assert_eq!(failed, Outcome::Failed("Table 't' does not exist".into()));

        let cancelled = Outcome::from(Err::<(), _>(AlterError::Cancelled("copy rows".into())));
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_failed());
    }

    #[test]
    fn test_catalog_error_keeps_adapter_message() {
        let err = AlterError::catalog("disk I/O error");
        assert_eq!(err.to_string(), "Catalog error: disk I/O error");
        assert!(!err.is_cancelled());
    }
}
