//! Error types for the SQLite catalog.

use oxide_alter_core::error::AlterError;

/// Errors raised by [`SqliteCatalog`](crate::SqliteCatalog).
#[derive(Debug, thiserror::Error)]
pub enum SqliteCatalogError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Runtime setup error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored field definition could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from the alteration engine.
    #[error(transparent)]
    Alter(#[from] AlterError),
}

/// Result type for SQLite catalog operations.
pub type Result<T> = std::result::Result<T, SqliteCatalogError>;

impl From<SqliteCatalogError> for AlterError {
    fn from(err: SqliteCatalogError) -> Self {
        match err {
            SqliteCatalogError::Alter(inner) => inner,
            other => AlterError::catalog(other),
        }
    }
}
