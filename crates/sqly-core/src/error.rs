//! Error types for dialect lookup, query rendering, and driver calls.

use crate::dialect::ParamFormat;

/// Errors that can occur while constructing dialects, rendering queries, or
/// talking to a database connection.
#[derive(Debug, thiserror::Error)]
pub enum SqlyError {
    /// The requested dialect name is not in the registry.
    #[error("Unknown dialect: '{0}'")]
    UnknownDialect(String),

    /// A template placeholder has no corresponding entry in the supplied data.
    #[error("Missing parameter: '{0}'")]
    MissingParameter(String),

    /// A parameter format the renderer cannot produce. Unreachable as long as
    /// the dialect table stays total.
    #[error("Unsupported parameter format: {0:?}")]
    UnsupportedFormat(ParamFormat),

    /// An error surfaced by the underlying database driver.
    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SqlyError {
    /// Wraps a driver-level error.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Box::new(err))
    }
}

/// Result type for query construction and rendering operations.
pub type Result<T> = std::result::Result<T, SqlyError>;
