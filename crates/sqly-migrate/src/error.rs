//! Error types for the migration system.

use std::collections::BTreeMap;
use std::path::PathBuf;

use sqly_core::SqlyError;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The migration dependency declarations form a cycle. Carries the raw
    /// adjacency map (key -> depends) so the offending migrations can be
    /// located.
    #[error("Circular dependency detected in migrations: {adjacency:?}")]
    CyclicDependency {
        /// Migration key mapped to its declared dependencies.
        adjacency: BTreeMap<String, Vec<String>>,
    },

    /// An ancestor/descendant query named a key absent from the graph.
    #[error("Migration '{0}' is not in the graph")]
    NodeNotFound(String),

    /// A migration key does not resolve to a stored migration.
    #[error("Migration not found: {0}")]
    MigrationNotFound(String),

    /// A migration key is not of the form `app:ts_name`.
    #[error("Invalid migration key: '{0}'")]
    InvalidKey(String),

    /// A database row could not be materialized as a migration record.
    #[error("Invalid migration record: {0}")]
    InvalidRecord(String),

    /// IO error reading or writing migration files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A migration file could not be parsed.
    #[error("Failed to parse migration file '{path}': {source}")]
    ParseError {
        /// Path to the migration file.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A migration could not be serialized.
    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialized dependency lists could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query rendering or driver error from the core.
    #[error(transparent)]
    Sql(#[from] SqlyError),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
