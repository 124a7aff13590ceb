//! Dependency-graph-based schema migrations for sqly.
//!
//! Migrations are one-file-per-change YAML records, each declaring the set
//! of migrations it depends on. The dependency declarations form a DAG; the
//! engine reconciles what a target database has applied with the graph and
//! executes the minimal ordered sequence of forward ("up") or backward
//! ("down") steps to reach a requested migration, recording applied state in
//! the `sqly_migrations` bookkeeping table.
//!
//! # Architecture
//!
//! - **[`migration`]** - The migration entity: identity (`app:ts_name` key),
//!   metadata, and bookkeeping queries.
//! - **[`store`]** - Filesystem discovery and persistence, plus the embedded
//!   bootstrap migration that creates the bookkeeping table.
//! - **[`graph`]** - The dependency DAG: acyclicity validation, transitive
//!   reduction, ancestors/descendants, lexicographic topological order.
//! - **[`engine`]** - Transactional apply/revert against a caller-owned
//!   connection.
//!
//! # Example
//!
//! ```no_run
//! use sqly_core::Dialect;
//! use sqly_migrate::prelude::*;
//! use sqly_sqlite::SqliteConnection;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let store = MigrationStore::new("apps");
//! let mut migration = store.create("shop", &[], Some("create widgets"))?;
//! migration.up = Some("CREATE TABLE widgets (id int, sku varchar)".to_string());
//! migration.dn = Some("DROP TABLE widgets".to_string());
//! store.save(&migration)?;
//!
//! let mut conn = SqliteConnection::open("shop.db")?;
//! let migrator = Migrator::new(store, Dialect::Sqlite);
//! migrator.migrate(&mut conn, &migration, false)?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod migration;
pub mod store;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::engine::{Direction, MigrationStep, Migrator};
    pub use crate::error::{MigrateError, Result};
    pub use crate::graph::MigrationGraph;
    pub use crate::migration::{Migration, MIGRATIONS_TABLE};
    pub use crate::store::{bootstrap_migration, MigrationStore, BOOTSTRAP_APP};
}
