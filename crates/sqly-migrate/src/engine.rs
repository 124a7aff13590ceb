//! The migration engine: reconciles applied state with the dependency graph
//! and executes the ordered apply/revert sequence.
//!
//! Each step is one database transaction: direction script, bookkeeping
//! write, commit; any failure rolls the transaction back and propagates, so
//! a migration is never partially recorded as applied. The engine owns no
//! connection and runs no statements concurrently; concurrent invocations
//! against the same database from two processes are out of scope and will
//! race.
//!
//! Known limitation, kept deliberately: only the single branch leading to or
//! from the target is considered. Applied migrations on a divergent sibling
//! branch are neither reverted nor reconciled.

use std::fmt;

use tracing::{info, warn};

use sqly_core::{Connection, Dialect, ParamSet, Sql};

use crate::error::{MigrateError, Result};
use crate::graph::MigrationGraph;
use crate::migration::{Migration, MIGRATIONS_TABLE};
use crate::store::{MigrationSet, MigrationStore};

/// The direction of a single migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward application.
    Up,
    /// Backward reversion.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "dn",
        })
    }
}

/// One step of a computed migration sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// The migration key the step applies or reverts.
    pub key: String,
    /// The step direction.
    pub direction: Direction,
}

/// Applies and reverts migrations against a caller-owned connection.
pub struct Migrator {
    store: MigrationStore,
    dialect: Dialect,
}

impl Migrator {
    /// Creates an engine over the given store, rendering bookkeeping queries
    /// with `dialect`.
    #[must_use]
    pub const fn new(store: MigrationStore, dialect: Dialect) -> Self {
        Self { store, dialect }
    }

    /// The engine's migration store.
    #[must_use]
    pub const fn store(&self) -> &MigrationStore {
        &self.store
    }

    /// The migrations currently recorded as applied in the database, by key.
    ///
    /// A failing read means the bookkeeping table does not exist yet, the
    /// expected state for a brand-new database: the failure is logged for
    /// diagnosis and the result is empty. This leniency is specific to this
    /// read path; write-path failures always propagate.
    pub fn database_migrations(&self, conn: &mut dyn Connection) -> Result<MigrationSet> {
        let sql = Sql::new(self.dialect);
        let (select, params) = sql.query(
            format!("SELECT * FROM {MIGRATIONS_TABLE}"),
            &ParamSet::new(),
        )?;
        let rows = match conn.query(&select, &params) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "could not read applied migrations; treating as none applied");
                return Ok(MigrationSet::new());
            }
        };

        let mut migrations = MigrationSet::new();
        for row in &rows {
            let migration = Migration::from_row(row)?;
            migrations.insert(migration.key(), migration);
        }
        Ok(migrations)
    }

    /// Migrates the database to `target`, up or down.
    ///
    /// If `target` is not applied, its unapplied ancestors and the target
    /// itself are applied in lexicographic topological order. If it is
    /// applied, its applied descendants are reverted in reverse order (the
    /// target itself stays applied). Returns the executed steps; with
    /// `dryrun` the steps are reported but nothing is executed or recorded.
    pub fn migrate(
        &self,
        conn: &mut dyn Connection,
        target: &Migration,
        dryrun: bool,
    ) -> Result<Vec<MigrationStep>> {
        let applied = self.database_migrations(conn)?;
        // Merge applied records with the statically-declared set; the
        // filesystem wins on key collisions.
        let mut migrations = applied.clone();
        migrations.extend(self.store.all_migrations(&[target.app.as_str()])?);
        let graph = MigrationGraph::build(&migrations)?;

        let target_key = target.key();
        let mut steps = Vec::new();

        if applied.contains_key(&target_key) {
            let subgraph = graph.subgraph(&graph.descendants(&target_key)?);
            for key in subgraph.lexicographic_topological_sort().into_iter().rev() {
                if applied.contains_key(&key) {
                    self.apply_key(conn, &migrations, &key, Direction::Down, dryrun)?;
                    steps.push(MigrationStep {
                        key,
                        direction: Direction::Down,
                    });
                }
            }
        } else {
            let mut wanted = graph.ancestors(&target_key)?;
            wanted.insert(target_key);
            let subgraph = graph.subgraph(&wanted);
            for key in subgraph.lexicographic_topological_sort() {
                if !applied.contains_key(&key) {
                    self.apply_key(conn, &migrations, &key, Direction::Up, dryrun)?;
                    steps.push(MigrationStep {
                        key,
                        direction: Direction::Up,
                    });
                }
            }
        }

        Ok(steps)
    }

    /// Applies or reverts a single migration inside one transaction: the
    /// direction script (if any), then the bookkeeping INSERT or DELETE.
    /// With `dryrun`, reports only.
    pub fn apply(
        &self,
        conn: &mut dyn Connection,
        migration: &Migration,
        direction: Direction,
        dryrun: bool,
    ) -> Result<()> {
        if dryrun {
            info!(key = %migration.key(), direction = %direction, "dry run");
            return Ok(());
        }
        info!(key = %migration.key(), direction = %direction, "migrating");

        conn.begin()?;
        if let Err(err) = self.apply_in_transaction(conn, migration, direction) {
            if let Err(rollback_err) = conn.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
            return Err(err);
        }
        conn.commit()?;
        Ok(())
    }

    fn apply_in_transaction(
        &self,
        conn: &mut dyn Connection,
        migration: &Migration,
        direction: Direction,
    ) -> Result<()> {
        let script = match direction {
            Direction::Up => migration.up.as_deref(),
            Direction::Down => migration.dn.as_deref(),
        };
        if let Some(script) = script {
            if !script.trim().is_empty() {
                conn.execute_script(script)?;
            }
        }

        let (sql, params) = match direction {
            Direction::Up => migration.insert_query(self.dialect)?,
            Direction::Down => migration.delete_query(self.dialect)?,
        };
        conn.execute(&sql, &params)?;
        Ok(())
    }

    fn apply_key(
        &self,
        conn: &mut dyn Connection,
        migrations: &MigrationSet,
        key: &str,
        direction: Direction,
        dryrun: bool,
    ) -> Result<()> {
        let migration = migrations
            .get(key)
            .ok_or_else(|| MigrateError::MigrationNotFound(key.to_string()))?;
        self.apply(conn, migration, direction, dryrun)
    }
}
