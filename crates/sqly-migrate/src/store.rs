//! Filesystem storage and discovery of migrations.
//!
//! Migrations live one per file at `<root>/<app>/migrations/{ts}_{name}.yaml`.
//! The store resolves app identifiers to storage directories, scans them, and
//! follows dependency keys across apps. Every migration set implicitly
//! includes the bootstrap app (`sqly`), whose single embedded migration
//! creates the bookkeeping table on the way up and drops it on the way down.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::graph::MigrationGraph;
use crate::migration::{Migration, MIGRATIONS_TABLE};

/// The app namespace of the embedded bootstrap migration.
pub const BOOTSTRAP_APP: &str = "sqly";

const BOOTSTRAP_TS: i64 = 20220101000000000;
const BOOTSTRAP_NAME: &str = "init";

/// The embedded root migration: creates the bookkeeping table going up,
/// drops it going down. Every migration graph reaches back to this node.
#[must_use]
pub fn bootstrap_migration() -> Migration {
    Migration {
        app: BOOTSTRAP_APP.to_string(),
        ts: BOOTSTRAP_TS,
        name: BOOTSTRAP_NAME.to_string(),
        depends: Vec::new(),
        applied: None,
        doc: Some("sqly migration bookkeeping table".to_string()),
        up: Some(format!(
            "CREATE TABLE {MIGRATIONS_TABLE} (\n\
             \x20   app VARCHAR NOT NULL,\n\
             \x20   ts BIGINT NOT NULL,\n\
             \x20   name VARCHAR NOT NULL DEFAULT '',\n\
             \x20   depends VARCHAR NOT NULL DEFAULT '[]',\n\
             \x20   applied TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,\n\
             \x20   doc VARCHAR,\n\
             \x20   up VARCHAR,\n\
             \x20   dn VARCHAR,\n\
             \x20   PRIMARY KEY (app, ts, name)\n\
             )"
        )),
        dn: Some(format!("DROP TABLE {MIGRATIONS_TABLE}")),
    }
}

/// A mapping of migrations by key.
pub type MigrationSet = BTreeMap<String, Migration>;

/// Resolves apps to storage directories and loads/saves migration files.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    root: PathBuf,
}

impl MigrationStore {
    /// Creates a store rooted at `root`; app `a` stores its migrations under
    /// `<root>/a/migrations`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The migrations directory for an app.
    #[must_use]
    pub fn app_path(&self, app: &str) -> PathBuf {
        self.root.join(app).join("migrations")
    }

    /// The file path a migration is (or would be) stored at.
    #[must_use]
    pub fn migration_path(&self, migration: &Migration) -> PathBuf {
        self.app_path(&migration.app).join(migration.filename())
    }

    /// The file path for a migration key.
    pub fn key_path(&self, key: &str) -> Result<PathBuf> {
        let (app, basename) = Migration::split_key(key)?;
        Ok(self.app_path(app).join(format!("{basename}.yaml")))
    }

    /// Loads the migration file at `path`.
    pub fn load(path: &Path) -> Result<Migration> {
        let text = fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|source| MigrateError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the migration with the given key. The embedded bootstrap
    /// migration resolves without touching the filesystem.
    pub fn key_load(&self, key: &str) -> Result<Migration> {
        let bootstrap = bootstrap_migration();
        if key == bootstrap.key() {
            return Ok(bootstrap);
        }
        let path = self.key_path(key)?;
        if !path.is_file() {
            return Err(MigrateError::MigrationNotFound(key.to_string()));
        }
        Self::load(&path)
    }

    /// Saves a migration to its storage location, creating the app's
    /// migrations directory if needed. Overwrites any file with the same key.
    pub fn save(&self, migration: &Migration) -> Result<PathBuf> {
        let path = self.migration_path(migration);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, migration.yaml()?)?;
        debug!(path = %path.display(), "saved migration");
        Ok(path)
    }

    /// All migrations stored for an app, by key. With `include_depends`,
    /// dependency migrations (possibly from other apps) are folded in
    /// recursively. The bootstrap app always includes its embedded root.
    pub fn app_migrations(&self, app: &str, include_depends: bool) -> Result<MigrationSet> {
        let mut migrations = MigrationSet::new();
        if app == BOOTSTRAP_APP {
            let bootstrap = bootstrap_migration();
            migrations.insert(bootstrap.key(), bootstrap);
        }

        let dir = self.app_path(app);
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
                    let migration = Self::load(&path)?;
                    migrations.insert(migration.key(), migration);
                }
            }
        }

        if include_depends {
            let loaded: Vec<Migration> = migrations.values().cloned().collect();
            for migration in loaded {
                self.depends_migrations(&migration, &mut migrations)?;
            }
        }

        Ok(migrations)
    }

    /// All migrations, including dependencies, for the given apps. The
    /// bootstrap app is always included as a dependency root.
    pub fn all_migrations(&self, apps: &[&str]) -> Result<MigrationSet> {
        let mut migrations = self.app_migrations(BOOTSTRAP_APP, true)?;
        for app in apps {
            if *app != BOOTSTRAP_APP {
                migrations.extend(self.app_migrations(app, true)?);
            }
        }
        Ok(migrations)
    }

    /// Creates (without saving) a new migration for `app`, depending on every
    /// current leaf of the graph over `app`, `other_apps`, and the bootstrap
    /// app. The filesystem is the source of truth for the graph here, not any
    /// database's applied state.
    pub fn create(&self, app: &str, other_apps: &[&str], name: Option<&str>) -> Result<Migration> {
        let mut apps = vec![app];
        apps.extend_from_slice(other_apps);
        let migrations = self.all_migrations(&apps)?;
        let graph = MigrationGraph::build(&migrations)?;
        let depends = graph.leaves();
        Ok(Migration::new(app, name.unwrap_or_default(), depends))
    }

    /// Recursively folds a migration's dependencies into `out`.
    fn depends_migrations(&self, migration: &Migration, out: &mut MigrationSet) -> Result<()> {
        for key in &migration.depends {
            if out.contains_key(key) {
                continue;
            }
            let dependency = self.key_load(key)?;
            out.insert(key.clone(), dependency.clone());
            self.depends_migrations(&dependency, out)?;
        }
        Ok(())
    }
}
