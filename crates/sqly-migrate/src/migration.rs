//! The migration entity: identity, metadata, and bookkeeping queries.
//!
//! A [`Migration`] is a single schema-change unit. Its identity is the key
//! `app:ts_name`; two records are equal iff their keys are equal, however
//! they were materialized (filesystem file or bookkeeping row). Once saved a
//! migration is never edited in place: a new migration is the mechanism for
//! schema change.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Datelike, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sqly_core::{render, statements, Dialect, ParamSet, Params, Q, Row};

use crate::error::{MigrateError, Result};

/// Name of the bookkeeping table recording applied migrations.
pub const MIGRATIONS_TABLE: &str = "sqly_migrations";

/// Runs of non-word characters (and underscores) collapse to one underscore.
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").expect("name pattern is valid"));

/// The current UTC instant as a sortable `YYYYmmddHHMMSSmmm` integer
/// (millisecond resolution).
#[must_use]
pub fn migration_timestamp() -> i64 {
    let now = Utc::now();
    let date = i64::from(now.year()) * 10_000
        + i64::from(now.month()) * 100
        + i64::from(now.day());
    let time = i64::from(now.hour()) * 10_000
        + i64::from(now.minute()) * 100
        + i64::from(now.second());
    let millis = i64::from(now.timestamp_subsec_millis().min(999));
    date * 1_000_000_000 + time * 1_000 + millis
}

/// A single schema-change unit with forward/backward scripts and declared
/// dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    /// The app (namespace) that owns this migration.
    pub app: String,
    /// Creation instant as a `YYYYmmddHHMMSSmmm` integer.
    #[serde(default = "migration_timestamp")]
    pub ts: i64,
    /// Short human label, sanitized to word characters and underscores.
    #[serde(default)]
    pub name: String,
    /// Keys of migrations that must be applied before this one.
    #[serde(default)]
    pub depends: Vec<String>,
    /// When the migration was applied. Present only on records materialized
    /// from the bookkeeping table; never saved to the filesystem.
    #[serde(default, skip_serializing)]
    pub applied: Option<DateTime<Utc>>,
    /// A document string describing the migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// SQL implementing the forward ("up") migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<String>,
    /// SQL implementing the backward ("down") migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
}

impl Migration {
    /// Creates an unsaved migration with a fresh timestamp.
    #[must_use]
    pub fn new(app: impl Into<String>, name: &str, depends: Vec<String>) -> Self {
        Self {
            app: app.into(),
            ts: migration_timestamp(),
            name: sanitize_name(name),
            depends,
            applied: None,
            doc: None,
            up: None,
            dn: None,
        }
    }

    /// The globally unique key: `app:ts_name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}_{}", self.app, self.ts, self.name)
    }

    /// The filename (without path) for this migration.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}_{}.yaml", self.ts, self.name)
    }

    /// Splits a key into its `(app, basename)` components.
    pub fn split_key(key: &str) -> Result<(&str, &str)> {
        key.split_once(':')
            .filter(|(app, basename)| !app.is_empty() && !basename.is_empty())
            .ok_or_else(|| MigrateError::InvalidKey(key.to_string()))
    }

    /// This migration serialized as YAML (`applied` is never included).
    pub fn yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Materializes a migration from a bookkeeping-table row. The `depends`
    /// column arrives JSON-serialized and is parsed back into keys.
    pub fn from_row(row: &Row) -> Result<Self> {
        let text = |column: &str| -> Result<String> {
            match row.get(column) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(MigrateError::InvalidRecord(format!(
                    "missing column '{column}'"
                ))),
            }
        };
        let optional = |column: &str| -> Option<String> {
            match row.get(column) {
                Some(Value::String(s)) => Some(s.clone()),
                _ => None,
            }
        };

        let ts = match row.get("ts") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => {
                return Err(MigrateError::InvalidRecord(
                    "missing column 'ts'".to_string(),
                ))
            }
        };

        let depends = match row.get("depends") {
            Some(Value::String(s)) if !s.is_empty() => serde_json::from_str(s)?,
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect(),
            _ => Vec::new(),
        };

        let applied = optional("applied").and_then(|s| parse_instant(&s));

        Ok(Self {
            app: text("app")?,
            ts,
            name: optional("name").unwrap_or_default(),
            depends,
            applied,
            doc: optional("doc"),
            up: optional("up"),
            dn: optional("dn"),
        })
    }

    /// The bookkeeping-row data for this migration: `None` fields and
    /// `applied` excluded, `depends` JSON-serialized.
    #[must_use]
    pub fn row_data(&self) -> ParamSet {
        let mut data = ParamSet::new();
        data.insert("app".to_string(), Value::from(self.app.clone()));
        data.insert("ts".to_string(), Value::from(self.ts));
        data.insert("name".to_string(), Value::from(self.name.clone()));
        data.insert(
            "depends".to_string(),
            Value::from(serde_json::to_string(&self.depends).unwrap_or_else(|_| "[]".to_string())),
        );
        for (column, value) in [("doc", &self.doc), ("up", &self.up), ("dn", &self.dn)] {
            if let Some(value) = value {
                data.insert(column.to_string(), Value::from(value.clone()));
            }
        }
        data
    }

    /// Renders the INSERT recording this migration in the bookkeeping table.
    pub fn insert_query(&self, dialect: Dialect) -> Result<(String, Params)> {
        let data = self.row_data();
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        let template = statements::insert(MIGRATIONS_TABLE, &keys);
        Ok(render(dialect, &template, &data)?)
    }

    /// Renders the DELETE removing this migration's bookkeeping row, keyed
    /// by `(app, ts, name)`.
    pub fn delete_query(&self, dialect: Dialect) -> Result<(String, Params)> {
        let filters: Vec<String> = ["app", "name", "ts"]
            .iter()
            .map(|key| Q::filter(key, "="))
            .collect();
        let template = statements::delete(MIGRATIONS_TABLE, &filters);
        let mut data = ParamSet::new();
        data.insert("app".to_string(), Value::from(self.app.clone()));
        data.insert("ts".to_string(), Value::from(self.ts));
        data.insert("name".to_string(), Value::from(self.name.clone()));
        Ok(render(dialect, &template, &data)?)
    }

    /// The set of this migration's direct dependency keys.
    #[must_use]
    pub fn depends_set(&self) -> BTreeSet<String> {
        self.depends.iter().cloned().collect()
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl PartialEq for Migration {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Migration {}

impl Hash for Migration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Replaces runs of non-word characters with a single underscore.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    NAME_RE.replace_all(name, "_").into_owned()
}

/// Parses an applied-at instant: RFC 3339 first, then the SQLite datetime
/// format the bookkeeping table's default produces.
fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_format() {
        let mut migration = Migration::new("shop", "create widgets", vec![]);
        migration.ts = 20240101120000000;
        assert_eq!(migration.key(), "shop:20240101120000000_create_widgets");
        assert_eq!(migration.filename(), "20240101120000000_create_widgets.yaml");
    }

    #[test]
    fn test_name_sanitized() {
        assert_eq!(sanitize_name("add widgets!"), "add_widgets_");
        assert_eq!(sanitize_name("a__b--c"), "a_b_c");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_split_key() {
        let (app, basename) = Migration::split_key("shop:123_init").unwrap();
        assert_eq!(app, "shop");
        assert_eq!(basename, "123_init");
        assert!(matches!(
            Migration::split_key("no-colon"),
            Err(MigrateError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_timestamps_are_sortable_and_increasing() {
        let a = migration_timestamp();
        let b = migration_timestamp();
        assert!(a >= 20_200_101_000_000_000);
        assert!(b >= a);
    }

    #[test]
    fn test_equality_and_hash_by_key() {
        use std::collections::HashSet;

        let mut a = Migration::new("shop", "init", vec![]);
        a.ts = 1;
        let mut b = a.clone();
        b.doc = Some("different metadata, same identity".to_string());
        assert_eq!(a, b);

        let set: HashSet<Migration> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_yaml_round_trip_excludes_applied() {
        let mut migration = Migration::new("shop", "init", vec!["sqly:1_init".to_string()]);
        migration.ts = 2;
        migration.up = Some("CREATE TABLE widgets (id int)".to_string());
        migration.applied = Some(Utc::now());

        let yaml = migration.yaml().unwrap();
        assert!(!yaml.contains("applied"));

        let loaded: Migration = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded, migration);
        assert_eq!(loaded.depends, migration.depends);
        assert_eq!(loaded.up, migration.up);
        assert!(loaded.applied.is_none());
        assert!(loaded.dn.is_none());
    }

    #[test]
    fn test_from_row_parses_serialized_depends() {
        let row: Row = [
            ("app".to_string(), json!("shop")),
            ("ts".to_string(), json!(2)),
            ("name".to_string(), json!("init")),
            ("depends".to_string(), json!(r#"["sqly:1_init"]"#)),
            ("applied".to_string(), json!("2024-01-01 12:00:00")),
            ("doc".to_string(), json!(null)),
        ]
        .into_iter()
        .collect();

        let migration = Migration::from_row(&row).unwrap();
        assert_eq!(migration.key(), "shop:2_init");
        assert_eq!(migration.depends, vec!["sqly:1_init"]);
        assert!(migration.applied.is_some());
        assert!(migration.doc.is_none());
    }

    #[test]
    fn test_insert_query_sqlite() {
        let mut migration = Migration::new("shop", "init", vec![]);
        migration.ts = 2;
        migration.up = Some("CREATE TABLE widgets (id int)".to_string());

        let (sql, params) = migration.insert_query(Dialect::Sqlite).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO sqly_migrations (app, depends, name, ts, up) VALUES (?, ?, ?, ?, ?)"
        );
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn test_delete_query_keys_on_identity() {
        let mut migration = Migration::new("shop", "init", vec![]);
        migration.ts = 2;

        let (sql, params) = migration.delete_query(Dialect::Embedded).unwrap();
        assert_eq!(
            sql,
            "DELETE FROM sqly_migrations WHERE app = :app AND name = :name AND ts = :ts"
        );
        assert_eq!(params.len(), 3);
    }
}
