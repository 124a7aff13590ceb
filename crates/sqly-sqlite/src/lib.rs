//! SQLite driver adapter for `sqly-core`, built on `rusqlite`.
//!
//! [`SqliteConnection`] implements the synchronous
//! [`Connection`](sqly_core::Connection) capability over a single `rusqlite`
//! connection. In-memory databases (`:memory:`) are supported for testing.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::Value as SqliteValue;
use serde_json::Value;

use sqly_core::{Connection, Params, Result, Row, SqlyError};

/// A synchronous SQLite connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(SqlyError::database)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(SqlyError::database)?;
        Ok(Self { conn })
    }

    /// The wrapped `rusqlite` connection, for driver-specific calls.
    #[must_use]
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

/// Converts a JSON parameter value to a SQLite bind value. Structured values
/// arrive already JSON-serialized from the renderer; any that reach this
/// point are serialized the same way.
fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqliteValue::Integer(i)
            } else {
                n.as_f64().map_or(SqliteValue::Null, SqliteValue::Real)
            }
        }
        Value::String(s) => SqliteValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqliteValue::Text(value.to_string()),
    }
}

/// Converts a SQLite column value to a JSON value.
fn from_sqlite(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::from(i),
        SqliteValue::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqliteValue::Text(s) => Value::String(s),
        SqliteValue::Blob(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
    }
}

/// Positional values and keyed `(":name", value)` pairs as owned vectors, so
/// either can be lent to `rusqlite` as bind parameters.
enum BindValues {
    Positional(Vec<SqliteValue>),
    Keyed(Vec<(String, SqliteValue)>),
}

impl BindValues {
    fn from_params(params: &Params) -> Self {
        match params {
            Params::Positional(values) => {
                Self::Positional(values.iter().map(to_sqlite).collect())
            }
            Params::Keyed(map) => Self::Keyed(
                map.iter()
                    .map(|(key, value)| (format!(":{key}"), to_sqlite(value)))
                    .collect(),
            ),
        }
    }
}

fn run<T>(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    op: impl FnOnce(&mut rusqlite::Statement<'_>, &BindValues) -> rusqlite::Result<T>,
) -> Result<T> {
    let mut stmt = conn.prepare(sql).map_err(SqlyError::database)?;
    let bind = BindValues::from_params(params);
    op(&mut stmt, &bind).map_err(SqlyError::database)
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64> {
        let affected = run(&self.conn, sql, params, |stmt, bind| match bind {
            BindValues::Positional(values) => {
                stmt.execute(rusqlite::params_from_iter(values.iter()))
            }
            BindValues::Keyed(pairs) => {
                let named: Vec<(&str, &dyn rusqlite::ToSql)> = pairs
                    .iter()
                    .map(|(key, value)| (key.as_str(), value as &dyn rusqlite::ToSql))
                    .collect();
                stmt.execute(named.as_slice())
            }
        })?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        run(&self.conn, sql, params, |stmt, bind| {
            let column_names: Vec<String> =
                stmt.column_names().iter().map(ToString::to_string).collect();
            let mut rows = match bind {
                BindValues::Positional(values) => {
                    stmt.query(rusqlite::params_from_iter(values.iter()))?
                }
                BindValues::Keyed(pairs) => {
                    let named: Vec<(&str, &dyn rusqlite::ToSql)> = pairs
                        .iter()
                        .map(|(key, value)| (key.as_str(), value as &dyn rusqlite::ToSql))
                        .collect();
                    stmt.query(named.as_slice())?
                }
            };
            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = BTreeMap::new();
                for (index, name) in column_names.iter().enumerate() {
                    let value: SqliteValue = row.get(index)?;
                    record.insert(name.clone(), from_sqlite(value));
                }
                result.push(record);
            }
            Ok(result)
        })
    }

    fn execute_script(&mut self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(SqlyError::database)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(SqlyError::database)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(SqlyError::database)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(SqlyError::database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqly_core::{Dialect, ParamSet, Sql};

    fn widgets_db() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE widgets (id int, sku varchar)")
            .unwrap();
        conn
    }

    fn widget(id: i64, sku: &str) -> ParamSet {
        [
            ("id".to_string(), json!(id)),
            ("sku".to_string(), json!(sku)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_execute_and_query_positional() {
        let mut conn = widgets_db();
        let sql = Sql::new(Dialect::Sqlite);

        let (insert, params) = sql.insert("widgets", &widget(1, "W-1")).unwrap();
        assert_eq!(conn.execute(&insert, &params).unwrap(), 1);

        let (select, params) = sql
            .select("widgets", &[], &widget(1, "W-1"), &["id"])
            .unwrap();
        let rows = conn.query(&select, &params).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sku"], json!("W-1"));
        assert_eq!(rows[0]["id"], json!(1));
    }

    #[test]
    fn test_keyed_binding_with_embedded_dialect() {
        let mut conn = widgets_db();
        let sql = Sql::new(Dialect::Embedded);

        let (insert, params) = sql.insert("widgets", &widget(2, "W-2")).unwrap();
        assert_eq!(insert, "INSERT INTO widgets (id, sku) VALUES (:id, :sku)");
        conn.execute(&insert, &params).unwrap();

        let rows = conn
            .query("SELECT sku FROM widgets", &Params::empty())
            .unwrap();
        assert_eq!(rows[0]["sku"], json!("W-2"));
    }

    #[test]
    fn test_rollback_leaves_connection_usable() {
        let mut conn = widgets_db();
        let sql = Sql::new(Dialect::Sqlite);

        conn.begin().unwrap();
        let (insert, params) = sql.insert("widgets", &widget(3, "W-3")).unwrap();
        conn.execute(&insert, &params).unwrap();
        conn.rollback().unwrap();

        let rows = conn
            .query("SELECT * FROM widgets", &Params::empty())
            .unwrap();
        assert!(rows.is_empty());

        // still usable after rollback
        conn.begin().unwrap();
        conn.execute(&insert, &params).unwrap();
        conn.commit().unwrap();
        let rows = conn
            .query("SELECT * FROM widgets", &Params::empty())
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_null_and_numeric_round_trip() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE t (a, b, c)").unwrap();
        conn.execute(
            "INSERT INTO t (a, b, c) VALUES (?, ?, ?)",
            &Params::Positional(vec![json!(null), json!(1.5), json!(true)]),
        )
        .unwrap();
        let rows = conn.query("SELECT * FROM t", &Params::empty()).unwrap();
        assert_eq!(rows[0]["a"], json!(null));
        assert_eq!(rows[0]["b"], json!(1.5));
        assert_eq!(rows[0]["c"], json!(1));
    }
}
