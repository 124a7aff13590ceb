//! The minimal synchronous connection capability the core is written against.
//!
//! The core never opens, pools, or closes connections; a caller owns the
//! connection object and passes it in. Asynchronous drivers are bridged by an
//! external adapter layer that fully resolves each operation before returning
//! to the core, so no two statements ever overlap on one connection.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;
use crate::query::Params;

/// One result row: column names mapped to values.
pub type Row = BTreeMap<String, Value>;

/// A synchronous database connection.
///
/// Implementations wrap a concrete driver (see the `sqly-sqlite` crate for
/// the bundled SQLite adapter) and translate between [`Params`] containers
/// and driver-native bind values.
pub trait Connection {
    /// Executes one statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64>;

    /// Executes one statement and materializes every result row.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Runs a multi-statement script with no parameters, e.g. migration DDL.
    fn execute_script(&mut self, sql: &str) -> Result<()>;

    /// Opens a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commits the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction, leaving the connection usable.
    fn rollback(&mut self) -> Result<()>;
}
