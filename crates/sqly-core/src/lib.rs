//! Dialect-aware SQL query construction and parameter rendering.
//!
//! `sqly-core` lets callers write database-agnostic queries with a single
//! named-parameter syntax (`:field`) and render them into the placeholder
//! syntax a target database driver expects, together with correctly-shaped
//! parameter values:
//!
//! ```
//! use serde_json::json;
//! use sqly_core::{Dialect, ParamSet, Sql};
//!
//! let data: ParamSet = [("sku".to_string(), json!("W-1"))].into_iter().collect();
//! let (sql, params) = Sql::new(Dialect::Sqlite)
//!     .query("SELECT * FROM widgets WHERE sku = :sku", &data)
//!     .unwrap();
//! assert_eq!(sql, "SELECT * FROM widgets WHERE sku = ?");
//! assert_eq!(params.len(), 1);
//! ```
//!
//! # Architecture
//!
//! - **[`dialect`]** - The closed registry of supported dialects and their
//!   parameter formats.
//! - **[`query`]** - Query templates and the placeholder renderer.
//! - **[`builder`] / [`statements`]** - Dialect-agnostic fragment and
//!   statement template helpers.
//! - **[`sql`]** - The statement-level interface bound to one dialect.
//! - **[`connection`]** - The synchronous connection capability trait that
//!   driver adapters implement.

pub mod builder;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod query;
pub mod sql;
pub mod statements;

pub use builder::Q;
pub use connection::{Connection, Row};
pub use dialect::{Dialect, ParamFormat};
pub use error::{Result, SqlyError};
pub use query::{render, ParamSet, Params, Query};
pub use sql::Sql;
