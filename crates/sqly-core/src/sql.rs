//! The statement-level interface: build and render queries with one dialect.
//!
//! [`Sql`] binds a [`Dialect`] at construction (there is no ambient default
//! dialect anywhere in the crate) and renders every query it builds with
//! that dialect.

use crate::builder::Q;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::query::{render, ParamSet, Params, Query};
use crate::statements;

/// Builds and renders SELECT/INSERT/UPDATE/DELETE/UPSERT statements for a
/// fixed dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sql {
    dialect: Dialect,
}

impl Sql {
    /// Creates an interface that renders all queries with `dialect`.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect this interface renders with.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Renders an arbitrary query template with the given data.
    pub fn query(&self, template: impl Into<Query>, data: &ParamSet) -> Result<(String, Params)> {
        render(self.dialect, &template.into(), data)
    }

    /// Renders `SELECT fields FROM relation WHERE <all data keys>`, or all
    /// columns if `fields` is empty. `filter_keys` defaults to every key in
    /// `data` when empty.
    pub fn select(
        &self,
        relation: &str,
        fields: &[&str],
        data: &ParamSet,
        filter_keys: &[&str],
    ) -> Result<(String, Params)> {
        let filters = filter_clauses(data, filter_keys);
        let template = statements::select(relation, fields, &filters, None, None, None);
        render(self.dialect, &template, data)
    }

    /// Renders an INSERT of every key in `data`, with `RETURNING *` when the
    /// dialect supports it.
    pub fn insert(&self, relation: &str, data: &ParamSet) -> Result<(String, Params)> {
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        let template = self.returning(statements::insert(relation, &keys));
        render(self.dialect, &template, data)
    }

    /// Renders an UPDATE of every key in `data` filtered by `filter_keys`
    /// (every key when empty), with `RETURNING *` when supported.
    pub fn update(
        &self,
        relation: &str,
        data: &ParamSet,
        filter_keys: &[&str],
    ) -> Result<(String, Params)> {
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        let filters = filter_clauses(data, filter_keys);
        let template = self.returning(statements::update(relation, &keys, &filters));
        render(self.dialect, &template, data)
    }

    /// Renders a DELETE filtered by `filter_keys` (every key when empty),
    /// with `RETURNING *` when supported.
    pub fn delete(
        &self,
        relation: &str,
        data: &ParamSet,
        filter_keys: &[&str],
    ) -> Result<(String, Params)> {
        let filters = filter_clauses(data, filter_keys);
        let template = self.returning(statements::delete(relation, &filters));
        render(self.dialect, &template, data)
    }

    /// Renders an INSERT .. ON CONFLICT upsert keyed on `key_fields`:
    /// conflicting rows get every non-key field updated from `EXCLUDED`.
    pub fn upsert(
        &self,
        relation: &str,
        data: &ParamSet,
        key_fields: &[&str],
    ) -> Result<(String, Params)> {
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        let updates = Q::keys(&keys, key_fields)
            .iter()
            .map(|key| format!("{key} = EXCLUDED.{key}"))
            .collect::<Vec<_>>()
            .join(", ");
        let template = self.returning(Query::List(vec![
            statements::insert(relation, &keys),
            Query::from(format!("ON CONFLICT ({}) DO UPDATE", Q::fields(key_fields))),
            Query::from(format!("SET {updates}")),
        ]));
        render(self.dialect, &template, data)
    }

    fn returning(&self, template: Query) -> Query {
        if self.dialect.supports_returning() {
            Query::List(vec![template, Query::from("RETURNING *")])
        } else {
            template
        }
    }
}

/// One `key = :key` clause per filter key, or per data key when none given.
fn filter_clauses(data: &ParamSet, filter_keys: &[&str]) -> Vec<String> {
    if filter_keys.is_empty() {
        data.keys().map(|key| Q::filter(key, "=")).collect()
    } else {
        filter_keys.iter().map(|key| Q::filter(key, "=")).collect()
    }
}
