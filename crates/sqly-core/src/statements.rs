//! Basic CRUD statement templates.
//!
//! Each function assembles SQL keywords and [`Q`](crate::builder::Q)
//! fragments into a [`Query`] template, prior to dialect rendering. The
//! function names are capitalized in spirit only: they construct SQL strings
//! for the statements of the same names.

use crate::builder::Q;
use crate::query::Query;

/// `SELECT fields FROM relation [WHERE filters] [ORDER BY ..] [LIMIT ..] [OFFSET ..]`.
#[must_use]
pub fn select(
    relation: &str,
    fields: &[&str],
    filters: &[String],
    orderby: Option<&str>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Query {
    let fields = if fields.is_empty() { &["*"][..] } else { fields };
    let mut query = vec![
        Query::from(format!("SELECT {}", Q::fields(fields))),
        Query::from(format!("FROM {relation}")),
    ];
    if !filters.is_empty() {
        query.push(Query::from(format!("WHERE {}", filters.join(" AND "))));
    }
    if let Some(orderby) = orderby {
        query.push(Query::from(format!("ORDER BY {orderby}")));
    }
    if let Some(limit) = limit {
        query.push(Query::from(format!("LIMIT {limit}")));
    }
    if let Some(offset) = offset {
        query.push(Query::from(format!("OFFSET {offset}")));
    }
    Query::List(query)
}

/// `INSERT INTO relation (fields) VALUES (params)`.
#[must_use]
pub fn insert<S: AsRef<str>>(relation: &str, keys: &[S]) -> Query {
    Query::List(vec![
        Query::from(format!("INSERT INTO {relation}")),
        Query::from(format!("({})", Q::fields(keys))),
        Query::from(format!("VALUES ({})", Q::params(keys))),
    ])
}

/// `UPDATE relation SET assigns WHERE filters`.
#[must_use]
pub fn update<S: AsRef<str>>(relation: &str, keys: &[S], filters: &[String]) -> Query {
    Query::List(vec![
        Query::from(format!("UPDATE {relation}")),
        Query::from(format!("SET {}", Q::assigns(keys))),
        Query::from(format!("WHERE {}", filters.join(" AND "))),
    ])
}

/// `DELETE FROM relation WHERE filters`.
#[must_use]
pub fn delete(relation: &str, filters: &[String]) -> Query {
    Query::List(vec![
        Query::from(format!("DELETE FROM {relation}")),
        Query::from(format!("WHERE {}", filters.join(" AND "))),
    ])
}
