//! Query templates and the dialect-aware parameter renderer.
//!
//! A [`Query`] is a recursive tree of string fragments that flattens to a
//! single SQL string containing `:field` placeholders. [`render`] rewrites
//! that string into a dialect's native placeholder syntax and produces the
//! parameter container shaped the way the dialect's driver expects: a mapping
//! for keyed formats, an ordered sequence for positional formats.
//!
//! A placeholder preceded by a backslash (`\:word`) is a literal escape, not
//! a parameter. For colon-named output the escape is removed again after
//! rendering, so literal colon-words can coexist with real placeholders.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::dialect::{Dialect, ParamFormat};
use crate::error::{Result, SqlyError};

/// The runtime data supplied alongside a query template: placeholder
/// identifiers mapped to their values.
pub type ParamSet = BTreeMap<String, Value>;

/// Matches `:word`, capturing a preceding backslash separately so escaped
/// placeholders can be left untouched.
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\?):(\w+)").expect("placeholder pattern is valid"));

/// Matches an escaped placeholder, for the un-escape pass on colon output.
static ESCAPED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\:(\w+)").expect("escape pattern is valid"));

/// The rendered parameter container. Its shape is determined solely by the
/// dialect's [`ParamFormat`].
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// One entry per distinct field, for keyed formats.
    Keyed(BTreeMap<String, Value>),
    /// One entry per placeholder occurrence, in occurrence order, for
    /// positional formats.
    Positional(Vec<Value>),
}

impl Params {
    /// An empty positional container.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Positional(Vec::new())
    }

    /// The number of parameter entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(map) => map.len(),
            Self::Positional(values) => values.len(),
        }
    }

    /// Whether the container holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The keyed view, if this container is keyed.
    #[must_use]
    pub const fn as_keyed(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Keyed(map) => Some(map),
            Self::Positional(_) => None,
        }
    }

    /// The positional view, if this container is positional.
    #[must_use]
    pub fn as_positional(&self) -> Option<&[Value]> {
        match self {
            Self::Keyed(_) => None,
            Self::Positional(values) => Some(values.as_slice()),
        }
    }
}

/// A query template: an ordered tree of string fragments.
///
/// Strings are always leaves; only [`Query::List`] nodes are recursed into,
/// so flattening never splits a word into characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A single SQL fragment.
    Leaf(String),
    /// An ordered sequence of sub-templates.
    List(Vec<Query>),
}

impl Query {
    /// Flattens the template depth-first into one string, joining leaves
    /// with single spaces. Empty fragments are skipped.
    #[must_use]
    pub fn flatten(&self) -> String {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves.join(" ")
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(text) => {
                if !text.is_empty() {
                    out.push(text);
                }
            }
            Self::List(items) => {
                for item in items {
                    item.collect_leaves(out);
                }
            }
        }
    }

    /// Renders this template for the given dialect. See [`render`].
    pub fn render(&self, dialect: Dialect, data: &ParamSet) -> Result<(String, Params)> {
        render(dialect, self, data)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::Leaf(text.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::Leaf(text)
    }
}

impl From<Vec<Query>> for Query {
    fn from(items: Vec<Query>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<String>> for Query {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Query::Leaf).collect())
    }
}

impl From<&[&str]> for Query {
    fn from(items: &[&str]) -> Self {
        Self::List(items.iter().map(|item| Query::from(*item)).collect())
    }
}

/// Renders a query template and its parameter values for a dialect.
///
/// The template is flattened, scanned left to right for unescaped `:word`
/// placeholders, and rewritten into the dialect's native placeholder
/// spelling. Positional formats get one parameter slot per occurrence
/// (duplicates are never deduplicated); keyed formats get one entry per
/// distinct field. Structured values (arrays, objects) are serialized to
/// JSON text, because most drivers cannot bind composite values directly.
///
/// # Errors
///
/// Returns [`SqlyError::MissingParameter`] if a referenced field is absent
/// from `data`.
pub fn render(dialect: Dialect, template: &Query, data: &ParamSet) -> Result<(String, Params)> {
    let format = dialect.param_format();
    let mut text = template.flatten();

    // Any literal % must be doubled before percent-style placeholders are
    // introduced; the doubled form is what the driver consumes.
    if format.escapes_percent() {
        text = text.replace('%', "%%");
    }

    let mut fields: Vec<String> = Vec::new();
    let rendered = PLACEHOLDER_RE.replace_all(&text, |caps: &Captures| {
        if !caps[1].is_empty() {
            // Escaped: leave the whole match (backslash included) for the
            // un-escape pass below.
            return caps[0].to_string();
        }
        let field = &caps[2];
        if format.is_positional() || !fields.iter().any(|seen| seen == field) {
            fields.push(field.to_string());
        }
        match format {
            ParamFormat::Named => format!(":{field}"),
            ParamFormat::Pyformat => format!("%({field})s"),
            ParamFormat::Qmark => "?".to_string(),
            ParamFormat::Format => "%s".to_string(),
            ParamFormat::Numbered => format!("${}", fields.len()),
        }
    });
    let mut rendered = rendered.trim().to_string();

    // The colon-escape has done its job once rendering is over; colon-named
    // output must carry the literal `:word` unescaped.
    if format == ParamFormat::Named {
        rendered = ESCAPED_RE.replace_all(&rendered, ":$1").into_owned();
    }

    let params = if format.is_keyed() {
        let mut map = BTreeMap::new();
        for field in &fields {
            map.insert(field.clone(), lookup(data, field)?);
        }
        Params::Keyed(map)
    } else {
        let mut values = Vec::with_capacity(fields.len());
        for field in &fields {
            values.push(lookup(data, field)?);
        }
        Params::Positional(values)
    };

    Ok((rendered, params))
}

/// Looks up a field, serializing structured values to JSON text.
fn lookup(data: &ParamSet, field: &str) -> Result<Value> {
    let value = data
        .get(field)
        .ok_or_else(|| SqlyError::MissingParameter(field.to_string()))?;
    Ok(match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(entries: &[(&str, Value)]) -> ParamSet {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_flatten_nested_order_preserving() {
        let template = Query::List(vec![
            Query::from("SELECT *"),
            Query::List(vec![
                Query::from("FROM widgets"),
                Query::List(vec![Query::from("WHERE sku = :sku")]),
            ]),
            Query::from("LIMIT 1"),
        ]);
        assert_eq!(
            template.flatten(),
            "SELECT * FROM widgets WHERE sku = :sku LIMIT 1"
        );
    }

    #[test]
    fn test_flatten_skips_empty_fragments() {
        let template = Query::List(vec![
            Query::from("DELETE FROM widgets"),
            Query::from(""),
            Query::from("WHERE id = :id"),
        ]);
        assert_eq!(template.flatten(), "DELETE FROM widgets WHERE id = :id");
    }

    #[test]
    fn test_render_named_passthrough() {
        let (sql, params) = render(
            Dialect::Embedded,
            &Query::from("SELECT * FROM widgets WHERE sku = :sku"),
            &data(&[("sku", json!("W-1"))]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM widgets WHERE sku = :sku");
        assert_eq!(params.as_keyed().unwrap()["sku"], json!("W-1"));
    }

    #[test]
    fn test_render_qmark_positional() {
        let (sql, params) = render(
            Dialect::Sqlite,
            &Query::from("UPDATE widgets SET sku = :sku WHERE id = :id"),
            &data(&[("sku", json!("W-1")), ("id", json!(7))]),
        )
        .unwrap();
        assert_eq!(sql, "UPDATE widgets SET sku = ? WHERE id = ?");
        assert_eq!(params.as_positional().unwrap(), &[json!("W-1"), json!(7)]);
    }

    #[test]
    fn test_render_numbered() {
        let (sql, params) = render(
            Dialect::Asyncpg,
            &Query::from("SELECT * FROM widgets WHERE id = :id AND sku = :sku"),
            &data(&[("id", json!(7)), ("sku", json!("W-1"))]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM widgets WHERE id = $1 AND sku = $2");
        assert_eq!(params.as_positional().unwrap(), &[json!(7), json!("W-1")]);
    }

    #[test]
    fn test_render_pyformat() {
        let (sql, params) = render(
            Dialect::Psycopg,
            &Query::from("SELECT * FROM widgets WHERE sku = :sku"),
            &data(&[("sku", json!("W-1"))]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM widgets WHERE sku = %(sku)s");
        assert_eq!(params.as_keyed().unwrap()["sku"], json!("W-1"));
    }

    #[test]
    fn test_positional_duplicates_not_deduplicated() {
        let template = Query::from("SELECT * FROM spans WHERE :at >= low AND :at < high");
        let at = json!(42);

        let (sql, params) =
            render(Dialect::Sqlite, &template, &data(&[("at", at.clone())])).unwrap();
        assert_eq!(sql, "SELECT * FROM spans WHERE ? >= low AND ? < high");
        assert_eq!(params.as_positional().unwrap(), &[at.clone(), at.clone()]);

        let (sql, params) =
            render(Dialect::Asyncpg, &template, &data(&[("at", at.clone())])).unwrap();
        assert_eq!(sql, "SELECT * FROM spans WHERE $1 >= low AND $2 < high");
        assert_eq!(params.as_positional().unwrap(), &[at.clone(), at]);
    }

    #[test]
    fn test_keyed_duplicates_deduplicated() {
        let template = Query::from("SELECT * FROM spans WHERE :at >= low AND :at < high");
        for dialect in [Dialect::Embedded, Dialect::Psycopg] {
            let (_, params) = render(dialect, &template, &data(&[("at", json!(42))])).unwrap();
            assert_eq!(params.len(), 1);
        }
    }

    #[test]
    fn test_no_placeholders_empty_container() {
        let (sql, params) = render(
            Dialect::Sqlite,
            &Query::from("SELECT count(*) FROM widgets"),
            &ParamSet::new(),
        )
        .unwrap();
        assert_eq!(sql, "SELECT count(*) FROM widgets");
        assert!(params.is_empty());
    }

    #[test]
    fn test_missing_parameter() {
        let err = render(
            Dialect::Sqlite,
            &Query::from("SELECT * FROM widgets WHERE sku = :sku"),
            &ParamSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SqlyError::MissingParameter(field) if field == "sku"));
    }

    #[test]
    fn test_escaped_placeholder_named_output() {
        let (sql, params) = render(
            Dialect::Embedded,
            &Query::from(r"SELECT '\:notaparam' AS label WHERE sku = :realparam"),
            &data(&[("realparam", json!("W-1"))]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT ':notaparam' AS label WHERE sku = :realparam");
        let keyed = params.as_keyed().unwrap();
        assert_eq!(keyed.len(), 1);
        assert!(keyed.contains_key("realparam"));
    }

    #[test]
    fn test_literal_percent_doubled_for_pyformat() {
        let (sql, params) = render(
            Dialect::Psycopg,
            &Query::from("SELECT * FROM widgets WHERE sku LIKE '%W' AND id = :id"),
            &data(&[("id", json!(7))]),
        )
        .unwrap();
        // The doubled %% is the final escaped form the driver consumes.
        assert_eq!(
            sql,
            "SELECT * FROM widgets WHERE sku LIKE '%%W' AND id = %(id)s"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_structured_values_serialized_to_json_text() {
        let (_, params) = render(
            Dialect::Embedded,
            &Query::from("INSERT INTO widgets (tags) VALUES (:tags)"),
            &data(&[("tags", json!(["a", "b"]))]),
        )
        .unwrap();
        assert_eq!(
            params.as_keyed().unwrap()["tags"],
            json!(r#"["a","b"]"#.to_string())
        );
    }

    #[test]
    fn test_round_trip_each_dialect() {
        let template = Query::from("INSERT INTO w (a, b) VALUES (:a, :b)");
        let values = data(&[("a", json!(1)), ("b", json!("two"))]);
        for dialect in Dialect::ALL {
            let (_, params) = render(dialect, &template, &values).unwrap();
            match params {
                Params::Keyed(map) => {
                    assert_eq!(map["a"], json!(1));
                    assert_eq!(map["b"], json!("two"));
                }
                Params::Positional(list) => {
                    assert_eq!(list, vec![json!(1), json!("two")]);
                }
            }
        }
    }
}
