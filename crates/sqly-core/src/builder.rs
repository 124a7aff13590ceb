//! Fragment helpers for building dynamic query templates.
//!
//! These helpers assemble field lists, placeholder lists, assignment lists,
//! and filter clauses from field names. They are dialect-agnostic: the
//! placeholders they emit are always colon-style, translated later by the
//! renderer in [`crate::query`].

/// Namespace for query-fragment helpers.
///
/// ```
/// use sqly_core::builder::Q;
///
/// let keys = ["name", "sku"];
/// assert_eq!(
///     format!("INSERT INTO widgets ({}) VALUES ({})", Q::fields(&keys), Q::params(&keys)),
///     "INSERT INTO widgets (name, sku) VALUES (:name, :sku)"
/// );
/// ```
pub struct Q;

impl Q {
    /// A comma-joined field name list: `a, b, c`.
    #[must_use]
    pub fn fields<S: AsRef<str>>(keys: &[S]) -> String {
        keys.iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A comma-joined placeholder list: `:a, :b, :c`.
    #[must_use]
    pub fn params<S: AsRef<str>>(keys: &[S]) -> String {
        keys.iter()
            .map(|key| format!(":{}", key.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A comma-joined assignment list: `a = :a, b = :b`.
    #[must_use]
    pub fn assigns<S: AsRef<str>>(keys: &[S]) -> String {
        Self::joined(keys, "=", ",")
    }

    /// An AND-joined filter list: `a = :a AND b = :b`.
    #[must_use]
    pub fn filters<S: AsRef<str>>(keys: &[S]) -> String {
        Self::joined(keys, "=", " AND")
    }

    /// A single filter clause: `key <op> :key`.
    #[must_use]
    pub fn filter(key: &str, op: &str) -> String {
        format!("{key} {op} :{key}")
    }

    /// The keys of `keys` that are not in `excl`, order preserved.
    #[must_use]
    pub fn keys<'a, S: AsRef<str>>(keys: &'a [S], excl: &[&str]) -> Vec<&'a str> {
        keys.iter()
            .map(AsRef::as_ref)
            .filter(|key| !excl.contains(key))
            .collect()
    }

    fn joined<S: AsRef<str>>(keys: &[S], op: &str, join: &str) -> String {
        keys.iter()
            .map(|key| Self::filter(key.as_ref(), op))
            .collect::<Vec<_>>()
            .join(&format!("{join} "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        assert_eq!(Q::fields(&["id", "name"]), "id, name");
    }

    #[test]
    fn test_params() {
        assert_eq!(Q::params(&["id", "name"]), ":id, :name");
    }

    #[test]
    fn test_assigns() {
        assert_eq!(Q::assigns(&["name", "sku"]), "name = :name, sku = :sku");
    }

    #[test]
    fn test_filters() {
        assert_eq!(Q::filters(&["app", "ts"]), "app = :app AND ts = :ts");
    }

    #[test]
    fn test_filter_with_operator() {
        assert_eq!(Q::filter("ts", ">="), "ts >= :ts");
    }

    #[test]
    fn test_keys_excludes() {
        assert_eq!(Q::keys(&["id", "name", "sku"], &["id"]), vec!["name", "sku"]);
    }
}
