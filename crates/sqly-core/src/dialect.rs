//! Definitions for the supported SQL dialects.
//!
//! Each [`Dialect`] is named for the database driver interface it targets and
//! maps to exactly one [`ParamFormat`], the placeholder syntax that driver
//! accepts. All format-conditional logic elsewhere in the crate switches over
//! [`ParamFormat`] (or its positional/keyed split), never over individual
//! dialects, so adding a dialect means adding one variant and one row to each
//! table below.

use std::fmt;
use std::str::FromStr;

use crate::error::SqlyError;

/// The parameter-placeholder syntax a dialect renders queries with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamFormat {
    /// Positional `?` placeholders, one per occurrence.
    Qmark,
    /// Positional `%s` placeholders, one per occurrence.
    Format,
    /// Positional `$1`, `$2`, ... placeholders, numbered per occurrence.
    Numbered,
    /// Keyed `:field` placeholders.
    Named,
    /// Keyed `%(field)s` placeholders.
    Pyformat,
}

impl ParamFormat {
    /// Whether this format uses keyword parameters.
    #[must_use]
    pub const fn is_keyed(self) -> bool {
        matches!(self, Self::Named | Self::Pyformat)
    }

    /// Whether this format uses positional parameters.
    #[must_use]
    pub const fn is_positional(self) -> bool {
        !self.is_keyed()
    }

    /// Whether a literal `%` in the template must be doubled so the driver's
    /// percent-style formatting does not misinterpret it.
    #[must_use]
    pub const fn escapes_percent(self) -> bool {
        matches!(self, Self::Format | Self::Pyformat)
    }
}

/// A supported database dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SQLite through a `?`-positional driver.
    Sqlite,
    /// PostgreSQL through a psycopg-style `%(field)s` driver.
    Psycopg,
    /// PostgreSQL through an asyncpg-style `$n` driver.
    Asyncpg,
    /// MySQL through a `%s`-positional driver.
    Mysql,
    /// Colon-named parameters left as written, for embedded engines and
    /// engines that consume `:field` natively.
    Embedded,
}

impl Dialect {
    /// Every dialect in the registry.
    pub const ALL: [Self; 5] = [
        Self::Sqlite,
        Self::Psycopg,
        Self::Asyncpg,
        Self::Mysql,
        Self::Embedded,
    ];

    /// The parameter format this dialect renders placeholders with.
    #[must_use]
    pub const fn param_format(self) -> ParamFormat {
        match self {
            Self::Sqlite => ParamFormat::Qmark,
            Self::Psycopg => ParamFormat::Pyformat,
            Self::Asyncpg => ParamFormat::Numbered,
            Self::Mysql => ParamFormat::Format,
            Self::Embedded => ParamFormat::Named,
        }
    }

    /// Whether the dialect accepts a `RETURNING *` clause on writes.
    #[must_use]
    pub const fn supports_returning(self) -> bool {
        matches!(self, Self::Psycopg | Self::Asyncpg)
    }

    /// The name of the external driver this dialect targets. Informational
    /// only: the core never loads drivers itself.
    #[must_use]
    pub const fn adaptor_name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Psycopg => "psycopg",
            Self::Asyncpg => "asyncpg",
            Self::Mysql => "mysql",
            Self::Embedded => "embedded",
        }
    }

    /// The registry name of this dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Psycopg => "psycopg",
            Self::Asyncpg => "asyncpg",
            Self::Mysql => "mysql",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "psycopg" => Ok(Self::Psycopg),
            "asyncpg" => Ok(Self::Asyncpg),
            "mysql" => Ok(Self::Mysql),
            "embedded" => Ok(Self::Embedded),
            other => Err(SqlyError::UnknownDialect(other.to_string())),
        }
    }
}
