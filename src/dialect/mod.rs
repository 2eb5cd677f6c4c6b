//! SQL dialect definitions and binding rules.
//!
//! Each dialect is a value-like constant describing how the compiler
//! must emit placeholders and treat LIKE patterns:
//!
//! | Dialect | Placeholder | IN limit | Backslash escapes |
//! |------------|-------------|----------|-------------------|
//! | Sqlite     | `?`         | none     | no                |
//! | PostgreSQL | `%s`        | none     | yes               |
//! | MySQL      | `%s`        | none     | yes               |
//! | Oracle     | `:name`     | 1000     | no                |
//!
//! PostgreSQL and MySQL share a placeholder but stay separate members
//! so dialect-specific behaviour can diverge later.

/// Placeholder emission style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Positional `?` (SQLite, ODBC-style drivers).
    Question,
    /// Positional `%s` (psycopg, PyMySQL-style drivers).
    Percent,
    /// Named `:name` (Oracle-style drivers).
    Named,
}

impl PlaceholderStyle {
    /// Literal text emitted for one positional parameter site.
    /// Named placeholders are derived from the parameter name instead.
    pub fn positional_text(self) -> &'static str {
        match self {
            PlaceholderStyle::Question => "?",
            PlaceholderStyle::Percent => "%s",
            PlaceholderStyle::Named => ":name",
        }
    }

    pub fn is_named(self) -> bool {
        self == PlaceholderStyle::Named
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    PostgreSql,
    MySql,
    Oracle,
}

impl Dialect {
    /// Stable identifier, used for dialect-specific template files.
    pub fn id(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Oracle => "oracle",
        }
    }

    /// Placeholder style implied by the dialect.
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Dialect::Sqlite => PlaceholderStyle::Question,
            Dialect::PostgreSql | Dialect::MySql => PlaceholderStyle::Percent,
            Dialect::Oracle => PlaceholderStyle::Named,
        }
    }

    /// Maximum number of elements in one `IN (...)` list, where the
    /// engine imposes one. Lists beyond the limit are split into
    /// OR-joined chunks.
    pub fn in_clause_limit(self) -> Option<usize> {
        match self {
            Dialect::Oracle => Some(1000),
            _ => None,
        }
    }

    /// Characters that must be escaped inside a LIKE pattern.
    pub fn like_escape_chars(self) -> &'static [char] {
        &['#', '%', '_']
    }

    /// Escape character emitted in the `ESCAPE '..'` clause.
    pub fn like_escape_char(self) -> char {
        '#'
    }

    /// Whether string literals treat backslash as an escape character.
    pub fn backslash_is_escape(self) -> bool {
        matches!(self, Dialect::PostgreSql | Dialect::MySql)
    }

    pub fn from_id(id: &str) -> Option<Dialect> {
        match id {
            "sqlite" => Some(Dialect::Sqlite),
            "postgresql" => Some(Dialect::PostgreSql),
            "mysql" => Some(Dialect::MySql),
            "oracle" => Some(Dialect::Oracle),
            _ => None,
        }
    }
}

/// Escape LIKE wildcards (`%`, `_`) and the escape character itself.
///
/// The escaped value must be used together with an `ESCAPE` clause:
///
/// ```sql
/// SELECT * FROM t WHERE name LIKE ? escape '#'
/// ```
///
/// Full-width `％` and `＿` are not SQL wildcards and stay untouched
/// (Oracle rejects escape sequences for them with ORA-01424).
pub fn escape_like(value: &str, dialect: Dialect, escape_char: Option<char>) -> String {
    let esc = escape_char.unwrap_or_else(|| dialect.like_escape_char());
    let specials = dialect.like_escape_chars();
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if specials.contains(&ch) {
            out.push(esc);
        }
        out.push(ch);
    }
    out
}
