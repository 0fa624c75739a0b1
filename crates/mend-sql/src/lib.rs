//! SQL quoting and naming helpers.
//!
//! Everything the reconciliation engine sends to the store is built from
//! these helpers: identifiers are always double-quoted (so reserved words
//! like `user` or `order` are safe as table names) and literals are always
//! single-quoted with embedded quotes doubled. No caller ever splices a raw
//! table or column name into a statement.

use std::fmt;

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use mend_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use mend_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `user`, `order`, `table`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Generate a standard index name for a table and columns.
///
/// Uses the convention `idx_{table}_{columns}` where columns are joined by
/// underscore, truncated to Postgres' 63-byte identifier limit.
///
/// # Examples
///
/// ```
/// assert_eq!(mend_sql::index_name("users", &["email"]), "idx_users_email");
/// assert_eq!(
///     mend_sql::index_name("orders", &["customer_id", "placed_at"]),
///     "idx_orders_customer_id_placed_at"
/// );
/// ```
pub fn index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    truncate_ident(format!("idx_{}_{}", table, cols.join("_")))
}

/// Generate a standard foreign-key constraint name.
///
/// Uses the convention `fk_{table}_{column}`, truncated to the identifier
/// limit. Deterministic so a re-run of the same plan names constraints
/// identically and the store rejects the duplicate rather than piling up
/// anonymous constraints.
///
/// # Examples
///
/// ```
/// assert_eq!(mend_sql::fk_constraint_name("orders", "customer_id"), "fk_orders_customer_id");
/// ```
pub fn fk_constraint_name(table: &str, column: &str) -> String {
    truncate_ident(format!("fk_{}_{}", table, column))
}

/// Truncate an identifier to Postgres' 63-byte limit without splitting a
/// UTF-8 character.
fn truncate_ident(mut name: String) -> String {
    const PG_IDENT_MAX: usize = 63;
    if name.len() <= PG_IDENT_MAX {
        return name;
    }
    let mut len = PG_IDENT_MAX;
    while len > 0 && !name.is_char_boundary(len) {
        len -= 1;
    }
    name.truncate(len);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_reserved_word() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("users"), "\"users\"");
    }

    #[test]
    fn quote_ident_embedded_quote() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn escape_string_embedded_quote() {
        assert_eq!(escape_string("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn index_name_truncates_to_pg_limit() {
        let long = "a".repeat(80);
        let name = index_name(&long, &["col"]);
        assert!(name.len() <= 63);
        assert!(name.starts_with("idx_"));
    }

    #[test]
    fn fk_constraint_name_is_deterministic() {
        assert_eq!(
            fk_constraint_name("order_items", "order_id"),
            fk_constraint_name("order_items", "order_id"),
        );
    }
}
