//! Parameterized statement builder.
//!
//! All SQL issued against entity tables is assembled here. Table and column
//! names must be plain identifiers; values are always bound as positional
//! parameters, never spliced into the text.

use crate::error::{StorageError, StorageResult};
use paperdb_codec::RawValue;
use std::fmt::Write;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<RawValue>,
}

impl Statement {
    /// The SQL text with `?N` placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Values bound to the placeholders, in order.
    #[must_use]
    pub fn params(&self) -> &[RawValue] {
        &self.params
    }
}

/// A caller-written filter appended after `FROM <table>`.
///
/// The clause may use `?1`, `?2`, ... placeholders for the bound values.
/// Used for queries the exact-match form cannot express, such as range
/// filters, explicit ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFilter {
    clause: String,
    params: Vec<RawValue>,
}

impl RawFilter {
    /// Creates a filter from a clause such as `WHERE expires < ?1`.
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next placeholder.
    #[must_use]
    pub fn bind(mut self, value: impl Into<RawValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// The clause text.
    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// The bound values.
    #[must_use]
    pub fn params(&self) -> &[RawValue] {
        &self.params
    }
}

/// Which rows a query addresses.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Criteria {
    /// Every row, in the table's default order.
    #[default]
    All,
    /// Rows whose columns equal every given value, in default order.
    /// A null value matches `IS NULL`.
    Exact(Vec<(String, RawValue)>),
    /// A raw filter. Default ordering is not applied.
    Filter(RawFilter),
}

impl Criteria {
    /// Builds an exact match from column/value pairs.
    pub fn exact<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self::Exact(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// True for [`Criteria::All`] and for an empty exact match.
    #[must_use]
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Exact(pairs) => pairs.is_empty(),
            Self::Filter(_) => false,
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on a column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending order on a column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Fails unless `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// # Errors
///
/// Returns [`StorageError::InvalidIdentifier`] for anything else.
pub fn check_identifier(name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

/// `SELECT <columns> FROM <table>` narrowed by `criteria`.
///
/// # Errors
///
/// Returns an error if a table or column name is not an identifier.
pub fn select(
    table: &str,
    columns: &[&str],
    criteria: &Criteria,
    default_order: &[OrderBy],
) -> StorageResult<Statement> {
    check_identifier(table)?;
    for column in columns {
        check_identifier(column)?;
    }

    let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
    let mut params = Vec::new();
    match criteria {
        Criteria::All => {}
        Criteria::Exact(pairs) => {
            where_clause(&mut sql, &mut params, pairs)?;
        }
        Criteria::Filter(filter) => {
            sql.push(' ');
            sql.push_str(filter.clause());
            params.extend(filter.params().iter().cloned());
            return Ok(Statement { sql, params });
        }
    }
    order_clause(&mut sql, default_order)?;
    Ok(Statement { sql, params })
}

/// `SELECT <column> FROM <table>`, unordered.
///
/// # Errors
///
/// Returns an error if a name is not an identifier.
pub fn select_column(table: &str, column: &str) -> StorageResult<Statement> {
    check_identifier(table)?;
    check_identifier(column)?;
    Ok(Statement {
        sql: format!("SELECT {column} FROM {table}"),
        params: Vec::new(),
    })
}

/// `SELECT COUNT(*) FROM <table>`.
///
/// # Errors
///
/// Returns an error if the table name is not an identifier.
pub fn count(table: &str) -> StorageResult<Statement> {
    check_identifier(table)?;
    Ok(Statement {
        sql: format!("SELECT COUNT(*) FROM {table}"),
        params: Vec::new(),
    })
}

/// `SELECT COUNT(*) FROM <table> WHERE <column> = ?1`.
///
/// # Errors
///
/// Returns an error if a name is not an identifier.
pub fn count_equal(table: &str, column: &str, value: &RawValue) -> StorageResult<Statement> {
    check_identifier(table)?;
    let mut sql = format!("SELECT COUNT(*) FROM {table}");
    let mut params = Vec::new();
    where_clause(&mut sql, &mut params, &[(column, value.clone())])?;
    Ok(Statement { sql, params })
}

/// `INSERT INTO <table> (...) VALUES (...)`.
///
/// # Errors
///
/// Returns an error if a name is not an identifier or no columns are given.
pub fn insert<S: AsRef<str>>(table: &str, values: &[(S, RawValue)]) -> StorageResult<Statement> {
    check_identifier(table)?;
    if values.is_empty() {
        return Err(StorageError::InvalidIdentifier(format!(
            "{table}: insert with no columns"
        )));
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (index, (column, value)) in values.iter().enumerate() {
        check_identifier(column.as_ref())?;
        columns.push(column.as_ref());
        placeholders.push(format!("?{}", index + 1));
        params.push(value.clone());
    }

    Ok(Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// `UPDATE <table> SET ... WHERE <key>`.
///
/// # Errors
///
/// Returns an error if a name is not an identifier or either list is empty.
pub fn update<S: AsRef<str>, K: AsRef<str>>(
    table: &str,
    assignments: &[(S, RawValue)],
    key: &[(K, RawValue)],
) -> StorageResult<Statement> {
    check_identifier(table)?;
    if assignments.is_empty() || key.is_empty() {
        return Err(StorageError::InvalidIdentifier(format!(
            "{table}: update needs assignments and a key"
        )));
    }

    let mut sql = format!("UPDATE {table} SET ");
    let mut params = Vec::with_capacity(assignments.len() + key.len());
    for (index, (column, value)) in assignments.iter().enumerate() {
        check_identifier(column.as_ref())?;
        if index > 0 {
            sql.push_str(", ");
        }
        params.push(value.clone());
        let _ = write!(sql, "{} = ?{}", column.as_ref(), params.len());
    }
    where_clause(&mut sql, &mut params, key)?;
    Ok(Statement { sql, params })
}

/// `DELETE FROM <table> WHERE <key>`.
///
/// # Errors
///
/// Returns an error if a name is not an identifier or the key is empty.
pub fn delete<K: AsRef<str>>(table: &str, key: &[(K, RawValue)]) -> StorageResult<Statement> {
    check_identifier(table)?;
    if key.is_empty() {
        return Err(StorageError::InvalidIdentifier(format!(
            "{table}: delete needs a key"
        )));
    }
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::with_capacity(key.len());
    where_clause(&mut sql, &mut params, key)?;
    Ok(Statement { sql, params })
}

fn where_clause<K: AsRef<str>>(
    sql: &mut String,
    params: &mut Vec<RawValue>,
    pairs: &[(K, RawValue)],
) -> StorageResult<()> {
    for (index, (column, value)) in pairs.iter().enumerate() {
        let column = column.as_ref();
        check_identifier(column)?;
        sql.push_str(if index == 0 { " WHERE " } else { " AND " });
        if value.is_null() {
            let _ = write!(sql, "{column} IS NULL");
        } else {
            params.push(value.clone());
            let _ = write!(sql, "{column} = ?{}", params.len());
        }
    }
    Ok(())
}

fn order_clause(sql: &mut String, order: &[OrderBy]) -> StorageResult<()> {
    for (index, term) in order.iter().enumerate() {
        check_identifier(&term.column)?;
        sql.push_str(if index == 0 { " ORDER BY " } else { ", " });
        sql.push_str(&term.column);
        sql.push_str(if term.descending { " DESC" } else { " ASC" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(check_identifier("user_id").is_ok());
        assert!(check_identifier("_x9").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("9lives").is_err());
        assert!(check_identifier("name; DROP TABLE users").is_err());
        assert!(check_identifier("a-b").is_err());
    }

    #[test]
    fn select_all_uses_default_order() {
        let stmt = select(
            "images",
            &["id", "created"],
            &Criteria::All,
            &[OrderBy::desc("created")],
        )
        .unwrap();
        assert_eq!(stmt.sql(), "SELECT id, created FROM images ORDER BY created DESC");
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn select_exact_binds_values_and_nulls() {
        let criteria = Criteria::exact([("username", RawValue::from("alice")), ("given_name", RawValue::Null)]);
        let stmt = select("users", &["id"], &criteria, &[OrderBy::asc("id")]).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT id FROM users WHERE username = ?1 AND given_name IS NULL ORDER BY id ASC"
        );
        assert_eq!(stmt.params(), &[RawValue::Text("alice".into())]);
    }

    #[test]
    fn select_filter_is_appended_verbatim() {
        let filter = RawFilter::new("WHERE expires < ?1 ORDER BY expires").bind(10.5);
        let stmt = select("tokens", &["token"], &Criteria::Filter(filter), &[OrderBy::asc("id")]).unwrap();
        assert_eq!(stmt.sql(), "SELECT token FROM tokens WHERE expires < ?1 ORDER BY expires");
        assert_eq!(stmt.params(), &[RawValue::Real(10.5)]);
    }

    #[test]
    fn select_rejects_hostile_column() {
        let criteria = Criteria::exact([("1=1 OR name", RawValue::from(1))]);
        assert!(select("users", &["id"], &criteria, &[]).is_err());
    }

    #[test]
    fn insert_numbers_placeholders() {
        let stmt = insert("users", &[("id", RawValue::from(3)), ("username", "bob".into())]).unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO users (id, username) VALUES (?1, ?2)");
        assert_eq!(stmt.params().len(), 2);
    }

    #[test]
    fn update_continues_numbering_into_key() {
        let stmt = update(
            "users",
            &[("username", RawValue::from("bob")), ("given_name", RawValue::Null)],
            &[("id", RawValue::from(3))],
        )
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE users SET username = ?1, given_name = ?2 WHERE id = ?3"
        );
        assert_eq!(stmt.params()[2], RawValue::Integer(3));
    }

    #[test]
    fn delete_requires_a_key() {
        let empty: [(&str, RawValue); 0] = [];
        assert!(delete("users", &empty).is_err());
        let stmt = delete("tokens", &[("user_id", RawValue::from(1)), ("token", "t".into())]).unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM tokens WHERE user_id = ?1 AND token = ?2");
    }

    #[test]
    fn count_equal_binds_value() {
        let stmt = count_equal("users", "username", &RawValue::from("a")).unwrap();
        assert_eq!(stmt.sql(), "SELECT COUNT(*) FROM users WHERE username = ?1");
    }

    #[test]
    fn empty_exact_is_all() {
        assert!(Criteria::exact(Vec::<(String, RawValue)>::new()).is_all());
        assert!(!Criteria::Filter(RawFilter::new("LIMIT 1")).is_all());
    }
}
