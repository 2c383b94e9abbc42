//! Live connections and the value bridge to the driver.

use crate::error::StorageResult;
use crate::statement::Statement;
use paperdb_codec::RawValue;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeSet;
use std::time::Duration;

/// SQLite journal mode applied to file databases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead log. Readers do not block the writer.
    #[default]
    Wal,
    /// Classic rollback journal.
    Delete,
}

impl JournalMode {
    fn pragma(self) -> &'static str {
        match self {
            Self::Wal => "PRAGMA journal_mode = WAL;",
            Self::Delete => "PRAGMA journal_mode = DELETE;",
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Journal mode for file databases. Ignored in memory.
    pub journal_mode: JournalMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            journal_mode: JournalMode::Wal,
        }
    }
}

impl ConnectionConfig {
    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the journal mode.
    #[must_use]
    pub const fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}

/// One open connection.
///
/// A session is created per top-level store operation and shared by every
/// statement of a cascade, then dropped. Each statement commits on its own.
#[derive(Debug)]
pub struct Session {
    conn: Connection,
}

impl Session {
    pub(crate) fn configure(
        conn: Connection,
        config: &ConnectionConfig,
        file_backed: bool,
    ) -> StorageResult<Self> {
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if file_backed {
            conn.execute_batch(config.journal_mode.pragma())?;
        }
        Ok(Self { conn })
    }

    /// Runs a statement that returns no rows.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the statement.
    pub fn execute(&self, statement: &Statement) -> StorageResult<usize> {
        tracing::trace!(sql = statement.sql(), "execute");
        let params = statement.params().iter().map(to_sql);
        let changed = self
            .conn
            .execute(statement.sql(), params_from_iter(params))?;
        Ok(changed)
    }

    /// Runs a query and collects every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the statement.
    pub fn query(&self, statement: &Statement) -> StorageResult<Vec<Vec<RawValue>>> {
        tracing::trace!(sql = statement.sql(), "query");
        let mut prepared = self.conn.prepare(statement.sql())?;
        let width = prepared.column_count();
        let params = statement.params().iter().map(to_sql);
        let mut rows = prepared.query(params_from_iter(params))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(from_sql(row.get_ref(index)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    /// Runs a query and returns its first column.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the statement.
    pub fn query_column(&self, statement: &Statement) -> StorageResult<Vec<RawValue>> {
        Ok(self
            .query(statement)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Runs literal SQL with no parameters, such as DDL.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the SQL.
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        tracing::trace!(sql, "execute batch");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Names of all user tables in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn table_names(&self) -> StorageResult<BTreeSet<String>> {
        let mut prepared = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = prepared
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(names)
    }

    /// Number of rows in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is invalid or missing.
    pub fn row_count(&self, table: &str) -> StorageResult<i64> {
        let statement = crate::statement::count(table)?;
        let count = self
            .conn
            .query_row(statement.sql(), [], |row| row.get::<_, i64>(0))?;
        Ok(count)
    }
}

fn to_sql(value: &RawValue) -> SqlValue {
    match value {
        RawValue::Null => SqlValue::Null,
        RawValue::Integer(v) => SqlValue::Integer(*v),
        RawValue::Real(v) => SqlValue::Real(*v),
        RawValue::Text(v) => SqlValue::Text(v.clone()),
        RawValue::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(v) => RawValue::Integer(v),
        ValueRef::Real(v) => RawValue::Real(v),
        ValueRef::Text(v) => RawValue::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => RawValue::Blob(v.to_vec()),
    }
}
