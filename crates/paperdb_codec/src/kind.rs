//! Declared storage kinds.

use std::fmt;

/// Declared storage kind of a column.
///
/// This is the column's type affinity in the generated DDL, not a promise
/// about what SQLite hands back: a `Numeric` column holding `1800.0`
/// returns the integer `1800`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Whole numbers (and booleans as `0`/`1`).
    Integer,
    /// UTF-8 text.
    Text,
    /// Numeric affinity; used for timestamps and durations.
    Numeric,
    /// Floating point.
    Real,
    /// Raw bytes.
    Blob,
}

impl StorageKind {
    /// Returns the SQL type name used in `CREATE TABLE`.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Numeric => "NUMERIC",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// True for kinds whose working form is a float.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::Numeric | Self::Real)
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}
