//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Which table constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `UNIQUE` or `PRIMARY KEY`.
    Unique,
    /// `REFERENCES ...`.
    ForeignKey,
    /// `NOT NULL`.
    NotNull,
    /// `CHECK (...)`.
    Check,
    /// Any other constraint.
    Other,
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database stayed locked past the busy timeout.
    #[error("database busy: {message}")]
    Busy {
        /// Driver message.
        message: String,
    },

    /// A table constraint rejected the statement.
    #[error("{kind:?} constraint violated: {message}")]
    Constraint {
        /// Which constraint fired.
        kind: ConstraintKind,
        /// Driver message.
        message: String,
    },

    /// A table or column name is not a plain SQL identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Any other driver failure.
    #[error("sqlite error: {0}")]
    Sqlite(String),
}

impl StorageError {
    /// True when retrying the same statement later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Returns the constraint kind if this is a constraint failure.
    pub fn constraint(&self) -> Option<ConstraintKind> {
        match self {
            Self::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Busy {
                    message: err.to_string(),
                },
                ErrorCode::ConstraintViolation => {
                    let kind = match failure.extended_code {
                        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                            ConstraintKind::Unique
                        }
                        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
                        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
                        _ => ConstraintKind::Other,
                    };
                    Self::Constraint {
                        kind,
                        message: err.to_string(),
                    }
                }
                _ => Self::Sqlite(err.to_string()),
            },
            _ => Self::Sqlite(err.to_string()),
        }
    }
}
