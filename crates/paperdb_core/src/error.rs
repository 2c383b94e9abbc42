//! Error types for PaperDB core.

use paperdb_storage::{ConstraintKind, StorageError};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Why a value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The value has the wrong type for the column.
    TypeMismatch,
    /// Null given for a column that requires a value.
    NullViolation,
    /// Another row already holds the value of a unique column.
    Duplicate,
    /// A password does not satisfy the current password policy.
    PasswordPolicy,
    /// The column does not exist on the entity type.
    UnknownColumn,
    /// A match criterion cannot be expressed against stored values.
    InvalidMatch,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TypeMismatch => "type mismatch",
            Self::NullViolation => "null violation",
            Self::Duplicate => "duplicate value",
            Self::PasswordPolicy => "password policy violation",
            Self::UnknownColumn => "unknown column",
            Self::InvalidMatch => "invalid match",
        };
        f.write_str(text)
    }
}

/// Errors that can occur in PaperDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Value encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] paperdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value was rejected by its column.
    #[error("{entity}.{column}: {reason}: {detail}")]
    Validation {
        /// Entity type name.
        entity: String,
        /// Column key.
        column: String,
        /// Failure class.
        reason: ValidationFailure,
        /// Human readable detail.
        detail: String,
    },

    /// A point lookup matched no row.
    #[error("{entity} not found: {criteria}")]
    NotFound {
        /// Entity type name.
        entity: String,
        /// The criteria that matched nothing.
        criteria: String,
    },

    /// No entity type is registered under this name.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// The name that failed to resolve.
        name: String,
    },

    /// The registry describes an impossible schema.
    #[error("invalid schema: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// Encryption or decryption failed.
    #[error("encryption error: {message}")]
    Encryption {
        /// Description of the failure.
        message: String,
    },

    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(
        entity: impl Into<String>,
        column: impl Into<String>,
        reason: ValidationFailure,
        detail: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity: entity.into(),
            column: column.into(),
            reason,
            detail: detail.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            criteria: criteria.into(),
        }
    }

    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// The validation failure class, if this is a validation error.
    pub fn validation_failure(&self) -> Option<ValidationFailure> {
        match self {
            Self::Validation { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// True for validation errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// True for not found errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_retryable())
    }

    /// Maps a failed row write on `entity`.
    ///
    /// Unique and primary key constraint failures become
    /// [`ValidationFailure::Duplicate`] on the offending column.
    pub(crate) fn from_write(entity: &str, err: StorageError) -> Self {
        match &err {
            StorageError::Constraint {
                kind: ConstraintKind::Unique,
                message,
            } => {
                let column = constrained_column(message).unwrap_or("*");
                Self::validation(entity, column, ValidationFailure::Duplicate, message.clone())
            }
            StorageError::Constraint {
                kind: ConstraintKind::NotNull,
                message,
            } => {
                let column = constrained_column(message).unwrap_or("*");
                Self::validation(entity, column, ValidationFailure::NullViolation, message.clone())
            }
            _ => Self::Storage(err),
        }
    }
}

/// Pulls `column` out of driver text such as
/// `UNIQUE constraint failed: users.username`.
fn constrained_column(message: &str) -> Option<&str> {
    let (_, tail) = message.rsplit_once("failed: ")?;
    let first = tail.split(',').next()?.trim();
    first.rsplit_once('.').map(|(_, column)| column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_write_failure_names_the_column() {
        let err = CoreError::from_write(
            "user",
            StorageError::Constraint {
                kind: ConstraintKind::Unique,
                message: "UNIQUE constraint failed: users.username".into(),
            },
        );
        match err {
            CoreError::Validation { column, reason, .. } => {
                assert_eq!(column, "username");
                assert_eq!(reason, ValidationFailure::Duplicate);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_write_failures_stay_storage() {
        let err = CoreError::from_write(
            "tag",
            StorageError::Constraint {
                kind: ConstraintKind::ForeignKey,
                message: "FOREIGN KEY constraint failed".into(),
            },
        );
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn busy_is_retryable() {
        let err = CoreError::from(StorageError::Busy {
            message: "database is locked".into(),
        });
        assert!(err.is_retryable());
        assert!(!CoreError::not_found("user", "id = 1").is_retryable());
    }
}
