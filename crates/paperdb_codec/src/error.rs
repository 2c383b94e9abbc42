//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding stored values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to serialize a value to JSON.
    #[error("JSON encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to parse stored JSON.
    #[error("JSON decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Stored bytes are not valid UTF-8.
    #[error("invalid UTF-8 in stored value")]
    InvalidUtf8,

    /// The stored value has a storage class the column cannot hold.
    #[error("unexpected storage class: expected {expected}, found {found}")]
    UnexpectedKind {
        /// Storage class the caller asked for.
        expected: &'static str,
        /// Storage class actually found.
        found: &'static str,
    },

    /// A timestamp is outside the representable range.
    #[error("timestamp out of range: {seconds}")]
    TimestampOutOfRange {
        /// The offending epoch seconds, rendered as text.
        seconds: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an unexpected storage class error.
    pub fn unexpected_kind(expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedKind { expected, found }
    }
}
