//! CLI command implementations.

pub mod entities;
pub mod init;
pub mod inspect;
pub mod queue;
pub mod settings;

use thiserror::Error;

/// Errors in command arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// A `--match` argument is not `key=value`.
    #[error("invalid match {0:?}: expected key=value")]
    InvalidMatch(String),

    /// A value is not JSON.
    #[error("invalid JSON for {key}: {message}")]
    InvalidJson {
        /// What the value was for.
        key: String,
        /// Parser message.
        message: String,
    },
}

/// Prints a JSON value, pretty.
pub fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
