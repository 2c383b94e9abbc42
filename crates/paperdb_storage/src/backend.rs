//! Storage backend trait definition.

use crate::connection::Session;
use crate::error::StorageResult;

/// A source of database connections.
///
/// Backends do not interpret the schema; they only know how to open a
/// correctly configured connection to one database.
///
/// # Invariants
///
/// - Every [`Session`] returned by `connect` sees the same database
/// - Sessions are independent: dropping one never affects another
/// - Foreign key enforcement is on for every session
/// - Backends must be `Send + Sync` so one store can serve many threads
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait SqlBackend: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    fn connect(&self) -> StorageResult<Session>;

    /// Human readable location of the database, for logs.
    fn location(&self) -> String;
}
