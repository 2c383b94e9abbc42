//! In-memory SQLite database for testing.

use crate::backend::SqlBackend;
use crate::connection::{ConnectionConfig, Session};
use crate::error::StorageResult;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use uuid::Uuid;

/// A private in-memory database.
///
/// Sessions attach to one shared-cache memory database under a unique
/// name. An anchor connection keeps the database alive for the lifetime
/// of the backend; dropping the backend discards every table.
///
/// Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Example
///
/// ```rust
/// use paperdb_storage::{InMemoryBackend, SqlBackend};
///
/// let backend = InMemoryBackend::new().unwrap();
/// backend.connect().unwrap().execute_batch("CREATE TABLE t (v TEXT);").unwrap();
/// assert!(backend.connect().unwrap().table_names().unwrap().contains("t"));
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    uri: String,
    config: ConnectionConfig,
    _anchor: Mutex<Connection>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn new() -> StorageResult<Self> {
        Self::with_config(ConnectionConfig::default())
    }

    /// Creates a new empty in-memory database with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn with_config(config: ConnectionConfig) -> StorageResult<Self> {
        let uri = format!("file:paperdb-{}?mode=memory&cache=shared", Uuid::new_v4());
        let anchor = open(&uri)?;
        Ok(Self {
            uri,
            config,
            _anchor: Mutex::new(anchor),
        })
    }

    /// Drops every user table.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be dropped.
    pub fn clear(&self) -> StorageResult<()> {
        let session = self.connect()?;
        session.execute_batch("PRAGMA foreign_keys = OFF;")?;
        for table in session.table_names()? {
            session.execute_batch(&format!("DROP TABLE \"{table}\";"))?;
        }
        Ok(())
    }
}

fn open(uri: &str) -> StorageResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Ok(Connection::open_with_flags(uri, flags)?)
}

impl SqlBackend for InMemoryBackend {
    fn connect(&self) -> StorageResult<Session> {
        Session::configure(open(&self.uri)?, &self.config, false)
    }

    fn location(&self) -> String {
        self.uri.clone()
    }
}
