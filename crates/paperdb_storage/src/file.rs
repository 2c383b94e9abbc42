//! File-backed SQLite database.

use crate::backend::SqlBackend;
use crate::connection::{ConnectionConfig, Session};
use crate::error::StorageResult;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// A database file on disk.
///
/// Every call to [`connect`](SqlBackend::connect) opens a fresh connection
/// to the file, so sessions on different threads never share driver state.
/// Contention between them is absorbed by the busy timeout.
///
/// # Example
///
/// ```no_run
/// use paperdb_storage::{FileBackend, SqlBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("paper.db")).unwrap();
/// let session = backend.connect().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    config: ConnectionConfig,
}

impl FileBackend {
    /// Opens or creates a database file with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_config(path, ConnectionConfig::default())
    }

    /// Opens or creates a database file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path, config: ConnectionConfig) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open_with_config(path, config)
    }

    /// Opens or creates a database file with explicit settings.
    ///
    /// The file is opened once here so a bad path fails early.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open_with_config(path: &Path, config: ConnectionConfig) -> StorageResult<Self> {
        let backend = Self {
            path: path.to_path_buf(),
            config,
        };
        drop(backend.connect()?);
        tracing::debug!(path = %path.display(), "opened database file");
        Ok(backend)
    }

    /// Returns the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SqlBackend for FileBackend {
    fn connect(&self) -> StorageResult<Session> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        Session::configure(conn, &self.config, true)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
