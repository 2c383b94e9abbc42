//! # PaperDB Storage
//!
//! Connection layer between the PaperDB engine and SQLite.
//!
//! Backends hand out [`Session`]s: one live connection each, opened for a
//! single operation (or one cascade) and dropped afterwards. Statements are
//! produced by the builder in [`statement`], which is the only place SQL
//! text is assembled; every value travels as a bound parameter.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Shared-cache in-memory database, for tests
//! - [`FileBackend`] - Database file on disk
//!
//! ## Example
//!
//! ```rust
//! use paperdb_codec::RawValue;
//! use paperdb_storage::statement::{self, Criteria};
//! use paperdb_storage::{InMemoryBackend, SqlBackend};
//!
//! let backend = InMemoryBackend::new().unwrap();
//! let session = backend.connect().unwrap();
//! session.execute_batch("CREATE TABLE notes (id INTEGER, body TEXT);").unwrap();
//!
//! let insert = statement::insert("notes", &[("id", 1.into()), ("body", "hi".into())]).unwrap();
//! session.execute(&insert).unwrap();
//!
//! let select = statement::select("notes", &["id", "body"], &Criteria::All, &[]).unwrap();
//! let rows = session.query(&select).unwrap();
//! assert_eq!(rows[0][1], RawValue::Text("hi".into()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod connection;
mod error;
mod file;
mod memory;
pub mod statement;

pub use backend::SqlBackend;
pub use connection::{ConnectionConfig, JournalMode, Session};
pub use error::{ConstraintKind, StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
