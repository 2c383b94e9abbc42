//! # PaperDB Core
//!
//! Schema-driven persistence engine for PaperDB.
//!
//! One generic engine persists every entity type declared in a
//! [`SchemaRegistry`]. Each type is described by data: its columns, their
//! storage kinds and flags, its parent/child relationships and its seed
//! rows. From that description the engine derives:
//! - Table DDL, created on first open
//! - Value validation and conversion between working and raw forms
//! - Unique id and token generation
//! - Encryption at rest for password columns
//! - Cascading save and delete across owned children
//!
//! ## Example
//!
//! ```rust
//! use paperdb_core::{Config, Match, Store};
//! use serde_json::json;
//!
//! let store = Store::open(Config::default()).unwrap();
//!
//! let values = json!({"username": "alice", "password": "Sup3r-secret"});
//! let alice = store.create("user", values.as_object().unwrap().clone()).unwrap();
//! assert!(alice.exists());
//!
//! let found = store.get("user", &Match::exact([("username", json!("alice"))])).unwrap();
//! assert_eq!(found.one().unwrap().get("username"), Some(&json!("alice")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod convert;
pub mod crypto;
pub mod entity;
mod error;
mod generator;
mod password;
mod query;
pub mod schema;
pub mod settings;
mod store;

pub use config::Config;
pub use entity::{EntityHooks, EntityInstance, Fetched};
pub use error::{CoreError, CoreResult, ValidationFailure};
pub use password::PasswordPolicy;
pub use query::Match;
pub use schema::{
    Cardinality, ColumnDescriptor, EntityKind, EntityTypeDescriptor, Generator, Ownership,
    RelationshipDescriptor, SchemaRegistry, TokenArgs,
};
pub use settings::Settings;
pub use store::Store;

pub use paperdb_codec::{RawValue, StorageKind};
pub use paperdb_storage::statement::{OrderBy, RawFilter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
