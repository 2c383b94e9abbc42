//! # PaperDB Testkit
//!
//! Test utilities for PaperDB.
//!
//! This crate provides:
//! - Throwaway stores backed by a temp file or shared memory
//! - Property-based test generators using proptest
//!
//! The cross-crate property and scenario suites live in `tests/`.
//!
//! ## Usage
//!
//! ```rust
//! use paperdb_testkit::prelude::*;
//! use serde_json::json;
//!
//! with_temp_store(|store| {
//!     let art = store.create("category", object(json!({"name": "Comics"}))).unwrap();
//!     assert!(art.exists());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
