//! # PaperDB Codec
//!
//! Storage-level value model for PaperDB.
//!
//! This crate knows how values look *inside* the relational store and
//! nothing about schemas, connections or encryption:
//!
//! - [`RawValue`] mirrors the five SQLite storage classes
//! - [`StorageKind`] is the declared kind of a column
//! - [`json`] serializes structured values into text or blob columns
//! - [`timestamp`] produces and formats epoch-second timestamps
//!
//! ## Example
//!
//! ```rust
//! use paperdb_codec::{json, RawValue};
//! use serde_json::json;
//!
//! let raw = json::to_blob(&json!({"paused": true})).unwrap();
//! let back = json::from_raw(&raw).unwrap();
//! assert_eq!(back, json!({"paused": true}));
//! assert!(matches!(raw, RawValue::Blob(_)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod json;
mod kind;
pub mod timestamp;
mod value;

pub use error::{CodecError, CodecResult};
pub use kind::StorageKind;
pub use value::RawValue;
