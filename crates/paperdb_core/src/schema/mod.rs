//! Declarative entity schema.
//!
//! Every persisted entity type is described by an
//! [`EntityTypeDescriptor`]: its columns, relationships, default ordering
//! and seed rows. Descriptors are assembled into a [`SchemaRegistry`] once,
//! validated, and never mutated afterwards.

mod catalog;
mod column;
mod descriptor;
mod registry;
mod relationship;

pub use catalog::{builtin, TOKEN_ALPHABET};
pub use column::{ColumnDescriptor, ColumnFlags, Generator, TokenArgs};
pub use descriptor::{EntityKind, EntityTypeDescriptor};
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use relationship::{Cardinality, Ownership, RelationshipDescriptor};
