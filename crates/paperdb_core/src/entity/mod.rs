//! Entity instances and per-type behavior.
//!
//! An [`EntityInstance`] is one record of a registered entity type. It
//! holds the record in working form (decoded JSON values), in raw form
//! (values as written to storage) and, once persisted, the raw values last
//! known to be stored. Its children are held per relationship as a
//! [`Fetched`] value whose shape follows the declared cardinality.

mod fetched;
pub mod hooks;
mod instance;

pub use fetched::Fetched;
pub use hooks::EntityHooks;
pub use instance::EntityInstance;
