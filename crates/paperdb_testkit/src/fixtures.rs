//! Test fixtures and store helpers.

use paperdb_core::{Config, SchemaRegistry, Store};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a seeded in-memory store with the built-in catalog.
    pub fn memory() -> Self {
        Self {
            store: Store::open(Config::default()).expect("Failed to open in-memory store"),
            _temp_dir: None,
        }
    }

    /// Creates a seeded file-backed store with the built-in catalog.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::default().path(temp_dir.path().join("paper.db"));
        Self {
            store: Store::open(config).expect("Failed to open file store"),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory store for a custom registry.
    pub fn with_registry(registry: SchemaRegistry) -> Self {
        Self {
            store: Store::open_with_registry(Config::default(), registry)
                .expect("Failed to open store"),
            _temp_dir: None,
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("paper.db"))
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a seeded in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::memory();
    f(&store)
}

/// Runs a test with a seeded file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::file();
    f(&store)
}

/// Unwraps a JSON object literal into the value map taken by
/// [`Store::create`].
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Values for a valid image row; `n` keeps the unique columns apart.
pub fn image_values(n: usize) -> Map<String, Value> {
    object(serde_json::json!({
        "width": 800,
        "height": 480,
        "bytes": 1024 + n,
        "path": format!("/nonexistent/originals/{n}.png"),
        "file": format!("{n}.png"),
        "url": format!("/media/{n}.png"),
        "created": 1_700_000_000.0 + n as f64,
        "description": format!("image {n}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdb_core::Match;

    #[test]
    fn fixtures_are_seeded() {
        with_temp_store(|store| {
            assert_eq!(store.get("permission", &Match::All).unwrap().len(), 4);
        });
        with_file_store(|store| {
            assert_eq!(store.get("category", &Match::All).unwrap().len(), 4);
        });
    }

    #[test]
    fn file_store_path() {
        let store = TestStore::file();
        assert!(store.path().unwrap().exists());
        assert!(TestStore::memory().path().is_none());
    }
}
