//! Per-type behavior attached through the registry.

use super::EntityInstance;
use crate::error::{CoreError, CoreResult};
use crate::password::PasswordPolicy;
use crate::schema::TOKEN_ALPHABET;
use crate::settings::{self, TokenPolicy};
use crate::store::Store;
use paperdb_codec::timestamp;
use paperdb_storage::Session;
use serde_json::{json, Map, Value};
use std::io;
use std::path::Path;

/// Behavior an entity type adds to the generic engine.
///
/// Every method has a no-op default. Hooks are registered by type name on
/// the [`RegistryBuilder`](crate::schema::RegistryBuilder).
pub trait EntityHooks: Send + Sync {
    /// Adjusts caller values before a new instance is validated.
    ///
    /// # Errors
    ///
    /// Errors abort the creation.
    fn before_create(
        &self,
        _store: &Store,
        _session: &Session,
        _values: &mut Map<String, Value>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// Runs before a persisted instance is deleted.
    ///
    /// # Errors
    ///
    /// Errors abort the delete.
    fn before_delete(&self, _instance: &EntityInstance) -> CoreResult<()> {
        Ok(())
    }

    /// Replaces the generic API view.
    fn api_view(&self, _instance: &EntityInstance) -> Option<Value> {
        None
    }

    /// Rows seeded ahead of the type's static defaults when its table is
    /// created.
    ///
    /// # Errors
    ///
    /// Errors abort the bootstrap.
    fn seed_rows(&self, _store: &Store, _session: &Session) -> CoreResult<Vec<Map<String, Value>>> {
        Ok(Vec::new())
    }
}

/// Users: seeds the service account.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserHooks;

/// Username of the service account.
pub const API_USERNAME: &str = "scissor_api";

impl EntityHooks for UserHooks {
    fn seed_rows(&self, store: &Store, session: &Session) -> CoreResult<Vec<Map<String, Value>>> {
        let policy: PasswordPolicy =
            settings::load_as(session, store.registry(), settings::PASSWORD)?.unwrap_or_default();
        let password = policy.generate(TOKEN_ALPHABET, 64).ok_or_else(|| {
            CoreError::invalid_operation("password policy cannot be satisfied by the token alphabet")
        })?;
        let row = json!({
            "id": 0,
            "username": API_USERNAME,
            "given_name": "Scissor",
            "family_name": "API",
            "password": password,
        });
        Ok(row.as_object().cloned().into_iter().collect())
    }
}

/// Tokens: always generated, expiring after the configured duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHooks;

impl EntityHooks for TokenHooks {
    fn before_create(&self, store: &Store, session: &Session, values: &mut Map<String, Value>) -> CoreResult<()> {
        let policy: TokenPolicy =
            settings::load_as(session, store.registry(), settings::TOKEN)?.unwrap_or_default();
        values.insert("token".to_string(), Value::Null);
        values.insert("expires".to_string(), json!(timestamp::now_plus(policy.duration)));
        Ok(())
    }
}

/// Images: stamped on ingest, file removed on delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageHooks;

impl EntityHooks for ImageHooks {
    fn before_create(&self, _store: &Store, _session: &Session, values: &mut Map<String, Value>) -> CoreResult<()> {
        values.insert("ingested".to_string(), json!(timestamp::now()));
        Ok(())
    }

    fn before_delete(&self, instance: &EntityInstance) -> CoreResult<()> {
        remove_backing_file(instance)
    }
}

/// Derived image files: file removed on delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHooks;

impl EntityHooks for FileHooks {
    fn before_delete(&self, instance: &EntityInstance) -> CoreResult<()> {
        remove_backing_file(instance)
    }
}

fn remove_backing_file(instance: &EntityInstance) -> CoreResult<()> {
    let Some(path) = instance.get("path").and_then(Value::as_str) else {
        return Ok(());
    };
    let path = Path::new(path);
    if !path.is_file() {
        return Ok(());
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(entity = %instance.type_name(), path = %path.display(), "file removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Tags: flattened API view.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagHooks;

impl EntityHooks for TagHooks {
    fn api_view(&self, instance: &EntityInstance) -> Option<Value> {
        Some(flattened_tag(instance))
    }
}

/// `{image_id, category: {id, name}, subcategory: {id, name}}` for a tag.
///
/// Names come from the hydrated references and are null when a reference
/// is missing.
#[must_use]
pub fn flattened_tag(tag: &EntityInstance) -> Value {
    let reference = |relationship: &str, column: &str| {
        let name = tag
            .child(relationship)
            .and_then(|c| c.one())
            .and_then(|c| c.get("name"))
            .cloned()
            .unwrap_or(Value::Null);
        json!({
            "id": tag.get(column).cloned().unwrap_or(Value::Null),
            "name": name,
        })
    };
    json!({
        "image_id": tag.get("image_id").cloned().unwrap_or(Value::Null),
        "category": reference("category", "category_id"),
        "subcategory": reference("subcategory", "subcategory_id"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Match};

    fn store() -> Store {
        Store::open(Config::default()).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn service_account_is_seeded() {
        let store = store();
        let api = store
            .get_one("user", &Match::exact([("id", json!(0))]))
            .unwrap();
        assert_eq!(api.get("username"), Some(&json!(API_USERNAME)));
        let password = api.get("password").and_then(Value::as_str).unwrap();
        assert_eq!(password.chars().count(), 64);
        assert!(PasswordPolicy::default().allows(password));
    }

    #[test]
    fn tokens_are_generated_with_expiry() {
        let store = store();
        let before = timestamp::now();
        let token = store
            .create("token", object(json!({"user_id": 1, "token": "chosen"})))
            .unwrap();
        let value = token.get("token").and_then(Value::as_str).unwrap();
        assert_ne!(value, "chosen");
        assert_eq!(value.chars().count(), 64);
        let expires = token.get("expires").and_then(Value::as_f64).unwrap();
        assert!(expires >= before + 604_800.0);
    }

    #[test]
    fn tag_view_is_flat() {
        let store = store();
        let image = store
            .create(
                "image",
                object(json!({
                    "width": 8, "height": 8, "bytes": 64,
                    "path": "/nonexistent/a.png", "file": "a.png", "url": "/a.png",
                    "created": 1.0,
                    "tags": [{"category_id": 1, "subcategory_id": 4}]
                })),
            )
            .unwrap();
        let id = image.get("id").cloned().unwrap();

        let tag = store.get_one("tag", &Match::exact([("image_id", id.clone())])).unwrap();
        assert_eq!(
            tag.to_api_view(),
            json!({
                "image_id": id,
                "category": {"id": 1, "name": "Nature"},
                "subcategory": {"id": 4, "name": "Ocean"},
            })
        );
    }

    #[test]
    fn image_files_are_removed_on_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.png");
        std::fs::write(&path, b"png").unwrap();

        let store = store();
        let mut image = store
            .create(
                "image",
                object(json!({
                    "width": 1, "height": 1, "bytes": 3,
                    "path": path.to_string_lossy(), "file": "b.png", "url": "/b.png",
                    "created": 2.0
                })),
            )
            .unwrap();
        assert!(image.get("ingested").and_then(Value::as_f64).unwrap() > 0.0);

        image.delete(true).unwrap();
        assert!(!path.exists());
    }
}
