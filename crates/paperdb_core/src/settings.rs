//! The config singleton.
//!
//! The config entity type stores one row whose columns are JSON blobs.
//! [`Settings`] reads and writes those columns by key, always against the
//! database: nothing is cached between calls.

use crate::convert::Converter;
use crate::crypto::{generate_salt, EncryptionKey};
use crate::entity::EntityInstance;
use crate::error::{CoreError, CoreResult, ValidationFailure};
use crate::password::PasswordPolicy;
use crate::query::Match;
use crate::schema::{ColumnDescriptor, EntityTypeDescriptor, SchemaRegistry, TOKEN_ALPHABET};
use crate::store::Store;
use crate::Config;
use paperdb_codec::{CodecError, RawValue};
use paperdb_storage::statement::{self, Criteria};
use paperdb_storage::Session;
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Settings column holding the cipher secret and salt.
pub const CIPHER: &str = "cipher";
/// Settings column holding the token policy.
pub const TOKEN: &str = "token";
/// Settings column holding the password policy.
pub const PASSWORD: &str = "password";
/// Settings column holding display and queue state.
pub const IMAGE: &str = "image";

/// Passes over the available images in a generated queue.
const QUEUE_PASSES: usize = 3;

/// Secret and salt for password column encryption.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherSettings {
    /// Base64 key or passphrase.
    pub key: String,
    /// Salt appended to every plaintext.
    pub salt: String,
}

impl fmt::Debug for CipherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSettings")
            .field("key", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .finish()
    }
}

/// How access tokens are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPolicy {
    /// Token alphabet.
    pub choices: String,
    /// Token length in characters.
    pub length: usize,
    /// Token lifetime in seconds.
    pub duration: f64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            choices: TOKEN_ALPHABET.to_string(),
            length: 64,
            duration: 604_800.0,
        }
    }
}

/// Whether a filter admits or rejects matching images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Images with a matching tag are available.
    Include,
    /// Images with a matching tag are not available.
    Exclude,
}

/// A category or subcategory named by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTarget {
    /// Row id.
    pub id: i64,
    /// Display name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One tag filter of the image queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFilter {
    /// Include or exclude.
    #[serde(rename = "type")]
    pub kind: FilterKind,
    /// Category the tag must carry.
    pub category: FilterTarget,
    /// Subcategory the tag must carry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<FilterTarget>,
}

impl ImageFilter {
    fn matches(&self, tag: &Value) -> bool {
        let id_of = |key: &str| tag.get(key).and_then(|c| c.get("id")).and_then(Value::as_i64);
        if id_of("category") != Some(self.category.id) {
            return false;
        }
        match &self.subcategory {
            Some(sub) => id_of("subcategory") == Some(sub.id),
            None => true,
        }
    }
}

/// Display and queue state.
///
/// Keys this type does not model are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    /// Rotation paused.
    #[serde(default)]
    pub paused: bool,
    /// Id of the image on display, `-1` for none.
    #[serde(default = "no_image")]
    pub current: i64,
    /// Upcoming image ids.
    #[serde(default)]
    pub queue: Vec<i64>,
    /// Tag filters deciding which images enter the queue.
    #[serde(default)]
    pub filters: Vec<ImageFilter>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn no_image() -> i64 {
    -1
}

/// True when `image` passes `filters`.
///
/// Without include filters every image passes the include stage; with at
/// least one, a tag must match one of them. A tag matching any exclude
/// filter then rejects the image, wherever that filter sits in the list.
#[must_use]
pub fn image_available(image: &EntityInstance, filters: &[ImageFilter]) -> bool {
    let tags: Vec<Value> = image
        .child("tags")
        .map(|tags| tags.iter().map(crate::entity::hooks::flattened_tag).collect())
        .unwrap_or_default();
    let hit = |filter: &ImageFilter| tags.iter().any(|tag| filter.matches(tag));

    let mut includes = filters.iter().filter(|f| f.kind == FilterKind::Include).peekable();
    let included = includes.peek().is_none() || includes.any(hit);
    included && !filters.iter().filter(|f| f.kind == FilterKind::Exclude).any(hit)
}

/// Handle on the config singleton of a store.
#[derive(Debug, Clone)]
pub struct Settings {
    store: Store,
}

impl Settings {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Current value of a settings column.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, the primary key column, or a
    /// missing settings row.
    pub fn get(&self, key: &str) -> CoreResult<Value> {
        let session = self.store.session()?;
        load(&session, self.store.registry(), key)
            .inspect_err(|err| log_failure("settings.get", key, err))?
            .ok_or_else(|| CoreError::not_found(self.table_name(), "settings row"))
    }

    /// Replaces a settings column.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, values the column rejects, or a
    /// missing settings row.
    pub fn set(&self, key: &str, value: &Value) -> CoreResult<()> {
        let session = self.store.session()?;
        write(&session, self.store.registry(), key, value)
            .inspect_err(|err| log_failure("settings.set", key, err))
    }

    fn table_name(&self) -> String {
        self.store
            .registry()
            .config_type()
            .map_or_else(String::new, |c| c.name.clone())
    }

    fn typed<T: DeserializeOwned + Default>(&self, key: &str) -> CoreResult<T> {
        let session = self.store.session()?;
        Ok(load_as(&session, self.store.registry(), key)?.unwrap_or_default())
    }

    /// Cipher secret and salt.
    ///
    /// # Errors
    ///
    /// Returns an error if no cipher has been configured.
    pub fn cipher(&self) -> CoreResult<CipherSettings> {
        let session = self.store.session()?;
        load_as(&session, self.store.registry(), CIPHER)?
            .ok_or_else(|| CoreError::encryption("no cipher configured"))
    }

    /// Token generation policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is malformed.
    pub fn token_policy(&self) -> CoreResult<TokenPolicy> {
        self.typed(TOKEN)
    }

    /// Password policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is malformed.
    pub fn password_policy(&self) -> CoreResult<PasswordPolicy> {
        self.typed(PASSWORD)
    }

    /// Display and queue state.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is malformed.
    pub fn image(&self) -> CoreResult<ImageSettings> {
        let session = self.store.session()?;
        load_as(&session, self.store.registry(), IMAGE)?
            .ok_or_else(|| CoreError::not_found(self.table_name(), "image settings"))
    }

    /// Replaces the display and queue state.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    pub fn set_image(&self, image: &ImageSettings) -> CoreResult<()> {
        let value = serde_json::to_value(image).map_err(|err| CodecError::encoding_failed(err.to_string()))?;
        self.set(IMAGE, &value)
    }

    /// Rebuilds the queue from every available image.
    ///
    /// The queue holds [`QUEUE_PASSES`] independently shuffled passes over
    /// the available ids. When `current` is given the queue is rotated so
    /// that it ends with `current`, and `current` becomes the image on
    /// display. Otherwise the last queued id does.
    ///
    /// # Errors
    ///
    /// Returns an error if `current` is not an available image.
    pub fn generate_media_queue(&self, current: Option<i64>) -> CoreResult<ImageSettings> {
        let mut image = self.image()?;
        let available = self.available_images(&image.filters)?;

        let mut queue = Vec::with_capacity(available.len() * QUEUE_PASSES);
        let mut rng = rand::thread_rng();
        for _ in 0..QUEUE_PASSES {
            let mut pass = available.clone();
            pass.shuffle(&mut rng);
            queue.extend(pass);
        }

        if let Some(current) = current {
            let position = queue.iter().position(|id| *id == current).ok_or_else(|| {
                CoreError::invalid_operation(format!("image {current} is not available"))
            })?;
            queue.rotate_left(position + 1);
        }
        image.current = queue.last().copied().unwrap_or(-1);
        image.queue = queue;

        self.set_image(&image)?;
        tracing::debug!(queued = image.queue.len(), current = image.current, "media queue generated");
        Ok(image)
    }

    /// Moves the queue one step.
    ///
    /// Forward takes the first id, moves it to the back and puts it on
    /// display. Backward moves the last id to the front and displays the
    /// new last id. An empty queue is generated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read or written.
    pub fn rotate_media_queue(&self, forward: bool) -> CoreResult<ImageSettings> {
        let mut image = self.image()?;
        if image.queue.is_empty() {
            image = self.generate_media_queue(None)?;
        }
        if image.queue.is_empty() {
            return Ok(image);
        }
        if forward {
            image.queue.rotate_left(1);
        } else {
            image.queue.rotate_right(1);
        }
        image.current = image.queue.last().copied().unwrap_or(-1);
        self.set_image(&image)?;
        Ok(image)
    }

    fn available_images(&self, filters: &[ImageFilter]) -> CoreResult<Vec<i64>> {
        let images = self.store.get("image", &Match::All)?;
        Ok(images
            .iter()
            .filter(|image| image_available(image, filters))
            .filter_map(|image| image.get("id").and_then(Value::as_i64))
            .collect())
    }
}

fn log_failure(operation: &str, key: &str, err: &CoreError) {
    tracing::warn!(operation, key, error = %err, "settings operation failed");
}

fn config_type(registry: &SchemaRegistry) -> CoreResult<&Arc<EntityTypeDescriptor>> {
    registry
        .config_type()
        .ok_or_else(|| CoreError::invalid_operation("no config entity type is registered"))
}

/// The singleton primary key column and its fixed value.
fn singleton_key(config: &EntityTypeDescriptor) -> CoreResult<(&ColumnDescriptor, RawValue)> {
    let column = config
        .primary_key()
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::schema(format!("{} has no primary key", config.name)))?;
    let value = column
        .default
        .as_ref()
        .and_then(RawValue::from_scalar)
        .ok_or_else(|| CoreError::schema(format!("{} has no singleton key", config.name)))?;
    Ok((column, value))
}

fn value_column<'a>(config: &'a EntityTypeDescriptor, key: &str) -> CoreResult<&'a ColumnDescriptor> {
    match config.column_by_key(key) {
        Some(column) if !column.flags.primary_key => Ok(column),
        _ => Err(CoreError::validation(
            &config.name,
            key,
            ValidationFailure::UnknownColumn,
            "not a settings key",
        )),
    }
}

/// Reads one settings column; `None` when the row does not exist.
pub(crate) fn load(session: &Session, registry: &SchemaRegistry, key: &str) -> CoreResult<Option<Value>> {
    let config = config_type(registry)?;
    let column = value_column(config, key)?;
    let (pk, id) = singleton_key(config)?;

    let select = statement::select(
        &config.table,
        &[column.key.as_str()],
        &Criteria::exact([(pk.key.clone(), id)]),
        &[],
    )?;
    let Some(raw) = session.query_column(&select)?.into_iter().next() else {
        return Ok(None);
    };
    let converter = Converter::new(registry, session, config);
    converter.decode(&raw, column).map(Some)
}

/// Reads one settings column as `T`; `None` when the row does not exist or
/// the value is null.
pub(crate) fn load_as<T: DeserializeOwned>(
    session: &Session,
    registry: &SchemaRegistry,
    key: &str,
) -> CoreResult<Option<T>> {
    match load(session, registry, key)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| CoreError::invalid_operation(format!("malformed settings {key:?}: {err}"))),
    }
}

pub(crate) fn write(session: &Session, registry: &SchemaRegistry, key: &str, value: &Value) -> CoreResult<()> {
    let config = config_type(registry)?;
    let column = value_column(config, key)?;
    let (pk, id) = singleton_key(config)?;

    let encoded = Converter::new(registry, session, config).encode(value, column, None)?;
    let update = statement::update(
        &config.table,
        &[(column.key.clone(), encoded.raw)],
        &[(pk.key.clone(), id)],
    )?;
    if session.execute(&update)? == 0 {
        return Err(CoreError::not_found(&config.name, "settings row"));
    }
    tracing::debug!(key, "settings updated");
    Ok(())
}

/// Inserts the settings row from the type's first default row.
///
/// A null `cipher` is filled from `config` or freshly generated.
pub(crate) fn seed(session: &Session, registry: &SchemaRegistry, config: &Config) -> CoreResult<()> {
    let descriptor = config_type(registry)?;
    let mut row = descriptor
        .defaults
        .first()
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if descriptor.column_by_key(CIPHER).is_some() && row.get(CIPHER).map_or(true, Value::is_null) {
        let cipher = CipherSettings {
            key: config
                .cipher_key
                .clone()
                .unwrap_or_else(|| EncryptionKey::generate().to_secret()),
            salt: config.cipher_salt.clone().unwrap_or_else(|| generate_salt(64)),
        };
        let value = serde_json::to_value(cipher).map_err(|err| CodecError::encoding_failed(err.to_string()))?;
        row.insert(CIPHER.to_string(), value);
    }

    let converter = Converter::new(registry, session, descriptor);
    let mut values = Vec::with_capacity(descriptor.columns.len());
    for column in &descriptor.columns {
        let working = row.get(&column.key).cloned().unwrap_or(Value::Null);
        values.push((column.key.as_str(), converter.encode(&working, column, None)?.raw));
    }
    session.execute(&statement::insert(&descriptor.table, &values)?)?;
    tracing::debug!(table = %descriptor.table, "settings row seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Store {
        Store::open(Config::default()).unwrap()
    }

    #[test]
    fn get_set_round_trip() {
        let settings = store().settings();
        let mut image = settings.get(IMAGE).unwrap();
        image["paused"] = json!(true);
        settings.set(IMAGE, &image).unwrap();

        assert_eq!(settings.get(IMAGE).unwrap()["paused"], json!(true));
        assert!(settings.image().unwrap().paused);
    }

    #[test]
    fn rejects_unknown_and_key_columns() {
        let settings = store().settings();
        assert!(settings.get("nope").unwrap_err().is_validation());
        assert!(settings.get("id").unwrap_err().is_validation());
        assert!(settings.set("id", &json!(4)).unwrap_err().is_validation());
    }

    #[test]
    fn seeded_policies() {
        let settings = store().settings();
        assert_eq!(settings.token_policy().unwrap(), TokenPolicy::default());
        assert_eq!(settings.password_policy().unwrap(), PasswordPolicy::default());
        let cipher = settings.cipher().unwrap();
        assert_eq!(cipher.salt.len(), 64);
    }

    #[test]
    fn configured_cipher_is_used() {
        let store = Store::open(Config::default().cipher("passphrase", "pepper")).unwrap();
        let cipher = store.settings().cipher().unwrap();
        assert_eq!(cipher.key, "passphrase");
        assert_eq!(cipher.salt, "pepper");
        assert!(!format!("{cipher:?}").contains("pepper"));
    }

    #[test]
    fn image_settings_keep_unmodelled_keys() {
        let settings = store().settings();
        let image = settings.image().unwrap();
        assert_eq!(image.current, -1);
        assert_eq!(image.extra["orientation"], json!("landscape"));

        settings.set_image(&image).unwrap();
        assert_eq!(settings.get(IMAGE).unwrap()["extension"], json!("png"));
    }

    #[test]
    fn filters_parse() {
        let filter: ImageFilter = serde_json::from_value(json!({
            "type": "exclude",
            "category": {"id": 1, "name": "Nature"}
        }))
        .unwrap();
        assert_eq!(filter.kind, FilterKind::Exclude);
        assert!(filter.matches(&json!({"category": {"id": 1}, "subcategory": {"id": 4}})));
        assert!(!filter.matches(&json!({"category": {"id": 2}, "subcategory": {"id": 4}})));
    }

    fn filter(kind: FilterKind, category: i64) -> ImageFilter {
        ImageFilter {
            kind,
            category: FilterTarget { id: category, name: None },
            subcategory: None,
        }
    }

    #[test]
    fn exclude_filters_win_in_any_position() {
        let store = store();
        let values = json!({
            "width": 800,
            "height": 480,
            "bytes": 1024,
            "path": "/nonexistent/originals/lake.png",
            "file": "lake.png",
            "url": "/media/lake.png",
            "created": 1_700_000_000.0,
            "tags": [{"category_id": 1, "subcategory_id": 5}]
        });
        store.create("image", values.as_object().cloned().unwrap()).unwrap();
        let image = store.get_one("image", &Match::exact([("file", json!("lake.png"))])).unwrap();

        assert!(image_available(&image, &[]));
        assert!(image_available(&image, &[filter(FilterKind::Include, 1)]));
        assert!(!image_available(&image, &[filter(FilterKind::Include, 2)]));
        assert!(image_available(&image, &[filter(FilterKind::Exclude, 2)]));
        assert!(!image_available(
            &image,
            &[filter(FilterKind::Exclude, 1), filter(FilterKind::Include, 1)]
        ));
        assert!(!image_available(
            &image,
            &[filter(FilterKind::Include, 1), filter(FilterKind::Exclude, 1)]
        ));
        assert!(!image_available(
            &image,
            &[filter(FilterKind::Include, 2), filter(FilterKind::Exclude, 1)]
        ));
    }

    #[test]
    fn empty_queue_without_images() {
        let settings = store().settings();
        let image = settings.generate_media_queue(None).unwrap();
        assert!(image.queue.is_empty());
        assert_eq!(image.current, -1);
        assert!(settings.rotate_media_queue(true).unwrap().queue.is_empty());
    }
}
