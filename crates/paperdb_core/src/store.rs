//! The store façade.

use crate::config::Config;
use crate::entity::{EntityInstance, Fetched};
use crate::error::{CoreError, CoreResult};
use crate::query::Match;
use crate::schema::{EntityTypeDescriptor, SchemaRegistry};
use crate::settings::{self, Settings};
use paperdb_storage::statement::{self, Criteria};
use paperdb_storage::{FileBackend, InMemoryBackend, Session, SqlBackend};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Entry point to a PaperDB database.
///
/// Resolves entity types by name and runs every operation on its own
/// short-lived session. Cloning is cheap; clones share the backend and
/// registry.
///
/// # Example
///
/// ```rust
/// use paperdb_core::{Config, Match, Store};
/// use serde_json::json;
///
/// let store = Store::open(Config::default()).unwrap();
/// let permissions = store.get("permission", &Match::All).unwrap();
/// assert_eq!(permissions.len(), 4);
///
/// let settings = store.settings();
/// settings.set("image", &json!({"paused": true})).unwrap();
/// assert_eq!(settings.get("image").unwrap()["paused"], json!(true));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Box<dyn SqlBackend>,
    registry: SchemaRegistry,
    config: Config,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.inner.backend.location())
            .field("types", &self.inner.registry.len())
            .finish()
    }
}

impl Store {
    /// Opens a store with the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or bootstrapped.
    pub fn open(config: Config) -> CoreResult<Self> {
        Self::open_with_registry(config, SchemaRegistry::builtin()?)
    }

    /// Opens a store with a custom registry.
    ///
    /// Missing tables are created in registry order. With
    /// [`Config::seed_defaults`] set, newly created tables receive their
    /// seed rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or bootstrapped.
    pub fn open_with_registry(config: Config, registry: SchemaRegistry) -> CoreResult<Self> {
        let backend: Box<dyn SqlBackend> = match &config.path {
            Some(path) => Box::new(FileBackend::open_with_create_dirs(path, config.connection())?),
            None => Box::new(InMemoryBackend::with_config(config.connection())?),
        };
        let store = Self {
            inner: Arc::new(StoreInner {
                backend,
                registry,
                config,
            }),
        };
        store.bootstrap().inspect_err(|err| {
            tracing::warn!(operation = "open", error = %err, "bootstrap failed");
        })?;
        tracing::info!(
            location = %store.location(),
            types = store.registry().len(),
            "store opened"
        );
        Ok(store)
    }

    fn bootstrap(&self) -> CoreResult<()> {
        let registry = self.registry();
        let session = self.session()?;
        let existing = session.table_names()?;

        let mut created = Vec::new();
        for descriptor in registry.iter() {
            if existing.contains(&descriptor.table) {
                continue;
            }
            session.execute_batch(&registry.create_statement(&descriptor.name)?)?;
            tracing::debug!(table = %descriptor.table, "table created");
            created.push(Arc::clone(descriptor));
        }

        if !self.inner.config.seed_defaults {
            return Ok(());
        }
        for descriptor in created {
            if descriptor.is_config() {
                settings::seed(&session, registry, &self.inner.config)?;
                continue;
            }
            let mut rows = match registry.hooks(&descriptor.name) {
                Some(hooks) => hooks.seed_rows(self, &session)?,
                None => Vec::new(),
            };
            rows.extend(descriptor.defaults.iter().filter_map(Value::as_object).cloned());
            let count = rows.len();
            for row in rows {
                self.create_in(&session, &descriptor.name, row)?;
            }
            if count > 0 {
                tracing::debug!(table = %descriptor.table, rows = count, "table seeded");
            }
        }
        Ok(())
    }

    /// The registry this store was opened with.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    /// The configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Where the database lives.
    #[must_use]
    pub fn location(&self) -> String {
        self.inner.backend.location()
    }

    /// Opens a session for a group of operations.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be opened.
    pub fn session(&self) -> CoreResult<Session> {
        Ok(self.inner.backend.connect()?)
    }

    /// The config singleton.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings::new(self.clone())
    }

    fn standard(&self, entity: &str) -> CoreResult<&Arc<EntityTypeDescriptor>> {
        let descriptor = self.registry().resolve(entity)?;
        if descriptor.is_config() {
            return Err(CoreError::invalid_operation(format!(
                "{entity} is a config type; use Store::settings"
            )));
        }
        Ok(descriptor)
    }

    /// Rows of `entity` matching `matcher`, with their children.
    ///
    /// Yields [`Fetched::Empty`] for no rows and [`Fetched::One`] for
    /// exactly one.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or config types, bad criteria, or
    /// storage failures.
    pub fn get(&self, entity: &str, matcher: &Match) -> CoreResult<Fetched> {
        let session = self.session()?;
        self.get_in(&session, entity, matcher)
    }

    /// [`Store::get`] on an existing session.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub fn get_in(&self, session: &Session, entity: &str, matcher: &Match) -> CoreResult<Fetched> {
        let result = self.standard(entity).and_then(|descriptor| {
            let criteria = matcher.to_criteria(descriptor)?;
            self.fetch(session, descriptor, &criteria)
        });
        result.map(Fetched::from_vec).inspect_err(|err| {
            tracing::warn!(operation = "get", entity, matcher = %matcher, error = %err, "get failed");
        })
    }

    /// The single row of `entity` matching `matcher`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when nothing matches and an invalid
    /// operation error when several rows do.
    pub fn get_one(&self, entity: &str, matcher: &Match) -> CoreResult<EntityInstance> {
        let mut found = self.get(entity, matcher)?.into_vec();
        match found.len() {
            0 => Err(CoreError::not_found(entity, matcher.to_string())),
            1 => found
                .pop()
                .ok_or_else(|| CoreError::not_found(entity, matcher.to_string())),
            n => Err(CoreError::invalid_operation(format!(
                "{entity} {matcher} matched {n} rows"
            ))),
        }
    }

    /// Selects and hydrates rows of a resolved type.
    pub(crate) fn fetch(
        &self,
        session: &Session,
        descriptor: &Arc<EntityTypeDescriptor>,
        criteria: &Criteria,
    ) -> CoreResult<Vec<EntityInstance>> {
        let select = statement::select(
            &descriptor.table,
            &descriptor.column_keys(),
            criteria,
            &descriptor.default_order,
        )?;
        tracing::trace!(sql = select.sql(), "fetch");
        session
            .query(&select)?
            .into_iter()
            .map(|row| EntityInstance::hydrate(self, session, Arc::clone(descriptor), row))
            .collect()
    }

    /// Validates and persists a new instance and its inline children.
    ///
    /// # Errors
    ///
    /// Returns validation errors for rejected values and storage errors
    /// for failed writes.
    pub fn create(&self, entity: &str, values: Map<String, Value>) -> CoreResult<EntityInstance> {
        let session = self.session()?;
        self.create_in(&session, entity, values)
    }

    /// [`Store::create`] on an existing session.
    ///
    /// # Errors
    ///
    /// See [`Store::create`].
    pub fn create_in(
        &self,
        session: &Session,
        entity: &str,
        values: Map<String, Value>,
    ) -> CoreResult<EntityInstance> {
        let mut instance = self
            .draft_in(session, entity, values)
            .inspect_err(|err| {
                tracing::warn!(operation = "create", entity, error = %err, "create failed");
            })?;
        instance.save_in(session, true)?;
        Ok(instance)
    }

    /// Builds an instance from values without saving it.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown types or keys.
    pub fn draft(&self, entity: &str, values: Map<String, Value>) -> CoreResult<EntityInstance> {
        let session = self.session()?;
        self.draft_in(&session, entity, values)
    }

    fn draft_in(
        &self,
        session: &Session,
        entity: &str,
        values: Map<String, Value>,
    ) -> CoreResult<EntityInstance> {
        let descriptor = Arc::clone(self.standard(entity)?);
        EntityInstance::draft(self, session, descriptor, values)
    }

    /// Deletes every row of `entity` matching `matcher`; returns how many.
    ///
    /// Unlike [`Store::get`], this refuses an unconditional match
    /// ([`Match::All`] or an empty exact map), so clearing a table takes an
    /// explicit criterion.
    ///
    /// # Errors
    ///
    /// Returns an error for an unconditional match, bad criteria, or a
    /// failed delete. Rows deleted before the failure stay deleted.
    pub fn delete(&self, entity: &str, matcher: &Match, cascade: bool) -> CoreResult<usize> {
        if matcher.is_all() {
            let err = CoreError::invalid_operation(format!("refusing to delete every {entity}"));
            tracing::warn!(operation = "delete", entity, error = %err, "delete refused");
            return Err(err);
        }
        let session = self.session()?;
        let mut count = 0;
        for mut instance in self.get_in(&session, entity, matcher)? {
            instance.delete_in(&session, cascade)?;
            count += 1;
        }
        tracing::debug!(entity, count, "deleted");
        Ok(count)
    }

    /// Row count per table, in registry order.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be counted.
    pub fn row_counts(&self) -> CoreResult<Vec<(String, i64)>> {
        let session = self.session()?;
        self.registry()
            .iter()
            .map(|d| Ok((d.name.clone(), session.row_count(&d.table)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn bootstrap_seeds_defaults() {
        let store = Store::open(Config::default()).unwrap();
        let counts: std::collections::HashMap<_, _> = store.row_counts().unwrap().into_iter().collect();
        assert_eq!(counts["settings"], 1);
        assert_eq!(counts["user"], 2);
        assert_eq!(counts["permission"], 4);
        assert_eq!(counts["user_permission"], 4);
        assert_eq!(counts["category"], 4);
        assert_eq!(counts["subcategory"], 14);
        assert_eq!(counts["task"], 6);
        assert_eq!(counts["token"], 0);
    }

    #[test]
    fn seeding_can_be_disabled() {
        let store = Store::open(Config::default().seed_defaults(false)).unwrap();
        assert!(store.row_counts().unwrap().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().path(dir.path().join("nested/paper.db"));
        {
            let store = Store::open(config.clone()).unwrap();
            store
                .create("category", object(json!({"name": "Animals"})))
                .unwrap();
        }
        let store = Store::open(config).unwrap();
        let animals = store.get("category", &Match::exact([("name", json!("Animals"))])).unwrap();
        assert_eq!(animals.one().unwrap().get("id"), Some(&json!(4)));
        assert_eq!(store.get("user", &Match::All).unwrap().len(), 2);
    }

    #[test]
    fn config_types_are_not_entities() {
        let store = Store::open(Config::default()).unwrap();
        assert!(store.get("settings", &Match::All).is_err());
        assert!(matches!(
            store.get("nope", &Match::All).unwrap_err(),
            CoreError::UnknownEntityType { .. }
        ));
    }

    #[test]
    fn delete_requires_criteria() {
        let store = Store::open(Config::default()).unwrap();
        assert!(store.delete("task", &Match::All, true).is_err());
        let removed = store
            .delete("task", &Match::exact([("name", json!("Rotate Logs"))]), true)
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("task", &Match::All).unwrap().len(), 5);
    }

    #[test]
    fn raw_filters_bypass_default_order() {
        let store = Store::open(Config::default()).unwrap();
        let filter = paperdb_storage::statement::RawFilter::new("WHERE delay > ?1 ORDER BY name DESC").bind(3000.0);
        let tasks = store.get("task", &Match::filter(filter)).unwrap();
        let names: Vec<_> = tasks.iter().filter_map(|t| t.get("name").and_then(Value::as_str)).collect();
        assert_eq!(names, ["Server Info", "Rotate Logs", "Reap Tokens", "Clear Temp Files"]);
    }

    #[test]
    fn optional_text_takes_its_default() {
        let store = Store::open(Config::default()).unwrap();
        let bob = store
            .create("user", object(json!({"username": "bob", "password": "Sup3r-secret"})))
            .unwrap();
        assert_eq!(bob.get("given_name"), Some(&json!("")));

        let bob = store.get_one("user", &Match::exact([("username", json!("bob"))])).unwrap();
        assert_eq!(bob.get("family_name"), Some(&json!("")));
    }

    #[test]
    fn null_text_without_default_is_rejected() {
        use crate::schema::{ColumnDescriptor as Col, EntityTypeDescriptor, Generator};

        let pet = EntityTypeDescriptor::new("pet", "pets")
            .column(Col::integer("id").primary_key().generated(Generator::UniqueInt))
            .column(Col::text("nickname"))
            .column(Col::real("weight"));
        let registry = SchemaRegistry::builder().register(pet).build().unwrap();
        let store = Store::open_with_registry(Config::default(), registry).unwrap();

        let err = store.create("pet", object(json!({"weight": 3.5}))).unwrap_err();
        assert_eq!(err.validation_failure(), Some(crate::ValidationFailure::NullViolation));

        let rex = store.create("pet", object(json!({"nickname": "rex"}))).unwrap();
        assert_eq!(rex.get("weight"), Some(&Value::Null));
    }

    #[test]
    fn get_one_reports_missing_rows() {
        let store = Store::open(Config::default()).unwrap();
        let err = store
            .get_one("user", &Match::exact([("username", json!("ghost"))]))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
