//! One record of an entity type.

use super::Fetched;
use crate::convert::Converter;
use crate::error::{CoreError, CoreResult, ValidationFailure};
use crate::schema::{EntityTypeDescriptor, RelationshipDescriptor};
use crate::store::Store;
use paperdb_codec::{timestamp, RawValue};
use paperdb_storage::statement::{self, Criteria};
use paperdb_storage::Session;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A record of a registered entity type.
///
/// Instances come from [`Store::get`] (persisted rows) or from
/// [`Store::create`] and [`Store::draft`] (caller values). A draft does not
/// exist in storage until it is saved. A deleted instance is terminal: its
/// forms are cleared and it refuses further writes.
#[derive(Clone)]
pub struct EntityInstance {
    store: Store,
    descriptor: Arc<EntityTypeDescriptor>,
    working: Map<String, Value>,
    raw: Vec<RawValue>,
    stored: Option<Vec<RawValue>>,
    children: BTreeMap<String, Fetched>,
    exists: bool,
    deleted: bool,
}

impl fmt::Debug for EntityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let working: Map<String, Value> = self
            .working
            .iter()
            .map(|(key, value)| {
                let secret = self
                    .descriptor
                    .column_by_key(key)
                    .is_some_and(|c| c.flags.password);
                let shown = if secret { Value::from("[REDACTED]") } else { value.clone() };
                (key.clone(), shown)
            })
            .collect();
        f.debug_struct("EntityInstance")
            .field("type", &self.descriptor.name)
            .field("working", &working)
            .field("children", &self.children)
            .field("exists", &self.exists)
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl EntityInstance {
    /// Builds an unsaved instance from caller values.
    ///
    /// Column keys fill the working form; relationship keys hold inline
    /// children as an object or an array of objects. Creation hooks run
    /// for the instance and every inline child.
    pub(crate) fn draft(
        store: &Store,
        session: &Session,
        descriptor: Arc<EntityTypeDescriptor>,
        mut values: Map<String, Value>,
    ) -> CoreResult<Self> {
        if let Some(hooks) = store.registry().hooks(&descriptor.name) {
            hooks.before_create(store, session, &mut values)?;
        }

        let mut working = Map::new();
        let mut children = BTreeMap::new();
        for (key, value) in values {
            if descriptor.column_by_key(&key).is_some() {
                working.insert(key, value);
            } else if let Some(rel) = descriptor.relationship_by_key(&key) {
                let fetched = draft_children(store, session, &descriptor, rel, value)?;
                children.insert(key, fetched);
            } else {
                return Err(CoreError::validation(
                    &descriptor.name,
                    key,
                    ValidationFailure::UnknownColumn,
                    "not a column or relationship of this type",
                ));
            }
        }
        for column in &descriptor.columns {
            working.entry(column.key.clone()).or_insert(Value::Null);
        }
        for rel in &descriptor.relationships {
            children
                .entry(rel.key.clone())
                .or_insert_with(|| Fetched::for_cardinality(rel.cardinality, Vec::new()));
        }

        Ok(Self {
            store: store.clone(),
            raw: vec![RawValue::Null; descriptor.columns.len()],
            descriptor,
            working,
            stored: None,
            children,
            exists: false,
            deleted: false,
        })
    }

    /// Builds a persisted instance from a stored row and loads its
    /// children.
    pub(crate) fn hydrate(
        store: &Store,
        session: &Session,
        descriptor: Arc<EntityTypeDescriptor>,
        row: Vec<RawValue>,
    ) -> CoreResult<Self> {
        let working = {
            let converter = Converter::new(store.registry(), session, &descriptor);
            let mut working = Map::new();
            for (column, raw) in descriptor.columns.iter().zip(&row) {
                working.insert(column.key.clone(), converter.decode(raw, column)?);
            }
            working
        };
        let mut instance = Self {
            store: store.clone(),
            descriptor,
            working,
            raw: row.clone(),
            stored: Some(row),
            children: BTreeMap::new(),
            exists: true,
            deleted: false,
        };
        instance.children = instance.load_children(session, |_| true)?;
        Ok(instance)
    }

    /// Descriptor of the instance's type.
    #[must_use]
    pub fn descriptor(&self) -> &EntityTypeDescriptor {
        &self.descriptor
    }

    /// Name of the instance's type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.descriptor.name
    }

    /// True once the row is known to be stored.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// True after a delete.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Working form of every column.
    #[must_use]
    pub fn working(&self) -> &Map<String, Value> {
        &self.working
    }

    /// Working value of one column.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.working.get(key)
    }

    /// Changes a working value. Takes effect on the next save.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown columns or a deleted instance.
    pub fn set(&mut self, key: &str, value: Value) -> CoreResult<()> {
        self.ensure_live("set")?;
        if self.descriptor.column_by_key(key).is_none() {
            return Err(CoreError::validation(
                &self.descriptor.name,
                key,
                ValidationFailure::UnknownColumn,
                "not a column of this type",
            ));
        }
        self.working.insert(key.to_string(), value);
        Ok(())
    }

    /// Raw form, in column order, as of the last successful validation.
    #[must_use]
    pub fn raw(&self) -> &[RawValue] {
        &self.raw
    }

    /// Raw values last known to be stored.
    #[must_use]
    pub fn stored(&self) -> Option<&[RawValue]> {
        self.stored.as_deref()
    }

    /// Children under a relationship key.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Fetched> {
        self.children.get(key)
    }

    /// Mutable children under a relationship key.
    pub fn child_mut(&mut self, key: &str) -> Option<&mut Fetched> {
        self.children.get_mut(key)
    }

    /// Replaces the children under a relationship key.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a relationship of this type or a
    /// child has the wrong type.
    pub fn set_child(&mut self, key: &str, children: Fetched) -> CoreResult<()> {
        self.ensure_live("set_child")?;
        let rel = self.descriptor.relationship_by_key(key).ok_or_else(|| {
            CoreError::validation(
                &self.descriptor.name,
                key,
                ValidationFailure::UnknownColumn,
                "not a relationship of this type",
            )
        })?;
        if let Some(wrong) = children.iter().find(|c| c.type_name() != rel.child_type) {
            return Err(CoreError::invalid_operation(format!(
                "{}.{key} holds {}, not {}",
                self.descriptor.name,
                rel.child_type,
                wrong.type_name()
            )));
        }
        self.children.insert(key.to_string(), children);
        Ok(())
    }

    /// Validates and writes the instance on a new session.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::save_in`].
    pub fn save(&mut self, cascade: bool) -> CoreResult<()> {
        let session = self.store.session()?;
        self.save_in(&session, cascade)
    }

    /// Validates and writes the instance, and with `cascade` its owned
    /// children.
    ///
    /// Every column is validated before anything is written; a rejected
    /// value leaves the instance untouched. The row is updated when it
    /// exists, matched by its stored primary key, and inserted otherwise.
    /// Children marked to be modified first are written before the row,
    /// the rest after it. Each statement commits on its own, so a failure
    /// partway through a cascade keeps the writes before it.
    ///
    /// # Errors
    ///
    /// Returns validation errors, storage errors, and
    /// [`CoreError::NotFound`] when the row to update has vanished.
    pub fn save_in(&mut self, session: &Session, cascade: bool) -> CoreResult<()> {
        self.save_cascade(session, cascade).inspect_err(|err| {
            tracing::warn!(operation = "save", entity = %self.descriptor.name, error = %err, "save failed");
        })
    }

    fn save_cascade(&mut self, session: &Session, cascade: bool) -> CoreResult<()> {
        self.ensure_live("save")?;
        let descriptor = Arc::clone(&self.descriptor);

        let (raw, working) = {
            let converter = Converter::new(self.store.registry(), session, &descriptor);
            let mut raw = Vec::with_capacity(descriptor.columns.len());
            let mut working = Map::new();
            for (index, column) in descriptor.columns.iter().enumerate() {
                let value = self.working.get(&column.key).unwrap_or(&Value::Null);
                let stored = self.stored.as_ref().and_then(|s| s.get(index));
                let encoded = converter.encode(value, column, stored)?;
                raw.push(encoded.raw);
                working.insert(column.key.clone(), encoded.working);
            }
            (raw, working)
        };
        self.raw = raw;
        self.working = working;

        if cascade {
            self.link_children();
            self.save_children(session, true)?;
        }
        self.write_row(session)?;
        if cascade {
            self.save_children(session, false)?;
        }

        self.exists = true;
        self.stored = Some(self.raw.clone());
        tracing::trace!(entity = %descriptor.name, "saved");
        Ok(())
    }

    /// Points every owned child's foreign key at this instance.
    fn link_children(&mut self) {
        for rel in self.descriptor.relationships.iter().filter(|r| r.cascades()) {
            let Some(children) = self.children.get_mut(&rel.key) else {
                continue;
            };
            let value = self.working.get(&rel.local_key).cloned().unwrap_or(Value::Null);
            for child in children.iter_mut() {
                child.working.insert(rel.foreign_key.clone(), value.clone());
            }
        }
    }

    fn save_children(&mut self, session: &Session, before_parent: bool) -> CoreResult<()> {
        let descriptor = Arc::clone(&self.descriptor);
        for rel in owned(&descriptor, before_parent) {
            if let Some(children) = self.children.get_mut(&rel.key) {
                for child in children.iter_mut() {
                    child.save_cascade(session, true)?;
                }
            }
        }
        Ok(())
    }

    fn write_row(&self, session: &Session) -> CoreResult<()> {
        let name = &self.descriptor.name;
        let columns: Vec<(&str, RawValue)> = self
            .descriptor
            .columns
            .iter()
            .map(|c| c.key.as_str())
            .zip(self.raw.iter().cloned())
            .collect();

        match (&self.stored, self.exists) {
            (Some(stored), true) => {
                let update = statement::update(&self.descriptor.table, &columns, &self.row_key(stored))?;
                let changed = session
                    .execute(&update)
                    .map_err(|err| CoreError::from_write(name, err))?;
                if changed == 0 {
                    return Err(CoreError::not_found(name, self.key_text(stored)));
                }
            }
            _ => {
                let insert = statement::insert(&self.descriptor.table, &columns)?;
                session
                    .execute(&insert)
                    .map_err(|err| CoreError::from_write(name, err))?;
            }
        }
        Ok(())
    }

    /// Deletes the instance on a new session.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::delete_in`].
    pub fn delete(&mut self, cascade: bool) -> CoreResult<()> {
        let session = self.store.session()?;
        self.delete_in(&session, cascade)
    }

    /// Deletes the row, and with `cascade` its owned children as they are
    /// currently stored.
    ///
    /// Children marked to be modified first are deleted before the row,
    /// the rest after it. Deleting an instance that was never saved only
    /// marks it deleted.
    ///
    /// # Errors
    ///
    /// Returns storage errors and errors raised by delete hooks.
    pub fn delete_in(&mut self, session: &Session, cascade: bool) -> CoreResult<()> {
        self.delete_cascade(session, cascade).inspect_err(|err| {
            tracing::warn!(operation = "delete", entity = %self.descriptor.name, error = %err, "delete failed");
        })
    }

    fn delete_cascade(&mut self, session: &Session, cascade: bool) -> CoreResult<()> {
        if self.deleted {
            return Ok(());
        }
        if let Some(stored) = self.stored.clone().filter(|_| self.exists) {
            if let Some(hooks) = self.store.registry().hooks(&self.descriptor.name) {
                hooks.before_delete(self)?;
            }

            let descriptor = Arc::clone(&self.descriptor);
            let mut children = if cascade {
                self.load_children(session, RelationshipDescriptor::cascades)?
            } else {
                BTreeMap::new()
            };

            delete_children(&descriptor, &mut children, session, true)?;
            let delete = statement::delete(&descriptor.table, &self.row_key(&stored))?;
            session
                .execute(&delete)
                .map_err(|err| CoreError::from_write(&descriptor.name, err))?;
            delete_children(&descriptor, &mut children, session, false)?;
            tracing::trace!(entity = %descriptor.name, "deleted");
        }

        self.working.clear();
        self.raw.clear();
        self.stored = None;
        self.children.clear();
        self.exists = false;
        self.deleted = true;
        Ok(())
    }

    /// Loads the stored children of every relationship passing `filter`.
    fn load_children(
        &self,
        session: &Session,
        filter: impl Fn(&RelationshipDescriptor) -> bool,
    ) -> CoreResult<BTreeMap<String, Fetched>> {
        let registry = self.store.registry();
        let mut children = BTreeMap::new();
        for rel in self.descriptor.relationships.iter().filter(|r| filter(r)) {
            let child_type = registry.resolve(&rel.child_type)?;
            let local = self
                .descriptor
                .column_index(&rel.local_key)
                .and_then(|i| self.raw.get(i))
                .cloned()
                .unwrap_or(RawValue::Null);
            let found = if local.is_null() {
                Vec::new()
            } else {
                let criteria = Criteria::exact([(rel.foreign_key.clone(), local)]);
                self.store.fetch(session, child_type, &criteria)?
            };
            children.insert(rel.key.clone(), Fetched::for_cardinality(rel.cardinality, found));
        }
        Ok(children)
    }

    /// Primary key pairs, or every column when the type has no key.
    fn row_key(&self, values: &[RawValue]) -> Vec<(String, RawValue)> {
        let pk: Vec<_> = self
            .descriptor
            .columns
            .iter()
            .zip(values)
            .filter(|(c, _)| c.flags.primary_key)
            .map(|(c, v)| (c.key.clone(), v.clone()))
            .collect();
        if !pk.is_empty() {
            return pk;
        }
        self.descriptor
            .columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.key.clone(), v.clone()))
            .collect()
    }

    fn key_text(&self, values: &[RawValue]) -> String {
        self.row_key(values)
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn ensure_live(&self, operation: &str) -> CoreResult<()> {
        if self.deleted {
            return Err(CoreError::invalid_operation(format!(
                "cannot {operation} a deleted {}",
                self.descriptor.name
            )));
        }
        Ok(())
    }

    /// The instance as exposed to API clients.
    ///
    /// Only columns flagged for the API appear. Each numeric date column
    /// is followed by a `<key>_date_formatted` companion. Children appear
    /// under their relationship keys. Types with their own view hook use
    /// that instead.
    #[must_use]
    pub fn to_api_view(&self) -> Value {
        if let Some(view) = self
            .store
            .registry()
            .hooks(&self.descriptor.name)
            .and_then(|hooks| hooks.api_view(self))
        {
            return view;
        }

        let mut view = Map::new();
        for column in self.descriptor.columns.iter().filter(|c| c.flags.api) {
            let value = self.working.get(&column.key).cloned().unwrap_or(Value::Null);
            if column.flags.date {
                let formatted = value.as_f64().and_then(|s| timestamp::format(s).ok());
                view.insert(format!("{}_date_formatted", column.key), Value::from(formatted));
            }
            view.insert(column.key.clone(), value);
        }
        for rel in &self.descriptor.relationships {
            let children = self
                .children
                .get(&rel.key)
                .map_or(Value::Null, Fetched::to_api_view);
            view.insert(rel.key.clone(), children);
        }
        Value::Object(view)
    }
}

fn owned(
    descriptor: &EntityTypeDescriptor,
    before_parent: bool,
) -> impl Iterator<Item = &RelationshipDescriptor> {
    descriptor
        .relationships
        .iter()
        .filter(move |r| r.cascades() && r.modify_before_parent == before_parent)
}

fn delete_children(
    descriptor: &EntityTypeDescriptor,
    children: &mut BTreeMap<String, Fetched>,
    session: &Session,
    before_parent: bool,
) -> CoreResult<()> {
    for rel in owned(descriptor, before_parent) {
        if let Some(list) = children.get_mut(&rel.key) {
            for child in list.iter_mut() {
                child.delete_cascade(session, true)?;
            }
        }
    }
    Ok(())
}

fn draft_children(
    store: &Store,
    session: &Session,
    parent: &EntityTypeDescriptor,
    rel: &RelationshipDescriptor,
    value: Value,
) -> CoreResult<Fetched> {
    if !rel.cascades() {
        return Err(CoreError::invalid_operation(format!(
            "{}.{} is a reference and cannot be written inline",
            parent.name, rel.key
        )));
    }
    let child_type = Arc::clone(store.registry().resolve(&rel.child_type)?);
    let rows = match value {
        Value::Null => Vec::new(),
        Value::Object(row) => vec![row],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                _ => Err(CoreError::validation(
                    &parent.name,
                    &rel.key,
                    ValidationFailure::TypeMismatch,
                    "children must be objects",
                )),
            })
            .collect::<CoreResult<_>>()?,
        _ => {
            return Err(CoreError::validation(
                &parent.name,
                &rel.key,
                ValidationFailure::TypeMismatch,
                "children must be an object or an array of objects",
            ))
        }
    };
    let drafts = rows
        .into_iter()
        .map(|row| EntityInstance::draft(store, session, Arc::clone(&child_type), row))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(Fetched::for_cardinality(rel.cardinality, drafts))
}
