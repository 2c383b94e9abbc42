//! The schema registry.

use super::column::{ColumnDescriptor, Generator};
use super::descriptor::EntityTypeDescriptor;
use super::relationship::RelationshipDescriptor;
use crate::entity::EntityHooks;
use crate::error::{CoreError, CoreResult};
use paperdb_codec::StorageKind;
use paperdb_storage::statement::check_identifier;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Read-only catalog of entity types, resolved by name.
///
/// Built once through [`RegistryBuilder`], which validates the whole
/// schema, and shared by every store operation afterwards. Types keep
/// their registration order; tables are created and seeded in that order.
pub struct SchemaRegistry {
    types: Vec<Arc<EntityTypeDescriptor>>,
    index: HashMap<String, usize>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field(
                "types",
                &self.types.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The built-in PaperDB catalog.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the catalog is validated like any other.
    pub fn builtin() -> CoreResult<Self> {
        super::catalog::builtin().build()
    }

    /// Resolves a type name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] for unregistered names.
    pub fn resolve(&self, name: &str) -> CoreResult<&Arc<EntityTypeDescriptor>> {
        self.get(name)
            .ok_or_else(|| CoreError::unknown_entity_type(name))
    }

    /// Looks up a type name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityTypeDescriptor>> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// All types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityTypeDescriptor>> {
        self.types.iter()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The config (singleton) type, if one is registered.
    #[must_use]
    pub fn config_type(&self) -> Option<&Arc<EntityTypeDescriptor>> {
        self.types.iter().find(|t| t.is_config())
    }

    /// Behavior attached to a type, if any.
    #[must_use]
    pub fn hooks(&self, name: &str) -> Option<&dyn EntityHooks> {
        self.hooks.get(name).map(|h| h.as_ref())
    }

    /// `CREATE TABLE` statement for a type, including foreign keys derived
    /// from every relationship that involves it.
    ///
    /// # Errors
    ///
    /// Returns an error for unregistered names.
    pub fn create_statement(&self, name: &str) -> CoreResult<String> {
        let descriptor = self.resolve(name)?;
        Ok(descriptor.create_statement(&self.foreign_keys(descriptor)))
    }

    /// `(column, referenced_table, referenced_column)` for `descriptor`.
    ///
    /// An owned relationship puts a key on the child table pointing at the
    /// parent; a reference puts a key on the parent pointing at the
    /// referenced row. Children written before their parent get no key,
    /// and neither does a link whose referenced column is not unique.
    fn foreign_keys(&self, descriptor: &EntityTypeDescriptor) -> Vec<(String, String, String)> {
        let mut keys = Vec::new();
        for parent in &self.types {
            for rel in &parent.relationships {
                if rel.child_type != descriptor.name || !rel.cascades() || rel.modify_before_parent {
                    continue;
                }
                if is_unique(parent.column_by_key(&rel.local_key)) {
                    keys.push((
                        rel.foreign_key.clone(),
                        parent.table.clone(),
                        rel.local_key.clone(),
                    ));
                }
            }
        }
        for rel in descriptor.relationships.iter().filter(|r| !r.cascades()) {
            if let Some(target) = self.get(&rel.child_type) {
                if is_unique(target.column_by_key(&rel.foreign_key)) {
                    keys.push((
                        rel.local_key.clone(),
                        target.table.clone(),
                        rel.foreign_key.clone(),
                    ));
                }
            }
        }
        keys
    }
}

fn is_unique(column: Option<&ColumnDescriptor>) -> bool {
    column.is_some_and(|c| c.flags.primary_key || c.flags.unique)
}

/// Collects and validates entity types.
#[derive(Default)]
pub struct RegistryBuilder {
    types: Vec<EntityTypeDescriptor>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl RegistryBuilder {
    /// Adds an entity type.
    #[must_use]
    pub fn register(mut self, descriptor: EntityTypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Attaches behavior to a type.
    #[must_use]
    pub fn hooks(mut self, name: impl Into<String>, hooks: impl EntityHooks + 'static) -> Self {
        self.hooks.insert(name.into(), Arc::new(hooks));
        self
    }

    /// Validates the schema and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] describing the first problem found.
    pub fn build(self) -> CoreResult<SchemaRegistry> {
        let mut index = HashMap::new();
        let mut tables = HashSet::new();
        for (i, descriptor) in self.types.iter().enumerate() {
            if index.insert(descriptor.name.clone(), i).is_some() {
                return Err(CoreError::schema(format!(
                    "entity type {} registered twice",
                    descriptor.name
                )));
            }
            if !tables.insert(descriptor.table.as_str()) {
                return Err(CoreError::schema(format!(
                    "table {} used by more than one type",
                    descriptor.table
                )));
            }
            validate_type(descriptor)?;
        }

        if self.types.iter().filter(|t| t.is_config()).count() > 1 {
            return Err(CoreError::schema("more than one config type"));
        }

        for descriptor in &self.types {
            for rel in &descriptor.relationships {
                let child = index
                    .get(&rel.child_type)
                    .map(|&i| &self.types[i])
                    .ok_or_else(|| {
                        CoreError::schema(format!(
                            "{}.{} refers to unknown type {}",
                            descriptor.name, rel.key, rel.child_type
                        ))
                    })?;
                validate_relationship(descriptor, child, rel)?;
            }
        }

        check_acyclic(&self.types, &index)?;

        for name in self.hooks.keys() {
            if !index.contains_key(name) {
                return Err(CoreError::schema(format!("hooks for unknown type {name}")));
            }
        }

        Ok(SchemaRegistry {
            types: self.types.into_iter().map(Arc::new).collect(),
            index,
            hooks: self.hooks,
        })
    }
}

fn schema_err(descriptor: &EntityTypeDescriptor, message: impl fmt::Display) -> CoreError {
    CoreError::schema(format!("{}: {message}", descriptor.name))
}

fn validate_type(descriptor: &EntityTypeDescriptor) -> CoreResult<()> {
    if descriptor.name.is_empty() {
        return Err(CoreError::schema("entity type with empty name"));
    }
    check_identifier(&descriptor.table).map_err(|e| schema_err(descriptor, e))?;
    if descriptor.columns.is_empty() {
        return Err(schema_err(descriptor, "no columns"));
    }

    let mut keys = HashSet::new();
    for column in &descriptor.columns {
        check_identifier(&column.key).map_err(|e| schema_err(descriptor, e))?;
        if !keys.insert(column.key.as_str()) {
            return Err(schema_err(descriptor, format!("duplicate column {}", column.key)));
        }
        validate_column(descriptor, column)?;
    }
    for order in &descriptor.default_order {
        if !keys.contains(order.column.as_str()) {
            return Err(schema_err(descriptor, format!("ordering on unknown column {}", order.column)));
        }
    }
    for rel in &descriptor.relationships {
        if keys.contains(rel.key.as_str()) {
            return Err(schema_err(descriptor, format!("relationship {} shadows a column", rel.key)));
        }
    }
    for row in &descriptor.defaults {
        if !row.is_object() {
            return Err(schema_err(descriptor, "seed rows must be objects"));
        }
    }

    if descriptor.is_config() {
        let primary = descriptor.primary_key();
        if primary.len() != 1 || primary[0].default.is_none() {
            return Err(schema_err(
                descriptor,
                "config types need exactly one primary key column with a default",
            ));
        }
        if !descriptor.relationships.is_empty() {
            return Err(schema_err(descriptor, "config types cannot have relationships"));
        }
    }
    Ok(())
}

fn validate_column(descriptor: &EntityTypeDescriptor, column: &ColumnDescriptor) -> CoreResult<()> {
    let flags = column.flags;
    let fail = |what: &str| Err(schema_err(descriptor, format!("{}: {what}", column.key)));

    if flags.primary_key && column.default.is_none() && !column.generator.is_some() {
        return fail("primary key needs a default or a generator");
    }
    match (&column.generator, column.kind) {
        (Generator::UniqueInt, kind) if kind != StorageKind::Integer => {
            return fail("integer generator on a non-integer column")
        }
        (Generator::UniqueToken(_), kind) if kind != StorageKind::Text => {
            return fail("token generator on a non-text column")
        }
        _ => {}
    }
    if flags.boolean && column.kind != StorageKind::Integer {
        return fail("boolean flag on a non-integer column");
    }
    if flags.password && (column.kind != StorageKind::Text || flags.json || flags.unique) {
        return fail("password columns must be plain, non-unique text");
    }
    Ok(())
}

fn validate_relationship(
    parent: &EntityTypeDescriptor,
    child: &EntityTypeDescriptor,
    rel: &RelationshipDescriptor,
) -> CoreResult<()> {
    if child.is_config() {
        return Err(schema_err(parent, format!("{} points at a config type", rel.key)));
    }
    if parent.column_by_key(&rel.local_key).is_none() {
        return Err(schema_err(parent, format!("{}: no local column {}", rel.key, rel.local_key)));
    }
    if child.column_by_key(&rel.foreign_key).is_none() {
        return Err(schema_err(
            parent,
            format!("{}: {} has no column {}", rel.key, child.name, rel.foreign_key),
        ));
    }
    if parent.relationships.iter().filter(|r| r.key == rel.key).count() > 1 {
        return Err(schema_err(parent, format!("duplicate relationship {}", rel.key)));
    }
    Ok(())
}

/// Hydration follows every relationship, so the relationship graph must
/// not loop.
fn check_acyclic(types: &[EntityTypeDescriptor], index: &HashMap<String, usize>) -> CoreResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        i: usize,
        types: &[EntityTypeDescriptor],
        index: &HashMap<String, usize>,
        marks: &mut [Mark],
    ) -> CoreResult<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                return Err(CoreError::schema(format!(
                    "relationship cycle through {}",
                    types[i].name
                )))
            }
            Mark::New => {}
        }
        marks[i] = Mark::Active;
        for rel in &types[i].relationships {
            if let Some(&child) = index.get(&rel.child_type) {
                visit(child, types, index, marks)?;
            }
        }
        marks[i] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::New; types.len()];
    for i in 0..types.len() {
        visit(i, types, index, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, RelationshipDescriptor};

    fn parent() -> EntityTypeDescriptor {
        EntityTypeDescriptor::new("parent", "parents")
            .column(ColumnDescriptor::integer("id").primary_key().generated(Generator::UniqueInt))
            .relationship(RelationshipDescriptor::one_to_many("child", "children", "id", "parent_id"))
    }

    fn child() -> EntityTypeDescriptor {
        EntityTypeDescriptor::new("child", "children")
            .column(ColumnDescriptor::integer("parent_id").not_null())
            .column(ColumnDescriptor::text("name"))
    }

    #[test]
    fn resolve_registered_types() {
        let registry = SchemaRegistry::builder()
            .register(parent())
            .register(child())
            .build()
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("child").unwrap().table, "children");
        assert!(matches!(
            registry.resolve("ghost"),
            Err(CoreError::UnknownEntityType { .. })
        ));
        assert!(registry.config_type().is_none());
    }

    #[test]
    fn child_table_references_parent() {
        let registry = SchemaRegistry::builder()
            .register(parent())
            .register(child())
            .build()
            .unwrap();
        let sql = registry.create_statement("child").unwrap();
        assert!(sql.contains("FOREIGN KEY (parent_id) REFERENCES parents (id) ON DELETE CASCADE"));
        assert!(!registry.create_statement("parent").unwrap().contains("FOREIGN KEY"));
    }

    #[test]
    fn modify_first_children_get_no_foreign_key() {
        let parent = EntityTypeDescriptor::new("parent", "parents")
            .column(ColumnDescriptor::integer("id").primary_key().generated(Generator::UniqueInt))
            .relationship(
                RelationshipDescriptor::one_to_many("child", "children", "id", "parent_id")
                    .modify_before_parent(),
            );
        let registry = SchemaRegistry::builder()
            .register(parent)
            .register(child())
            .build()
            .unwrap();
        assert!(!registry.create_statement("child").unwrap().contains("FOREIGN KEY"));
    }

    #[test]
    fn unknown_child_type_rejected() {
        let err = SchemaRegistry::builder().register(parent()).build().unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }

    #[test]
    fn missing_foreign_column_rejected() {
        let bad = EntityTypeDescriptor::new("child", "children")
            .column(ColumnDescriptor::text("name"));
        assert!(SchemaRegistry::builder().register(parent()).register(bad).build().is_err());
    }

    #[test]
    fn primary_key_needs_generator_or_default() {
        let bad = EntityTypeDescriptor::new("thing", "things")
            .column(ColumnDescriptor::integer("id").primary_key());
        assert!(SchemaRegistry::builder().register(bad).build().is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = SchemaRegistry::builder().register(child()).register(child()).build();
        assert!(result.is_err());
    }

    #[test]
    fn hostile_identifiers_rejected() {
        let bad = EntityTypeDescriptor::new("bad", "bad; DROP TABLE users")
            .column(ColumnDescriptor::text("name"));
        assert!(SchemaRegistry::builder().register(bad).build().is_err());
    }

    #[test]
    fn cycles_rejected() {
        let a = EntityTypeDescriptor::new("a", "a_rows")
            .column(ColumnDescriptor::integer("id").primary_key().generated(Generator::UniqueInt))
            .relationship(RelationshipDescriptor::one_to_many("b", "bs", "id", "a_id"));
        let b = EntityTypeDescriptor::new("b", "b_rows")
            .column(ColumnDescriptor::integer("a_id"))
            .relationship(RelationshipDescriptor::one_to_one("a", "owner", "a_id", "id").reference());
        let err = SchemaRegistry::builder().register(a).register(b).build().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(registry.config_type().unwrap().name, "settings");
        for descriptor in registry.iter() {
            registry.create_statement(&descriptor.name).unwrap();
        }
    }
}
