//! Entity type descriptors.

use super::column::{sql_literal, ColumnDescriptor};
use super::relationship::RelationshipDescriptor;
use paperdb_storage::statement::OrderBy;
use serde_json::Value;

/// How the store addresses rows of a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntityKind {
    /// Ordinary rows with full CRUD.
    #[default]
    Standard,
    /// One fixed row read and written a column at a time.
    Config,
}

/// Everything the engine knows about one entity type.
///
/// Column order is significant: it is the column order of the table and of
/// every generated `SELECT` and `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypeDescriptor {
    /// Type name used by callers.
    pub name: String,
    /// Backing table.
    pub table: String,
    /// Standard or config.
    pub kind: EntityKind,
    /// Columns in table order.
    pub columns: Vec<ColumnDescriptor>,
    /// Declared children.
    pub relationships: Vec<RelationshipDescriptor>,
    /// Rows inserted when the table is created.
    pub defaults: Vec<Value>,
    /// Order applied when fetching without criteria.
    pub default_order: Vec<OrderBy>,
}

impl EntityTypeDescriptor {
    /// Creates a standard entity type with no columns.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            kind: EntityKind::Standard,
            columns: Vec::new(),
            relationships: Vec::new(),
            defaults: Vec::new(),
            default_order: Vec::new(),
        }
    }

    /// Creates a config entity type with no columns.
    pub fn config(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Config,
            ..Self::new(name, table)
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Appends a seed row.
    #[must_use]
    pub fn default_row(mut self, row: Value) -> Self {
        self.defaults.push(row);
        self
    }

    /// Appends a default ordering term.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.default_order.push(order);
        self
    }

    /// True for config types.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.kind == EntityKind::Config
    }

    /// Looks up a column by key.
    #[must_use]
    pub fn column_by_key(&self, key: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    /// Column keys in table order.
    #[must_use]
    pub fn column_keys(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.as_str()).collect()
    }

    /// Primary key columns, in table order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.flags.primary_key).collect()
    }

    /// Looks up a relationship by its key on the parent.
    #[must_use]
    pub fn relationship_by_key(&self, key: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.key == key)
    }

    /// `CREATE TABLE` statement for this type.
    ///
    /// `foreign_keys` are `(column, parent_table, parent_column)` triples,
    /// computed by the registry from the relationships pointing at this
    /// type. Every foreign key cascades on delete and update.
    #[must_use]
    pub fn create_statement(&self, foreign_keys: &[(String, String, String)]) -> String {
        let primary: Vec<&str> = self
            .primary_key()
            .into_iter()
            .map(|c| c.key.as_str())
            .collect();
        let inline = primary.len() == 1;

        let mut parts: Vec<String> = Vec::new();
        for column in &self.columns {
            let mut definition = column.definition(inline);
            if self.is_config() && column.flags.primary_key {
                if let Some(literal) = column.default.as_ref().and_then(sql_literal) {
                    definition.push_str(&format!(" CHECK ({} = {literal})", column.key));
                }
            }
            parts.push(definition);
        }
        if primary.len() > 1 {
            parts.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }
        for (column, parent_table, parent_column) in foreign_keys {
            parts.push(format!(
                "FOREIGN KEY ({column}) REFERENCES {parent_table} ({parent_column}) \
                 ON DELETE CASCADE ON UPDATE CASCADE"
            ));
        }

        format!("CREATE TABLE {} (\n    {}\n);", self.table, parts.join(",\n    "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Generator;

    #[test]
    fn create_statement_for_child_table() {
        let token = EntityTypeDescriptor::new("token", "tokens")
            .column(ColumnDescriptor::integer("user_id").not_null())
            .column(ColumnDescriptor::text("token").unique().not_null())
            .column(ColumnDescriptor::numeric("expires").not_null().date());

        let sql = token.create_statement(&[("user_id".into(), "users".into(), "id".into())]);
        assert_eq!(
            sql,
            "CREATE TABLE tokens (\n    \
             user_id INTEGER NOT NULL,\n    \
             token TEXT UNIQUE NOT NULL,\n    \
             expires NUMERIC NOT NULL,\n    \
             FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE ON UPDATE CASCADE\n);"
        );
    }

    #[test]
    fn config_key_is_pinned() {
        let settings = EntityTypeDescriptor::config("settings", "settings")
            .column(ColumnDescriptor::integer("id").primary_key().default_value(0))
            .column(ColumnDescriptor::blob("image").json());
        let sql = settings.create_statement(&[]);
        assert!(sql.contains("id INTEGER PRIMARY KEY NOT NULL DEFAULT (0) CHECK (id = 0)"));
        assert!(settings.is_config());
    }

    #[test]
    fn composite_primary_key() {
        let link = EntityTypeDescriptor::new("link", "links")
            .column(ColumnDescriptor::integer("a").primary_key().generated(Generator::UniqueInt))
            .column(ColumnDescriptor::integer("b").primary_key().generated(Generator::UniqueInt));
        let sql = link.create_statement(&[]);
        assert!(sql.contains("a INTEGER NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (a, b)"));
    }

    #[test]
    fn lookups() {
        let user = EntityTypeDescriptor::new("user", "users")
            .column(ColumnDescriptor::integer("id").primary_key().generated(Generator::UniqueInt))
            .column(ColumnDescriptor::text("username"));
        assert_eq!(user.column_index("username"), Some(1));
        assert!(user.column_by_key("missing").is_none());
        assert_eq!(user.column_keys(), vec!["id", "username"]);
        assert_eq!(user.primary_key().len(), 1);
    }
}
