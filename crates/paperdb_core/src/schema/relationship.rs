//! Parent/child relationship descriptors.

/// How many children a relationship holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one child.
    OneToOne,
    /// Any number of children.
    OneToMany,
    /// Any number of children, shared between parents.
    ManyToMany,
}

impl Cardinality {
    /// True when children are held as a list.
    #[must_use]
    pub const fn is_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

/// Whether the parent owns the child rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ownership {
    /// Saves and deletes cascade to the children.
    #[default]
    Owned,
    /// Children are loaded for reading only.
    Reference,
}

/// A declared link from a parent entity type to a child entity type.
///
/// Children are the rows of `child_type` whose `foreign_key` column equals
/// the parent's `local_key` column. They appear on the parent under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    /// Entity type name of the children.
    pub child_type: String,
    /// Key of the children on the parent.
    pub key: String,
    /// Parent column.
    pub local_key: String,
    /// Child column.
    pub foreign_key: String,
    /// One child or many.
    pub cardinality: Cardinality,
    /// Save and delete the children before the parent row.
    pub modify_before_parent: bool,
    /// Owned or reference.
    pub ownership: Ownership,
}

impl RelationshipDescriptor {
    /// Creates an owned relationship written after the parent row.
    pub fn new(
        child_type: impl Into<String>,
        key: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            child_type: child_type.into(),
            key: key.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            cardinality,
            modify_before_parent: false,
            ownership: Ownership::Owned,
        }
    }

    /// Owned one-to-many relationship.
    pub fn one_to_many(
        child_type: impl Into<String>,
        key: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(child_type, key, local_key, foreign_key, Cardinality::OneToMany)
    }

    /// Owned one-to-one relationship.
    pub fn one_to_one(
        child_type: impl Into<String>,
        key: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(child_type, key, local_key, foreign_key, Cardinality::OneToOne)
    }

    /// Writes and deletes the children before the parent row.
    #[must_use]
    pub fn modify_before_parent(mut self) -> Self {
        self.modify_before_parent = true;
        self
    }

    /// Makes the relationship read-only.
    #[must_use]
    pub fn reference(mut self) -> Self {
        self.ownership = Ownership::Reference;
        self
    }

    /// True when saves and deletes cascade through this relationship.
    #[must_use]
    pub fn cascades(&self) -> bool {
        self.ownership == Ownership::Owned
    }
}
