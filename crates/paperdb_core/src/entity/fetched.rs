//! Result shapes for fetched entities.

use super::EntityInstance;
use crate::schema::Cardinality;
use serde_json::Value;

/// Zero, one or many instances.
///
/// Top-level lookups yield [`Fetched::One`] when exactly one row matched.
/// Children follow their relationship: one-to-one children are `One` or
/// `Empty`, the others are always `Many`, possibly empty.
#[derive(Debug, Clone, Default)]
pub enum Fetched {
    /// Nothing matched.
    #[default]
    Empty,
    /// A single instance.
    One(Box<EntityInstance>),
    /// A list of instances.
    Many(Vec<EntityInstance>),
}

impl Fetched {
    /// Shapes a row set for a top-level lookup.
    #[must_use]
    pub fn from_vec(mut instances: Vec<EntityInstance>) -> Self {
        match instances.len() {
            0 => Self::Empty,
            1 => instances.pop().map_or(Self::Empty, |i| Self::One(Box::new(i))),
            _ => Self::Many(instances),
        }
    }

    /// Shapes a row set for a relationship.
    pub(crate) fn for_cardinality(cardinality: Cardinality, instances: Vec<EntityInstance>) -> Self {
        if cardinality.is_many() {
            Self::Many(instances)
        } else {
            instances
                .into_iter()
                .next()
                .map_or(Self::Empty, |i| Self::One(Box::new(i)))
        }
    }

    /// True when no instance is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of instances held.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Many(list) => list.len(),
        }
    }

    /// The instance, when exactly one is held.
    #[must_use]
    pub fn one(&self) -> Option<&EntityInstance> {
        match self {
            Self::One(instance) => Some(instance),
            Self::Many(list) if list.len() == 1 => list.first(),
            _ => None,
        }
    }

    /// Iterates over the held instances.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityInstance> {
        match self {
            Self::Empty => <&[EntityInstance]>::default().iter(),
            Self::One(instance) => std::slice::from_ref(instance.as_ref()).iter(),
            Self::Many(list) => list.iter(),
        }
    }

    /// Iterates mutably over the held instances.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, EntityInstance> {
        match self {
            Self::Empty => <&mut [EntityInstance]>::default().iter_mut(),
            Self::One(instance) => std::slice::from_mut(instance.as_mut()).iter_mut(),
            Self::Many(list) => list.iter_mut(),
        }
    }

    /// All held instances as a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntityInstance> {
        match self {
            Self::Empty => Vec::new(),
            Self::One(instance) => vec![*instance],
            Self::Many(list) => list,
        }
    }

    /// API view: an object, an array, or null.
    #[must_use]
    pub fn to_api_view(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::One(instance) => instance.to_api_view(),
            Self::Many(list) => Value::Array(list.iter().map(EntityInstance::to_api_view).collect()),
        }
    }
}

impl<'a> IntoIterator for &'a Fetched {
    type Item = &'a EntityInstance;
    type IntoIter = std::slice::Iter<'a, EntityInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Fetched {
    type Item = EntityInstance;
    type IntoIter = std::vec::IntoIter<EntityInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}
