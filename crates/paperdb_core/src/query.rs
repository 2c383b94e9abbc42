//! Match criteria in working-value terms.

use crate::error::{CoreError, CoreResult, ValidationFailure};
use crate::schema::EntityTypeDescriptor;
use paperdb_codec::RawValue;
use paperdb_storage::statement::{Criteria, RawFilter};
use serde_json::{Map, Value};
use std::fmt;

/// Which rows of an entity type an operation addresses.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Match {
    /// Every row, in the type's default order.
    #[default]
    All,
    /// Rows whose columns equal every given scalar.
    Exact(Map<String, Value>),
    /// A raw SQL filter appended after `FROM <table>`.
    Filter(RawFilter),
}

impl Match {
    /// Every row.
    #[must_use]
    pub fn all() -> Self {
        Self::All
    }

    /// Exact match on column/value pairs.
    pub fn exact<K, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Exact(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Raw filter with bound parameters.
    #[must_use]
    pub fn filter(filter: RawFilter) -> Self {
        Self::Filter(filter)
    }

    /// True for [`Match::All`] and for an empty exact match.
    #[must_use]
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Exact(map) => map.is_empty(),
            Self::Filter(_) => false,
        }
    }

    /// Lowers the match to storage criteria for `descriptor`.
    ///
    /// Exact keys must name columns; values must be scalars. Booleans
    /// become `0`/`1`. Password columns cannot be matched because their
    /// stored form is randomized ciphertext.
    pub(crate) fn to_criteria(&self, descriptor: &EntityTypeDescriptor) -> CoreResult<Criteria> {
        match self {
            Self::All => Ok(Criteria::All),
            Self::Filter(filter) => Ok(Criteria::Filter(filter.clone())),
            Self::Exact(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let column = descriptor.column_by_key(key).ok_or_else(|| {
                        CoreError::validation(
                            &descriptor.name,
                            key,
                            ValidationFailure::UnknownColumn,
                            "not a column of this type",
                        )
                    })?;
                    if column.flags.password {
                        return Err(CoreError::validation(
                            &descriptor.name,
                            key,
                            ValidationFailure::InvalidMatch,
                            "password columns cannot be matched",
                        ));
                    }
                    let raw = RawValue::from_scalar(value).ok_or_else(|| {
                        CoreError::validation(
                            &descriptor.name,
                            key,
                            ValidationFailure::InvalidMatch,
                            "match values must be scalars",
                        )
                    })?;
                    pairs.push((key.clone(), raw));
                }
                Ok(Criteria::Exact(pairs))
            }
        }
    }
}

impl From<RawFilter> for Match {
    fn from(filter: RawFilter) -> Self {
        Self::Filter(filter)
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Exact(map) => {
                let terms: Vec<String> = map.iter().map(|(k, v)| format!("{k} = {v}")).collect();
                f.write_str(&terms.join(" AND "))
            }
            Self::Filter(filter) => f.write_str(filter.clause()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, Generator};
    use serde_json::json;

    fn user() -> EntityTypeDescriptor {
        EntityTypeDescriptor::new("user", "users")
            .column(ColumnDescriptor::integer("id").primary_key().generated(Generator::UniqueInt))
            .column(ColumnDescriptor::text("username"))
            .column(ColumnDescriptor::integer("active").boolean())
            .column(ColumnDescriptor::text("password").password())
    }

    #[test]
    fn exact_lowers_to_raw_pairs() {
        let criteria = Match::exact([("username", json!("alice")), ("active", json!(true))])
            .to_criteria(&user())
            .unwrap();
        assert_eq!(
            criteria,
            Criteria::Exact(vec![
                ("active".into(), RawValue::Integer(1)),
                ("username".into(), RawValue::Text("alice".into())),
            ])
        );
    }

    #[test]
    fn unknown_columns_rejected() {
        let err = Match::exact([("nickname", json!("al"))]).to_criteria(&user()).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::UnknownColumn));
    }

    #[test]
    fn structured_values_and_passwords_rejected() {
        let err = Match::exact([("username", json!(["a"]))]).to_criteria(&user()).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::InvalidMatch));

        let err = Match::exact([("password", json!("x"))]).to_criteria(&user()).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::InvalidMatch));
    }

    #[test]
    fn display() {
        assert_eq!(Match::exact([("id", json!(2))]).to_string(), "id = 2");
        assert_eq!(Match::all().to_string(), "all");
    }
}
