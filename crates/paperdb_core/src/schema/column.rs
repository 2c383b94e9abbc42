//! Column descriptors.

use paperdb_codec::StorageKind;
use serde_json::Value;

/// Where a unique token generator takes its alphabet and length from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenArgs {
    /// The `token` blob of the settings row (`choices`, `length`).
    Settings,
    /// A fixed alphabet and length.
    Fixed {
        /// Characters to draw from.
        alphabet: String,
        /// Token length in characters.
        length: usize,
    },
}

/// How a column fills itself when given null.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Generator {
    /// No generator; null is a value like any other.
    #[default]
    None,
    /// Smallest non-negative integer not already used in the column.
    UniqueInt,
    /// Random string that no row holds yet.
    UniqueToken(TokenArgs),
}

impl Generator {
    /// True unless this is [`Generator::None`].
    #[must_use]
    pub fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Constraint and conversion flags of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    /// Part of the primary key.
    pub primary_key: bool,
    /// No two rows share a value.
    pub unique: bool,
    /// Null is rejected unless a default or generator supplies a value.
    ///
    /// Integer and text columns reject null whether or not this is set.
    pub not_null: bool,
    /// Integer column exposed as `true`/`false`.
    pub boolean: bool,
    /// Text column encrypted at rest.
    pub password: bool,
    /// Value is a JSON document.
    pub json: bool,
    /// Value is a Unix timestamp in seconds.
    pub date: bool,
    /// Included in API views.
    pub api: bool,
}

/// One column of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name, also the key in the working form.
    pub key: String,
    /// Declared storage kind.
    pub kind: StorageKind,
    /// Constraints and conversions.
    pub flags: ColumnFlags,
    /// Fills null values.
    pub generator: Generator,
    /// Working value used when null is given.
    pub default: Option<Value>,
}

impl ColumnDescriptor {
    /// Creates a plain nullable column.
    pub fn new(key: impl Into<String>, kind: StorageKind) -> Self {
        Self {
            key: key.into(),
            kind,
            flags: ColumnFlags::default(),
            generator: Generator::None,
            default: None,
        }
    }

    /// Creates an `INTEGER` column.
    pub fn integer(key: impl Into<String>) -> Self {
        Self::new(key, StorageKind::Integer)
    }

    /// Creates a `TEXT` column.
    pub fn text(key: impl Into<String>) -> Self {
        Self::new(key, StorageKind::Text)
    }

    /// Creates a `NUMERIC` column.
    pub fn numeric(key: impl Into<String>) -> Self {
        Self::new(key, StorageKind::Numeric)
    }

    /// Creates a `REAL` column.
    pub fn real(key: impl Into<String>) -> Self {
        Self::new(key, StorageKind::Real)
    }

    /// Creates a `BLOB` column.
    pub fn blob(key: impl Into<String>) -> Self {
        Self::new(key, StorageKind::Blob)
    }

    /// Marks the column as (part of) the primary key. Implies unique and
    /// not null.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.flags.primary_key = true;
        self.flags.unique = true;
        self.flags.not_null = true;
        self
    }

    /// Marks the column unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self
    }

    /// Marks the column not null.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.flags.not_null = true;
        self
    }

    /// Marks an integer column as boolean.
    #[must_use]
    pub fn boolean(mut self) -> Self {
        self.flags.boolean = true;
        self
    }

    /// Marks a text column as an encrypted password.
    #[must_use]
    pub fn password(mut self) -> Self {
        self.flags.password = true;
        self
    }

    /// Marks the column as holding a JSON document.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.flags.json = true;
        self
    }

    /// Marks the column as a timestamp.
    #[must_use]
    pub fn date(mut self) -> Self {
        self.flags.date = true;
        self
    }

    /// Exposes the column in API views.
    #[must_use]
    pub fn api(mut self) -> Self {
        self.flags.api = true;
        self
    }

    /// Sets the generator.
    #[must_use]
    pub fn generated(mut self, generator: Generator) -> Self {
        self.generator = generator;
        self
    }

    /// Sets a static default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// True when values must be checked against existing rows before a
    /// write. Generated columns are unique by construction.
    #[must_use]
    pub fn needs_unique_check(&self) -> bool {
        self.flags.unique && !self.generator.is_some()
    }

    /// Column definition for `CREATE TABLE`.
    pub(crate) fn definition(&self, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", self.key, self.kind.sql_type());
        if self.flags.primary_key {
            if inline_primary_key {
                sql.push_str(" PRIMARY KEY");
            }
        } else if self.flags.unique {
            sql.push_str(" UNIQUE");
        }
        if self.flags.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(literal) = self.default.as_ref().and_then(sql_literal) {
            sql.push_str(&format!(" DEFAULT ({literal})"));
        }
        sql
    }
}

/// Renders a scalar default as a SQL literal.
pub(crate) fn sql_literal(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(i64::from(*b).to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
