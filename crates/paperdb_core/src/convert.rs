//! Column value conversion between working and raw forms.

use crate::crypto::TextCipher;
use crate::error::{CoreError, CoreResult, ValidationFailure};
use crate::generator;
use crate::password::PasswordPolicy;
use crate::schema::{ColumnDescriptor, EntityTypeDescriptor, Generator, SchemaRegistry, TokenArgs};
use crate::settings::{self, CipherSettings, TokenPolicy};
use paperdb_codec::{json, RawValue, StorageKind};
use paperdb_storage::statement;
use paperdb_storage::Session;
use serde_json::{Number, Value};
use std::cell::OnceCell;

/// A column value in both forms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Encoded {
    pub raw: RawValue,
    pub working: Value,
}

impl Encoded {
    fn new(raw: RawValue, working: Value) -> Self {
        Self { raw, working }
    }
}

/// Converts values of one entity type for the duration of one operation.
///
/// Settings that conversion depends on (cipher, password policy, token
/// policy) are read from the database on first use and kept only as long
/// as the converter.
pub(crate) struct Converter<'a> {
    registry: &'a SchemaRegistry,
    session: &'a Session,
    entity: &'a EntityTypeDescriptor,
    cipher: OnceCell<TextCipher>,
    policy: OnceCell<PasswordPolicy>,
}

impl<'a> Converter<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        session: &'a Session,
        entity: &'a EntityTypeDescriptor,
    ) -> Self {
        Self {
            registry,
            session,
            entity,
            cipher: OnceCell::new(),
            policy: OnceCell::new(),
        }
    }

    fn invalid(&self, column: &ColumnDescriptor, reason: ValidationFailure, detail: impl Into<String>) -> CoreError {
        CoreError::validation(&self.entity.name, &column.key, reason, detail)
    }

    fn mismatch(&self, column: &ColumnDescriptor, found: impl std::fmt::Display) -> CoreError {
        self.invalid(
            column,
            ValidationFailure::TypeMismatch,
            format!("{} column cannot hold {found}", column.kind),
        )
    }

    fn cipher(&self) -> CoreResult<&TextCipher> {
        if let Some(cipher) = self.cipher.get() {
            return Ok(cipher);
        }
        let stored: Option<CipherSettings> =
            settings::load_as(self.session, self.registry, settings::CIPHER)?;
        let stored = stored.ok_or_else(|| CoreError::encryption("no cipher configured"))?;
        let cipher = TextCipher::from_secret(&stored.key, &stored.salt)?;
        Ok(self.cipher.get_or_init(|| cipher))
    }

    fn policy(&self) -> CoreResult<&PasswordPolicy> {
        if let Some(policy) = self.policy.get() {
            return Ok(policy);
        }
        let policy: PasswordPolicy = if self.registry.config_type().is_some() {
            settings::load_as(self.session, self.registry, settings::PASSWORD)?.unwrap_or_default()
        } else {
            PasswordPolicy::default()
        };
        Ok(self.policy.get_or_init(|| policy))
    }

    /// Raw to working.
    pub fn decode(&self, raw: &RawValue, column: &ColumnDescriptor) -> CoreResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match column.kind {
            StorageKind::Integer => match raw {
                RawValue::Integer(n) if column.flags.boolean => Ok(Value::Bool(*n != 0)),
                RawValue::Integer(n) => Ok(Value::from(*n)),
                other => Err(self.mismatch(column, other.kind_name())),
            },
            StorageKind::Text => {
                let RawValue::Text(text) = raw else {
                    return Err(self.mismatch(column, raw.kind_name()));
                };
                if column.flags.password {
                    let plain = self.cipher()?.decrypt(text)?;
                    if let Err(rule) = self.policy()?.check(&plain) {
                        tracing::warn!(
                            entity = %self.entity.name,
                            column = %column.key,
                            rule = %rule,
                            "stored password no longer satisfies the password policy"
                        );
                    }
                    Ok(Value::String(plain))
                } else if column.flags.json {
                    Ok(json::from_raw(raw)?)
                } else {
                    Ok(Value::String(text.clone()))
                }
            }
            StorageKind::Numeric | StorageKind::Real => raw
                .as_real()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.mismatch(column, raw.kind_name())),
            StorageKind::Blob => {
                if column.flags.json {
                    return Ok(json::from_raw(raw)?);
                }
                match raw {
                    RawValue::Blob(bytes) => Ok(Value::String(json::blob_to_string(bytes)?)),
                    RawValue::Text(text) => Ok(Value::String(text.clone())),
                    other => Err(self.mismatch(column, other.kind_name())),
                }
            }
        }
    }

    /// Working to raw, with validation.
    ///
    /// `stored` is the column's last persisted raw value, if the row
    /// exists; a value equal to it is not checked for uniqueness again.
    pub fn encode(
        &self,
        working: &Value,
        column: &ColumnDescriptor,
        stored: Option<&RawValue>,
    ) -> CoreResult<Encoded> {
        let value = if working.is_null() {
            if let Some(default) = &column.default {
                default.clone()
            } else if column.generator.is_some() {
                return self.generate(column);
            } else if column.kind == StorageKind::Blob {
                return if column.flags.json {
                    Ok(Encoded::new(json::to_blob(&Value::Null)?, Value::Null))
                } else {
                    Ok(Encoded::new(RawValue::Null, Value::Null))
                };
            } else if column.flags.not_null
                || matches!(column.kind, StorageKind::Integer | StorageKind::Text)
            {
                return Err(self.invalid(column, ValidationFailure::NullViolation, "value required"));
            } else {
                return Ok(Encoded::new(RawValue::Null, Value::Null));
            }
        } else {
            working.clone()
        };

        let encoded = self.encode_value(value, column)?;
        if column.needs_unique_check() {
            self.check_unique(column, &encoded.raw, stored)?;
        }
        Ok(encoded)
    }

    fn encode_value(&self, value: Value, column: &ColumnDescriptor) -> CoreResult<Encoded> {
        match column.kind {
            StorageKind::Integer => match &value {
                Value::Number(n) => {
                    let int = n.as_i64().ok_or_else(|| self.mismatch(column, n))?;
                    if column.flags.boolean {
                        Ok(Encoded::new(RawValue::Integer(i64::from(int != 0)), Value::Bool(int != 0)))
                    } else {
                        Ok(Encoded::new(RawValue::Integer(int), value))
                    }
                }
                Value::Bool(b) if column.flags.boolean => {
                    Ok(Encoded::new(RawValue::Integer(i64::from(*b)), value))
                }
                other => Err(self.mismatch(column, type_name(other))),
            },
            StorageKind::Text => {
                if column.flags.json {
                    return Ok(Encoded::new(json::to_text(&value)?, value));
                }
                let Value::String(text) = &value else {
                    return Err(self.mismatch(column, type_name(&value)));
                };
                if column.flags.password {
                    self.policy()?
                        .check(text)
                        .map_err(|rule| self.invalid(column, ValidationFailure::PasswordPolicy, rule))?;
                    let sealed = self.cipher()?.encrypt(text)?;
                    return Ok(Encoded::new(RawValue::Text(sealed), value));
                }
                Ok(Encoded::new(RawValue::Text(text.clone()), value))
            }
            StorageKind::Numeric | StorageKind::Real => {
                let number = value
                    .as_f64()
                    .and_then(|f| Number::from_f64(f).map(|n| (f, n)));
                match number {
                    Some((f, n)) => Ok(Encoded::new(RawValue::Real(f), Value::Number(n))),
                    None => Err(self.mismatch(column, type_name(&value))),
                }
            }
            StorageKind::Blob => {
                if column.flags.json {
                    return Ok(Encoded::new(json::to_blob(&value)?, value));
                }
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                Ok(Encoded::new(RawValue::Blob(text.clone().into_bytes()), Value::String(text)))
            }
        }
    }

    fn generate(&self, column: &ColumnDescriptor) -> CoreResult<Encoded> {
        let table = &self.entity.table;
        match &column.generator {
            Generator::UniqueInt => {
                let id = generator::next_int(self.session, table, &column.key)?;
                Ok(Encoded::new(RawValue::Integer(id), Value::from(id)))
            }
            Generator::UniqueToken(args) => {
                let (alphabet, length) = match args {
                    TokenArgs::Fixed { alphabet, length } => (alphabet.clone(), *length),
                    TokenArgs::Settings => {
                        let policy: TokenPolicy =
                            settings::load_as(self.session, self.registry, settings::TOKEN)?
                                .unwrap_or_default();
                        (policy.choices, policy.length)
                    }
                };
                let token =
                    generator::next_token(self.session, table, &column.key, &alphabet, length)?;
                Ok(Encoded::new(RawValue::Text(token.clone()), Value::String(token)))
            }
            Generator::None => Err(self.invalid(column, ValidationFailure::NullViolation, "value required")),
        }
    }

    fn check_unique(&self, column: &ColumnDescriptor, raw: &RawValue, stored: Option<&RawValue>) -> CoreResult<()> {
        if raw.is_null() || stored.is_some_and(|s| same_value(s, raw)) {
            return Ok(());
        }
        let count = statement::count_equal(&self.entity.table, &column.key, raw)?;
        let taken = self
            .session
            .query_column(&count)?
            .first()
            .and_then(RawValue::as_integer)
            .unwrap_or(0);
        if taken > 0 {
            return Err(self.invalid(
                column,
                ValidationFailure::Duplicate,
                format!("{raw} is already taken"),
            ));
        }
        Ok(())
    }
}

/// Equality that treats `1800` and `1800.0` as the same stored number.
#[allow(clippy::float_cmp)]
pub(crate) fn same_value(a: &RawValue, b: &RawValue) -> bool {
    match (a, b) {
        (RawValue::Integer(_) | RawValue::Real(_), RawValue::Integer(_) | RawValue::Real(_)) => {
            a.as_real() == b.as_real()
        }
        _ => a == b,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptionKey;
    use crate::schema::{ColumnDescriptor as Col, EntityTypeDescriptor};
    use paperdb_storage::{InMemoryBackend, SqlBackend};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let settings = EntityTypeDescriptor::config("settings", "settings")
            .column(Col::integer("id").primary_key().default_value(0))
            .column(Col::blob("cipher").json())
            .column(Col::blob("token").json())
            .column(Col::blob("password").json());
        let note = EntityTypeDescriptor::new("note", "notes")
            .column(Col::integer("id").primary_key().generated(Generator::UniqueInt))
            .column(Col::text("title").unique().not_null())
            .column(Col::text("body"))
            .column(Col::integer("pinned").boolean().default_value(false))
            .column(Col::numeric("score"))
            .column(Col::text("meta").json())
            .column(Col::blob("attachment"))
            .column(Col::blob("doc").json())
            .column(Col::text("secret").password());
        SchemaRegistry::builder().register(settings).register(note).build().unwrap()
    }

    fn setup() -> (InMemoryBackend, Session, SchemaRegistry) {
        let registry = registry();
        let backend = InMemoryBackend::new().unwrap();
        let session = backend.connect().unwrap();
        for ty in registry.iter() {
            session.execute_batch(&registry.create_statement(&ty.name).unwrap()).unwrap();
        }
        let cipher = json!({"key": EncryptionKey::generate().to_secret(), "salt": "pepper"});
        let insert = statement::insert(
            "settings",
            &[
                ("id", RawValue::Integer(0)),
                ("cipher", json::to_blob(&cipher).unwrap()),
                ("password", json::to_blob(&json!({"special": false, "length": 6})).unwrap()),
            ],
        )
        .unwrap();
        session.execute(&insert).unwrap();
        (backend, session, registry)
    }

    fn column<'r>(registry: &'r SchemaRegistry, key: &str) -> &'r ColumnDescriptor {
        registry.resolve("note").unwrap().column_by_key(key).unwrap()
    }

    #[test]
    fn integers_and_booleans() {
        let (_b, session, registry) = setup();
        let note = registry.resolve("note").unwrap();
        let conv = Converter::new(&registry, &session, note);

        let pinned = column(&registry, "pinned");
        let encoded = conv.encode(&json!(true), pinned, None).unwrap();
        assert_eq!(encoded.raw, RawValue::Integer(1));
        assert_eq!(conv.decode(&encoded.raw, pinned).unwrap(), json!(true));

        let defaulted = conv.encode(&Value::Null, pinned, None).unwrap();
        assert_eq!(defaulted.working, json!(false));

        let id = column(&registry, "id");
        assert!(conv.encode(&json!(true), id, None).is_err());
        assert!(conv.encode(&json!(1.5), id, None).is_err());
        assert_eq!(conv.encode(&Value::Null, id, None).unwrap().raw, RawValue::Integer(0));
    }

    #[test]
    fn text_null_rules() {
        let (_b, session, registry) = setup();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());

        let err = conv.encode(&Value::Null, column(&registry, "title"), None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::NullViolation));

        let err = conv.encode(&Value::Null, column(&registry, "body"), None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::NullViolation));

        let score = conv.encode(&Value::Null, column(&registry, "score"), None).unwrap();
        assert_eq!(score.raw, RawValue::Null);

        let err = conv.encode(&json!(5), column(&registry, "body"), None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::TypeMismatch));
    }

    #[test]
    fn numbers_are_floats() {
        let (_b, session, registry) = setup();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        let score = column(&registry, "score");

        let encoded = conv.encode(&json!(1800), score, None).unwrap();
        assert_eq!(encoded.raw, RawValue::Real(1800.0));
        assert_eq!(encoded.working, json!(1800.0));
        assert_eq!(conv.decode(&RawValue::Integer(1800), score).unwrap(), json!(1800.0));
        assert!(conv.encode(&json!("fast"), score, None).is_err());
    }

    #[test]
    fn json_columns() {
        let (_b, session, registry) = setup();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        let doc = json!({"tags": ["a", "b"], "depth": {"n": 1}});

        for key in ["meta", "doc"] {
            let col = column(&registry, key);
            let encoded = conv.encode(&doc, col, None).unwrap();
            assert_eq!(conv.decode(&encoded.raw, col).unwrap(), doc);
        }
    }

    #[test]
    fn plain_blobs_hold_text() {
        let (_b, session, registry) = setup();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        let col = column(&registry, "attachment");

        let encoded = conv.encode(&json!("bytes"), col, None).unwrap();
        assert_eq!(encoded.raw, RawValue::Blob(b"bytes".to_vec()));
        assert_eq!(conv.decode(&encoded.raw, col).unwrap(), json!("bytes"));

        let coerced = conv.encode(&json!([1, 2]), col, None).unwrap();
        assert_eq!(coerced.working, json!("[1,2]"));
    }

    #[test]
    fn passwords_are_encrypted_and_checked() {
        let (_b, session, registry) = setup();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        let col = column(&registry, "secret");

        let encoded = conv.encode(&json!("Abc123"), col, None).unwrap();
        assert_ne!(encoded.raw, RawValue::Text("Abc123".into()));
        assert_eq!(conv.decode(&encoded.raw, col).unwrap(), json!("Abc123"));

        let err = conv.encode(&json!("abc"), col, None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::PasswordPolicy));
    }

    #[test]
    fn stored_passwords_survive_a_stricter_policy() {
        let (_b, session, registry) = setup();
        let col = column(&registry, "secret");
        let stored = Converter::new(&registry, &session, registry.resolve("note").unwrap())
            .encode(&json!("Abc123"), col, None)
            .unwrap()
            .raw;

        let strict = json!({"special": true, "length": 20});
        settings::write(&session, &registry, settings::PASSWORD, &strict).unwrap();

        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        assert_eq!(conv.decode(&stored, col).unwrap(), json!("Abc123"));
        let err = conv.encode(&json!("Abc123"), col, None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::PasswordPolicy));
    }

    #[test]
    fn uniqueness_checks_other_rows_only() {
        let (_b, session, registry) = setup();
        session
            .execute(&statement::insert("notes", &[("id", RawValue::Integer(0)), ("title", "taken".into())]).unwrap())
            .unwrap();
        let conv = Converter::new(&registry, &session, registry.resolve("note").unwrap());
        let title = column(&registry, "title");

        let err = conv.encode(&json!("taken"), title, None).unwrap_err();
        assert_eq!(err.validation_failure(), Some(ValidationFailure::Duplicate));

        let own = RawValue::Text("taken".into());
        assert!(conv.encode(&json!("taken"), title, Some(&own)).is_ok());
        assert!(conv.encode(&json!("free"), title, None).is_ok());
    }

    #[test]
    fn numeric_equivalence() {
        assert!(same_value(&RawValue::Integer(3), &RawValue::Real(3.0)));
        assert!(!same_value(&RawValue::Integer(3), &RawValue::Text("3".into())));
    }
}
