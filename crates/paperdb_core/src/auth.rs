//! Credential checks and access tokens.

use crate::entity::EntityInstance;
use crate::error::{CoreError, CoreResult};
use crate::query::Match;
use crate::store::Store;
use paperdb_codec::timestamp;
use paperdb_storage::statement::RawFilter;
use serde_json::{json, Map, Value};

impl Store {
    /// The user with `username` if `password` matches the stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be loaded or its password
    /// cannot be decrypted.
    pub fn verify_credentials(&self, username: &str, password: &str) -> CoreResult<Option<EntityInstance>> {
        let users = self.get("user", &Match::exact([("username", json!(username))]))?;
        let user = users
            .into_iter()
            .find(|user| user.get("password").and_then(Value::as_str) == Some(password));
        if user.is_none() {
            tracing::debug!(username, "credentials rejected");
        }
        Ok(user)
    }

    /// An unexpired token of `user`, issuing a new one when none is left.
    ///
    /// # Errors
    ///
    /// Returns an error if `user` has no id or the token cannot be written.
    pub fn issue_token(&self, user: &EntityInstance) -> CoreResult<EntityInstance> {
        let user_id = user
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| CoreError::invalid_operation(format!("{} has no id", user.type_name())))?;

        let session = self.session()?;
        let now = timestamp::now();
        let live = self
            .get_in(&session, "token", &Match::exact([("user_id", json!(user_id))]))?
            .into_iter()
            .find(|token| token.get("expires").and_then(Value::as_f64).is_some_and(|e| e > now));
        if let Some(token) = live {
            return Ok(token);
        }

        let mut values = Map::new();
        values.insert("user_id".to_string(), json!(user_id));
        let token = self.create_in(&session, "token", values)?;
        tracing::info!(user_id, "token issued");
        Ok(token)
    }

    /// Deletes every expired token; returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokens cannot be deleted.
    pub fn reap_expired_tokens(&self) -> CoreResult<usize> {
        let expired = RawFilter::new("WHERE expires < ?1").bind(timestamp::now());
        let count = self.delete("token", &Match::filter(expired), true)?;
        if count > 0 {
            tracing::info!(count, "expired tokens reaped");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, Match, Store};
    use serde_json::{json, Value};

    #[test]
    fn admin_credentials() {
        let store = Store::open(Config::default()).unwrap();
        let admin = store.verify_credentials("admin", "Ch@ng3_!+").unwrap();
        assert_eq!(admin.unwrap().get("id"), Some(&json!(1)));
        assert!(store.verify_credentials("admin", "wrong").unwrap().is_none());
        assert!(store.verify_credentials("nobody", "Ch@ng3_!+").unwrap().is_none());
    }

    #[test]
    fn tokens_are_reused_until_expired() {
        let store = Store::open(Config::default()).unwrap();
        let admin = store.get_one("user", &Match::exact([("id", json!(1))])).unwrap();

        let first = store.issue_token(&admin).unwrap();
        let second = store.issue_token(&admin).unwrap();
        assert_eq!(first.get("token"), second.get("token"));

        let mut expired = first;
        expired.set("expires", json!(1.0)).unwrap();
        expired.save(false).unwrap();
        assert_eq!(store.reap_expired_tokens().unwrap(), 1);

        let third = store.issue_token(&admin).unwrap();
        assert_ne!(third.get("token"), second.get("token"));
        assert!(third.get("expires").and_then(Value::as_f64).unwrap() > 1.0);
    }
}
