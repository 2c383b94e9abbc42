//! Unique integer and token generation.
//!
//! Both generators scan the column, then pick a value that is not present.
//! Nothing stops a concurrent writer from taking the same value between the
//! scan and the insert; the table's unique constraint is the final guard.

use crate::error::{CoreError, CoreResult};
use paperdb_codec::RawValue;
use paperdb_storage::statement;
use paperdb_storage::Session;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Draws before a token column is considered exhausted.
const MAX_TOKEN_ATTEMPTS: usize = 1024;

/// Smallest non-negative integer not present in `table.column`.
///
/// Ids freed by deletes are handed out again.
///
/// # Errors
///
/// Returns an error if the column cannot be read.
pub(crate) fn next_int(session: &Session, table: &str, column: &str) -> CoreResult<i64> {
    let used: HashSet<i64> = session
        .query_column(&statement::select_column(table, column)?)?
        .iter()
        .filter_map(RawValue::as_integer)
        .collect();
    Ok(smallest_unused(&used))
}

fn smallest_unused(used: &HashSet<i64>) -> i64 {
    // A gap exists in 0..=len by pigeonhole.
    let bound = i64::try_from(used.len()).unwrap_or(i64::MAX);
    (0..=bound).find(|i| !used.contains(i)).unwrap_or(bound)
}

/// Random `length`-character string over `alphabet` not present in
/// `table.column`.
///
/// # Errors
///
/// Returns an error if the alphabet is empty, the length is zero, the
/// column cannot be read, or no free token turns up.
pub(crate) fn next_token(
    session: &Session,
    table: &str,
    column: &str,
    alphabet: &str,
    length: usize,
) -> CoreResult<String> {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() || length == 0 {
        return Err(CoreError::invalid_operation(format!(
            "{table}.{column}: token alphabet and length must be non-empty"
        )));
    }

    let used: HashSet<String> = session
        .query_column(&statement::select_column(table, column)?)?
        .into_iter()
        .filter_map(|v| match v {
            RawValue::Text(s) => Some(s),
            _ => None,
        })
        .collect();

    let mut rng = rand::thread_rng();
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let candidate: String = (0..length)
            .filter_map(|_| chars.choose(&mut rng))
            .collect();
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(CoreError::invalid_operation(format!(
        "{table}.{column}: no unused token after {MAX_TOKEN_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdb_storage::{InMemoryBackend, SqlBackend};
    use proptest::prelude::*;

    fn session_with(sql: &str) -> (InMemoryBackend, Session) {
        let backend = InMemoryBackend::new().unwrap();
        let session = backend.connect().unwrap();
        session.execute_batch(sql).unwrap();
        (backend, session)
    }

    #[test]
    fn empty_table_starts_at_zero() {
        let (_b, session) = session_with("CREATE TABLE t (id INTEGER);");
        assert_eq!(next_int(&session, "t", "id").unwrap(), 0);
    }

    #[test]
    fn fills_lowest_gap() {
        let (_b, session) = session_with(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (0), (1), (3);",
        );
        assert_eq!(next_int(&session, "t", "id").unwrap(), 2);
    }

    #[test]
    fn dense_table_appends() {
        let (_b, session) = session_with(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (2), (0), (1);",
        );
        assert_eq!(next_int(&session, "t", "id").unwrap(), 3);
    }

    #[test]
    fn token_avoids_existing_values() {
        let (_b, session) = session_with(
            "CREATE TABLE t (token TEXT); INSERT INTO t VALUES ('a'), ('b');",
        );
        assert_eq!(next_token(&session, "t", "token", "abc", 1).unwrap(), "c");
    }

    #[test]
    fn exhausted_token_space_fails() {
        let (_b, session) = session_with(
            "CREATE TABLE t (token TEXT); INSERT INTO t VALUES ('a'), ('b');",
        );
        assert!(next_token(&session, "t", "token", "ab", 1).is_err());
        assert!(next_token(&session, "t", "token", "", 8).is_err());
        assert!(next_token(&session, "t", "token", "ab", 0).is_err());
    }

    proptest! {
        #[test]
        fn smallest_unused_is_free_and_minimal(used in prop::collection::hash_set(0i64..64, 0..48)) {
            let next = smallest_unused(&used);
            prop_assert!(!used.contains(&next));
            prop_assert!((0..next).all(|i| used.contains(&i)));
        }
    }
}
