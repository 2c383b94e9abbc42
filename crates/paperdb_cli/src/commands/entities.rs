//! Get and delete command implementations.

use super::{print_json, ArgumentError};
use paperdb_core::{Match, Store};
use serde_json::Value;
use tracing::info;

/// Parses `key=value` arguments into an exact match.
///
/// Values are read as JSON when they parse, so `id=2` matches the number
/// and `name=Art` the string.
pub fn parse_matches(args: &[String]) -> Result<Match, ArgumentError> {
    let mut pairs = Vec::with_capacity(args.len());
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| ArgumentError::InvalidMatch(arg.clone()))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        pairs.push((key.to_string(), value));
    }
    Ok(Match::exact(pairs))
}

/// Runs the get command.
pub fn get(store: &Store, entity: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let found = store.get(entity, &parse_matches(args)?)?;
    print_json(&found.to_api_view())
}

/// Runs the delete command.
pub fn delete(
    store: &Store,
    entity: &str,
    args: &[String],
    cascade: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let matcher = parse_matches(args)?;
    info!("Deleting {} matching {:?} (cascade: {})", entity, matcher, cascade);
    let count = store.delete(entity, &matcher, cascade)?;
    println!("Deleted {count} {entity}");
    Ok(())
}
