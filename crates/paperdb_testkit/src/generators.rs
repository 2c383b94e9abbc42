//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

/// Strategy for printable ASCII strings.
pub fn printable_ascii_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,48}").expect("Invalid regex")
}

/// Strategy for passwords accepted by the default policy.
pub fn password_strategy() -> impl Strategy<Value = String> {
    (
        "[A-Z]{1,4}",
        "[a-z]{1,4}",
        "[0-9]{1,4}",
        "[!#%&*+,.:;=?@^_~-]{1,4}",
        "[ -~]{4,16}",
    )
        .prop_map(|(upper, lower, digits, special, tail)| {
            format!("{upper}{lower}{digits}{special}{tail}")
        })
}

/// Strategy for usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{2,15}").expect("Invalid regex")
}

/// Strategy for JSON scalars.
///
/// Floats are eighths, which survive a text round trip exactly.
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-8_000_000i32..8_000_000)
            .prop_filter_map("finite", |n| Number::from_f64(f64::from(n) / 8.0 + 0.125))
            .prop_map(Value::Number),
        printable_ascii_strategy().prop_map(Value::String),
    ]
}

/// Strategy for arbitrarily nested JSON values.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_scalar_strategy().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..8)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}
