//! JSON encodings for structured column values.
//!
//! Text columns hold the serialized document as a string; blob columns hold
//! its UTF-8 bytes.

use crate::error::{CodecError, CodecResult};
use crate::value::RawValue;
use serde_json::Value;

/// Serializes a value into a text column form.
pub fn to_text(value: &Value) -> CodecResult<RawValue> {
    serde_json::to_string(value)
        .map(RawValue::Text)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Serializes a value into a blob column form.
pub fn to_blob(value: &Value) -> CodecResult<RawValue> {
    serde_json::to_vec(value)
        .map(RawValue::Blob)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Parses a stored JSON document from either a text or a blob value.
pub fn from_raw(raw: &RawValue) -> CodecResult<Value> {
    match raw {
        RawValue::Text(s) => {
            serde_json::from_str(s).map_err(|e| CodecError::decoding_failed(e.to_string()))
        }
        RawValue::Blob(b) => {
            serde_json::from_slice(b).map_err(|e| CodecError::decoding_failed(e.to_string()))
        }
        RawValue::Null => Ok(Value::Null),
        other => Err(CodecError::unexpected_kind("TEXT or BLOB", other.kind_name())),
    }
}

/// Decodes a blob holding UTF-8 text.
pub fn blob_to_string(bytes: &[u8]) -> CodecResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}
