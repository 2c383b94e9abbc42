//! Epoch-second timestamps.
//!
//! Date columns store fractional seconds since the Unix epoch. The API view
//! adds a companion `<column>_date_formatted` string rendered by
//! [`format`].

use crate::error::{CodecError, CodecResult};
use time::macros::format_description;
use time::OffsetDateTime;

/// Returns the current time as fractional epoch seconds.
#[allow(clippy::cast_precision_loss)]
pub fn now() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// Returns the current time shifted by `seconds`.
pub fn now_plus(seconds: f64) -> f64 {
    now() + seconds
}

/// Formats epoch seconds as `YYYY/MM/DD HH:MM:SS.mmm` (UTC).
#[allow(clippy::cast_possible_truncation)]
pub fn format(seconds: f64) -> CodecResult<String> {
    let out_of_range = || CodecError::TimestampOutOfRange {
        seconds: seconds.to_string(),
    };
    if !seconds.is_finite() {
        return Err(out_of_range());
    }
    let whole = seconds.floor();
    let nanos = whole as i128 * 1_000_000_000 + ((seconds - whole) * 1e9).round() as i128;
    let moment = OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| out_of_range())?;
    moment
        .format(format_description!(
            "[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .map_err(|_| out_of_range())
}
