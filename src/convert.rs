use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Number of 100-nanosecond ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const TICKS_BETWEEN_0001_AND_EPOCH: i64 = 621_355_968_000_000_000;

const ROUNDING_FACTOR: f64 = 10_000.0;
/// Values this large have no fractional digits left to round.
const ROUNDING_LIMIT: f64 = 1e16;

/// Time expressed as the number of 100-nanosecond intervals elapsed since 12:00 midnight, January
/// 1, 0001 (UTC).
///
/// This is what .NET calls `DateTimeOffset.Ticks` and what the Quick Pulse service expects in the
/// transmission time header.
pub(crate) fn time_to_ticks(time: DateTime<Utc>) -> String {
    let seconds = time.timestamp();
    let sub_second_ticks = i64::from(time.timestamp_subsec_nanos() / 100);
    (TICKS_BETWEEN_0001_AND_EPOCH + seconds * 10_000_000 + sub_second_ticks).to_string()
}

/// Time in the `/Date(<milliseconds since epoch>)/` format used by the data contract serializer.
pub(crate) fn time_to_ms_date(time: DateTime<Utc>) -> String {
    format!("/Date({})/", time.timestamp_millis())
}

pub(crate) fn time_to_string(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn duration_to_string(duration: Duration) -> String {
    let micros = duration.as_micros();
    let s = micros / 1_000_000 % 60;
    let m = micros / 1_000_000 / 60 % 60;
    let h = micros / 1_000_000 / 60 / 60 % 24;
    let d = micros / 1_000_000 / 60 / 60 / 24;
    let micros_remaining = micros % 1_000_000;
    format!(
        "{}.{:0>2}:{:0>2}:{:0>2}.{:0>6}",
        d, h, m, s, micros_remaining
    )
}

/// Rounds to 4 decimal places, midpoints away from zero.
///
/// The service expects metric values with bounded precision. Values at or above 1e16 in
/// magnitude, and non-finite values, are returned unchanged.
pub(crate) fn round_metric_value(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    (value * ROUNDING_FACTOR).round() / ROUNDING_FACTOR
}
