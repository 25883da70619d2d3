//! Field-name resolution for the untyped backend payload
//!
//! The backend serves pandas-rendered records whose column casing drifts
//! between exports (`close` vs `Close`, `regime` vs `Regime`). Each canonical
//! field carries a fixed primary name and a single alternate; resolution
//! checks them in that order and nothing else.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// One untyped data point as received from the backend.
pub type RawSample = Map<String, Value>;

/// Canonical fields of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    Close,
    EmaFast,
    EmaSlow,
    Rsi,
    Regime,
    Signal,
}

impl Field {
    /// All canonical fields, in schema order.
    pub const ALL: [Field; 7] = [
        Field::Timestamp,
        Field::Close,
        Field::EmaFast,
        Field::EmaSlow,
        Field::Rsi,
        Field::Regime,
        Field::Signal,
    ];

    /// Accepted key names, primary first. Resolution order is fixed; there is
    /// no broader fuzzy matching.
    pub const fn aliases(&self) -> [&'static str; 2] {
        match self {
            Field::Timestamp => ["timestamp", "Datetime"],
            Field::Close => ["close", "Close"],
            Field::EmaFast => ["ema_9", "EMA_9"],
            Field::EmaSlow => ["ema_21", "EMA_21"],
            Field::Rsi => ["rsi", "RSI"],
            Field::Regime => ["regime", "Regime"],
            Field::Signal => ["signal", "Signal"],
        }
    }
}

/// Look up the raw value carried by either accepted key name.
///
/// JSON `null` counts as absent, so a null primary falls through to the
/// alternate.
fn lookup<'a>(sample: &'a RawSample, field: Field) -> Option<&'a Value> {
    field
        .aliases()
        .iter()
        .find_map(|name| sample.get(*name).filter(|value| !value.is_null()))
}

/// Resolve a numeric field.
///
/// Numbers carried as strings are coerced; coercion failure is a miss, never
/// an error.
pub fn resolve_f64(sample: &RawSample, field: Field) -> Option<f64> {
    match lookup(sample, field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Resolve an integer code field (`regime`, `signal`).
///
/// The backend may render integer columns as floats (`1.0`), so whole-valued
/// numbers are accepted; anything fractional is a miss.
pub fn resolve_code(sample: &RawSample, field: Field) -> Option<i64> {
    let value = resolve_f64(sample, field)?;
    (value.fract() == 0.0).then_some(value as i64)
}

/// Resolve the sample timestamp.
///
/// Accepts RFC 3339 strings, the backend's `%Y-%m-%d %H:%M:%S` CSV
/// round-trip format (naive, assumed UTC), and unix-millisecond numbers.
pub fn resolve_timestamp(sample: &RawSample) -> Option<DateTime<Utc>> {
    match lookup(sample, Field::Timestamp)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Parse one of the timestamp renderings the backend is known to emit.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
