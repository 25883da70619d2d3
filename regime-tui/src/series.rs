//! Canonical sample schema and raw-payload validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::fields::{self, Field, RawSample};

/// One backend data point after field-name resolution.
///
/// Fields resolve independently: a missing RSI does not invalidate the
/// price, and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub close: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub regime: Option<i64>,
    pub signal: Option<i64>,
}

impl CanonicalSample {
    /// Resolve a raw array element into the canonical schema.
    ///
    /// Non-object elements carry no fields and resolve to an all-missing
    /// sample. They stay in the series so that the latest element is always
    /// the backend's latest element, whatever it contains.
    pub fn resolve(raw: &Value) -> Self {
        match raw.as_object() {
            Some(sample) => Self::from_raw(sample),
            None => Self::default(),
        }
    }

    /// Resolve each canonical field from an untyped record.
    pub fn from_raw(sample: &RawSample) -> Self {
        Self {
            timestamp: fields::resolve_timestamp(sample),
            close: fields::resolve_f64(sample, Field::Close),
            ema_fast: fields::resolve_f64(sample, Field::EmaFast),
            ema_slow: fields::resolve_f64(sample, Field::EmaSlow),
            rsi: fields::resolve_f64(sample, Field::Rsi),
            regime: fields::resolve_code(sample, Field::Regime),
            signal: fields::resolve_code(sample, Field::Signal),
        }
    }
}

/// Ordered, time-ascending sequence of canonical samples for the current
/// session. Insertion order from the backend is trusted as time order.
pub type Series = Vec<CanonicalSample>;

/// Validate the raw backend response body into a usable series.
///
/// Only a JSON array constitutes a series. Any other shape (the backend's
/// `{"error": ...}` objects included) degrades to an empty series: consumers
/// render "no data", not an error. An empty array is itself valid.
pub fn validate_payload(body: &Value) -> Series {
    match body.as_array() {
        Some(elements) => elements.iter().map(CanonicalSample::resolve).collect(),
        None => {
            warn!("backend returned a non-array payload, treating as empty series");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_array_payloads_degrade_to_empty() {
        assert!(validate_payload(&json!({"error": "recompute failed"})).is_empty());
        assert!(validate_payload(&json!(null)).is_empty());
        assert!(validate_payload(&json!(42)).is_empty());
        assert!(validate_payload(&json!("oops")).is_empty());
    }

    #[test]
    fn test_empty_array_is_a_valid_empty_series() {
        assert!(validate_payload(&json!([])).is_empty());
    }

    #[test]
    fn test_elements_are_canonicalized() {
        let series = validate_payload(&json!([
            {"timestamp": "2025-11-20 09:15:00", "Close": 19500.0, "EMA_21": 19480.0, "rsi": 61.2},
            {"timestamp": "2025-11-20 09:20:00", "close": 19510.5, "ema_21": 19485.0, "signal": 1},
        ]));

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].close, Some(19500.0));
        assert_eq!(series[0].ema_slow, Some(19480.0));
        assert_eq!(series[1].close, Some(19510.5));
        assert_eq!(series[1].signal, Some(1));
    }

    #[test]
    fn test_fields_resolve_independently() {
        let series = validate_payload(&json!([
            {"close": "not-a-number", "rsi": 44.4, "regime": 1},
        ]));

        let sample = &series[0];
        assert_eq!(sample.close, None);
        assert_eq!(sample.rsi, Some(44.4));
        assert_eq!(sample.regime, Some(1));
    }

    #[test]
    fn test_non_object_elements_are_retained_as_empty_samples() {
        let series = validate_payload(&json!([
            {"close": 19500.0},
            null,
        ]));

        assert_eq!(series.len(), 2);
        assert_eq!(series[1], CanonicalSample::default());
    }
}
