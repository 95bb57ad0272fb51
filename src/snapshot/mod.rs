//! Snapshots: the portable external representation of a live interpreter.
//!
//! A snapshot is an ordered array of JSON records; record 0 is the
//! interpreter root. References between records are `{"#": n}`. Scalars the
//! transport cannot express directly are wrapped: `{"Value": "undefined"}`,
//! `{"Number": "NaN" | "Infinity" | "-Infinity" | "-0"}`. Shared
//! substructure is encoded once, at first visit; traversal order fixes the
//! numbering, so identical heaps built in identical order produce identical
//! snapshots.
//!
//! Encoding walks only strongly-reachable state: weak-container entries
//! whose key would have been collected are absent from the record, and
//! `Server`-class objects (host sockets) are emitted as `null` wherever they
//! are referenced.

mod decode;
mod encode;
mod state;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value as Json;

use crate::error::DecodeError;
use crate::interpreter::Interpreter;

/// Format version carried in record 0. The decoder rejects anything newer.
pub const SNAPSHOT_VERSION: u64 = 1;

/// Encode the full live state of `interp` into a record array.
pub fn snapshot(interp: &Interpreter) -> Vec<Json> {
    encode::encode(interp)
}

/// Rehydrate `records` into `interp`, which must be freshly constructed with
/// the same built-in seed (native table and registry singletons). On error
/// the interpreter's observable state is unchanged.
pub fn restore(interp: &mut Interpreter, records: &[Json]) -> Result<(), DecodeError> {
    decode::restore(interp, records)
}

/// ISO-8601 with millisecond precision, the `Date` record payload.
pub fn format_date(ms: f64) -> String {
    let clamped = if ms.is_finite() { ms } else { 0.0 };
    match Utc.timestamp_millis_opt(clamped as i64) {
        chrono::LocalResult::Single(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        _ => Utc
            .timestamp_millis_opt(0)
            .single()
            .expect("epoch is representable")
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Parse an ISO-8601 date payload back to epoch milliseconds.
pub fn parse_date(s: &str) -> Option<f64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64)
}

/// Encode one scalar `Value` (no heap access): the caller handles object
/// references.
pub(crate) fn encode_scalar(v: &crate::value::Value) -> Option<Json> {
    use crate::value::Value;
    Some(match v {
        Value::Undefined => serde_json::json!({"Value": "undefined"}),
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) => {
            if n.is_nan() {
                serde_json::json!({"Number": "NaN"})
            } else if *n == f64::INFINITY {
                serde_json::json!({"Number": "Infinity"})
            } else if *n == f64::NEG_INFINITY {
                serde_json::json!({"Number": "-Infinity"})
            } else if *n == 0.0 && n.is_sign_negative() {
                serde_json::json!({"Number": "-0"})
            } else {
                serde_json::json!(n)
            }
        }
        Value::String(s) => Json::String(s.as_str().to_string()),
        Value::Object(_) => return None,
    })
}

/// Decode one scalar record value, if it is one.
pub(crate) fn decode_scalar(json: &Json) -> Option<crate::value::Value> {
    use crate::value::Value;
    match json {
        Json::Null => Some(Value::Null),
        Json::Bool(b) => Some(Value::Boolean(*b)),
        Json::Number(n) => n.as_f64().map(Value::Number),
        Json::String(s) => Some(Value::from(s.as_str())),
        Json::Object(map) => {
            if map.len() == 1 {
                if let Some(Json::String(tag)) = map.get("Value") {
                    if tag == "undefined" {
                        return Some(Value::Undefined);
                    }
                }
                if let Some(Json::String(tag)) = map.get("Number") {
                    return Some(Value::Number(match tag.as_str() {
                        "NaN" => f64::NAN,
                        "Infinity" => f64::INFINITY,
                        "-Infinity" => f64::NEG_INFINITY,
                        "-0" => -0.0,
                        _ => return None,
                    }));
                }
            }
            None
        }
        Json::Array(_) => None,
    }
}

/// The `{"#": n}` reference form, if `json` is one.
pub(crate) fn as_ref(json: &Json) -> Option<usize> {
    match json {
        Json::Object(map) if map.len() == 1 => map.get("#").and_then(Json::as_u64).map(|n| n as usize),
        _ => None,
    }
}

pub(crate) fn make_ref(index: usize) -> Json {
    serde_json::json!({"#": index})
}
