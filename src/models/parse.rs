//! Field extraction helpers for JSON request bodies.
//!
//! Every helper reports failures as [`LedgerError::Malformed`] naming the
//! field. Request bodies are read field by field over [`Value`] rather than
//! through `#[derive(Deserialize)]`, since a derived impl reports one
//! serde message for the whole body and accepts neither numeric strings
//! nor the offset-less timestamp layouts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{LedgerError, Result};

/// Offset-less timestamp layouts, interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
/// Date-only layout, interpreted as midnight UTC.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Returns the body as a JSON object.
pub(super) fn object(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| LedgerError::malformed("body", "request must be a JSON object"))
}

/// Returns the value stored under `field`, failing if it is absent.
pub(super) fn required<'body>(
    body: &'body Map<String, Value>,
    field: &'static str,
) -> Result<&'body Value> {
    body.get(field)
        .ok_or_else(|| LedgerError::malformed(field, "missing from request"))
}

/// Reads a string field.
pub(super) fn string<'body>(field: &'static str, value: &'body Value) -> Result<&'body str> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::malformed(field, "must be a string"))
}

/// Reads an integer field given either as a JSON number or a numeric
/// string.
pub(super) fn integer(field: &'static str, value: &Value) -> Result<i64> {
    match *value {
        Value::Number(ref number) => number
            .as_i64()
            .ok_or_else(|| LedgerError::malformed(field, "must be a 64-bit integer")),
        Value::String(ref raw) => integer_str(field, raw),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            Err(LedgerError::malformed(field, "must be an integer"))
        }
    }
}

/// Parses an integer from text, ignoring surrounding whitespace.
pub(super) fn integer_str(field: &'static str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|err| LedgerError::malformed(field, format!("must be an integer ({err})")))
}

/// Parses a timestamp in RFC 3339 form, one of the offset-less layouts
/// read as UTC, or a bare date read as midnight UTC.
pub(super) fn timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            LedgerError::malformed(field, "unparsable, expected format YYYY-MM-DDTHH:MM:SSZ")
        })
}
