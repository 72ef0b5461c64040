//! Lenient JSON field readers used by the response transformers
//!
//! Every reader accepts `None`, wrong types and garbage, and falls back to a
//! neutral value instead of failing.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parses numbers written for humans: `"$1,234.5"`, `"1.2B"`, `"850K"`
///
/// Suffixes K, M and B scale by 1e3, 1e6 and 1e9. Any other trailing letter
/// or `%` is dropped and scales by 1.
pub fn parse_compact_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '_' | ' '))
        .collect();

    let (digits, multiplier) = match cleaned.chars().last()? {
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], 1e3),
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], 1e6),
        'B' | 'b' => (&cleaned[..cleaned.len() - 1], 1e9),
        c if c.is_ascii_alphabetic() || c == '%' => (&cleaned[..cleaned.len() - 1], 1.0),
        _ => (cleaned.as_str(), 1.0),
    };

    let value = digits.parse::<f64>().ok()? * multiplier;
    value.is_finite().then_some(value)
}

/// Reads a number or numeric string
pub fn opt_number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_compact_number(s),
        _ => None,
    }
}

/// Reads a number, 0 when absent or unreadable
pub fn number(v: Option<&Value>) -> f64 {
    opt_number(v).unwrap_or(0.0)
}

/// Reads a non-negative integer from a number or string
pub fn unsigned(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| parse_compact_number(s).filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

/// Reads a positive rank, `None` for 0 or missing
pub fn rank(v: Option<&Value>) -> Option<u32> {
    unsigned(v)
        .filter(|r| *r > 0)
        .and_then(|r| u32::try_from(r).ok())
}

/// Rank of the row at 1-based `position`, saturating at `u32::MAX`
pub fn position_rank(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

/// Reads a string, empty when absent
pub fn string(v: Option<&Value>) -> String {
    opt_string(v).unwrap_or_default()
}

/// Reads a non-empty string; numbers are rendered
pub fn opt_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a numeric array, skipping unreadable elements
pub fn number_array(v: Option<&Value>) -> Vec<f64> {
    array(v)
        .iter()
        .filter_map(|item| opt_number(Some(item)))
        .collect()
}

/// Borrows an array, empty when the value is anything else
pub fn array(v: Option<&Value>) -> &[Value] {
    v.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Reads RFC 3339 strings or unix timestamps in seconds
pub fn timestamp(v: Option<&Value>) -> Option<DateTime<Utc>> {
    match v? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Reads unix timestamps in milliseconds
pub fn timestamp_millis(v: Option<&Value>) -> Option<DateTime<Utc>> {
    unsigned(v)
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(DateTime::from_timestamp_millis)
}
