//! Semantic column types and the value coercion table.
//!
//! A column's semantic type is fixed when its schema is defined. It is used in
//! two directions:
//!
//! - **write**: [`SemanticType::serialize`] normalizes an attribute value
//!   before it is bound as a parameter;
//! - **read**: [`SemanticType::coerce`] turns whatever the driver returned into
//!   the attribute's value. Reads are tolerant: input that cannot be parsed
//!   becomes `Value::Null` instead of failing the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The semantic type of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Json,
    /// Passed through untouched in both directions.
    Raw,
}

impl SemanticType {
    /// Coerce a raw driver value into this type.
    ///
    /// Arrays are never coerced. `format` only applies to `Date` columns.
    #[must_use]
    pub fn coerce(self, value: Value, format: Option<&str>) -> Value {
        if value.is_null() || value.is_array() {
            return value;
        }
        match self {
            SemanticType::String | SemanticType::Raw => value,
            SemanticType::Integer => coerce_integer(value),
            SemanticType::Float => coerce_float(value),
            SemanticType::Boolean => Value::Bool(is_truthy(&value)),
            SemanticType::Date => coerce_date(value, format),
            SemanticType::Json => coerce_json(value),
        }
    }

    /// Normalize an attribute value before it is written.
    ///
    /// Unlike [`coerce`](Self::coerce) this never discards input: a value that
    /// does not fit is handed to the driver as-is so the database decides.
    #[must_use]
    pub fn serialize(self, value: Value, format: Option<&str>) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (SemanticType::Boolean, v @ Value::Bool(_)) => v,
            (SemanticType::Boolean, v @ (Value::BigInt(_) | Value::Double(_) | Value::Text(_))) => {
                Value::Bool(is_truthy(&v))
            }
            (SemanticType::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::BigInt(i),
                Err(_) => Value::Text(s),
            },
            (SemanticType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Double(f),
                Err(_) => Value::Text(s),
            },
            (SemanticType::Float, Value::BigInt(i)) => Value::Double(i as f64),
            (SemanticType::Date, Value::Text(s)) => match parse_date(&s, format) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(s),
            },
            (SemanticType::Json, Value::Json(j)) => Value::Json(j),
            (SemanticType::Json, v @ Value::Array(_)) => Value::Json(v.to_json()),
            (_, v) => v,
        }
    }
}

fn coerce_integer(value: Value) -> Value {
    match value {
        Value::BigInt(_) => value,
        Value::Bool(b) => Value::BigInt(i64::from(b)),
        Value::Double(f) if f.is_finite() => Value::BigInt(f.trunc() as i64),
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Value::BigInt(i);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => Value::BigInt(f.trunc() as i64),
                _ => {
                    tracing::trace!(value = s, "unparseable integer coerced to NULL");
                    Value::Null
                }
            }
        }
        _ => Value::Null,
    }
}

fn coerce_float(value: Value) -> Value {
    match value {
        Value::Double(_) => value,
        Value::BigInt(i) => Value::Double(i as f64),
        Value::Bool(b) => Value::Double(if b { 1.0 } else { 0.0 }),
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Double(f),
            Err(_) => {
                tracing::trace!(value = %s, "unparseable float coerced to NULL");
                Value::Null
            }
        },
        _ => Value::Null,
    }
}

fn coerce_date(value: Value, format: Option<&str>) -> Value {
    match value {
        Value::Timestamp(_) => value,
        Value::BigInt(millis) => Utc
            .timestamp_millis_opt(millis)
            .single()
            .map_or(Value::Null, Value::Timestamp),
        Value::Text(s) => match parse_date(&s, format) {
            Some(ts) => Value::Timestamp(ts),
            None => {
                tracing::trace!(value = %s, format, "unparseable date coerced to NULL");
                Value::Null
            }
        },
        _ => Value::Null,
    }
}

fn coerce_json(value: Value) -> Value {
    match value {
        Value::Text(s) => match serde_json::from_str::<serde_json::Value>(&s) {
            Ok(json) => Value::Json(json),
            Err(_) => {
                tracing::trace!(value = %s, "unparseable json coerced to NULL");
                Value::Null
            }
        },
        other => other,
    }
}

/// Truthiness used by boolean columns.
///
/// Text is false when empty or one of `0`, `false`, `f`, `no`, `off`
/// (case-insensitive), so booleans survive drivers that return text.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::BigInt(i) => *i != 0,
        Value::Double(f) => *f != 0.0 && !f.is_nan(),
        Value::Text(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s == "0"
                || s.eq_ignore_ascii_case("false")
                || s.eq_ignore_ascii_case("f")
                || s.eq_ignore_ascii_case("no")
                || s.eq_ignore_ascii_case("off"))
        }
        Value::Timestamp(_) | Value::Json(_) | Value::Array(_) => true,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a date or timestamp string into UTC.
///
/// With an explicit `strftime` format, the input must match it (as a full
/// timestamp, a timestamp with offset, or a bare date). Without one, RFC 3339
/// and the common SQL spellings are tried. Returns `None` if nothing matches.
pub fn parse_date(input: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Some(fmt) = format {
        if let Ok(ts) = DateTime::parse_from_str(input, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
        return NaiveDate::parse_from_str(input, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_integer_parse_or_null() {
        let t = SemanticType::Integer;
        assert_eq!(t.coerce(Value::Text("42".into()), None), Value::BigInt(42));
        assert_eq!(t.coerce(Value::Text(" 7.9 ".into()), None), Value::BigInt(7));
        assert_eq!(t.coerce(Value::Text("abc".into()), None), Value::Null);
        assert_eq!(t.coerce(Value::Null, None), Value::Null);
    }

    #[test]
    fn test_float_parse() {
        let t = SemanticType::Float;
        assert_eq!(t.coerce(Value::Text("1.25".into()), None), Value::Double(1.25));
        assert_eq!(t.coerce(Value::BigInt(3), None), Value::Double(3.0));
        assert_eq!(t.coerce(Value::Text("n/a".into()), None), Value::Null);
    }

    #[test]
    fn test_boolean_truthy_cast() {
        let t = SemanticType::Boolean;
        assert_eq!(t.coerce(Value::BigInt(0), None), Value::Bool(false));
        assert_eq!(t.coerce(Value::BigInt(1), None), Value::Bool(true));
        assert_eq!(t.coerce(Value::Text("f".into()), None), Value::Bool(false));
        assert_eq!(t.coerce(Value::Text("yes".into()), None), Value::Bool(true));
        assert_eq!(t.coerce(Value::Text(String::new()), None), Value::Bool(false));
    }

    #[test]
    fn test_date_with_and_without_format() {
        let t = SemanticType::Date;
        assert_eq!(
            t.coerce(Value::Text("2024-03-01 10:00:00".into()), None),
            Value::Timestamp(ts("2024-03-01T10:00:00Z"))
        );
        assert_eq!(
            t.coerce(Value::Text("01/03/2024".into()), Some("%d/%m/%Y")),
            Value::Timestamp(ts("2024-03-01T00:00:00Z"))
        );
        assert_eq!(t.coerce(Value::Text("not a date".into()), None), Value::Null);
        assert_eq!(
            t.coerce(Value::Text("2024-03-01".into()), Some("%d/%m/%Y")),
            Value::Null
        );
    }

    #[test]
    fn test_json_coercion() {
        let t = SemanticType::Json;
        assert_eq!(
            t.coerce(Value::Text(r#"{"a":1}"#.into()), None),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(t.coerce(Value::Text("{".into()), None), Value::Null);
    }

    #[test]
    fn test_arrays_are_never_coerced() {
        let arr = Value::from(vec!["1", "2"]);
        assert_eq!(SemanticType::Integer.coerce(arr.clone(), None), arr);
    }

    #[test]
    fn test_write_then_read_round_trip_through_text() {
        // Drivers that return everything as text must still round-trip.
        let cases = vec![
            (SemanticType::Integer, Value::BigInt(-12)),
            (SemanticType::Float, Value::Double(2.5)),
            (SemanticType::Boolean, Value::Bool(false)),
            (SemanticType::Boolean, Value::Bool(true)),
            (SemanticType::String, Value::Text("hello".into())),
            (
                SemanticType::Date,
                Value::Timestamp(ts("2023-12-31T23:59:58Z")),
            ),
        ];
        for (ty, original) in cases {
            let written = ty.serialize(original.clone(), None);
            let as_text = match &written {
                Value::BigInt(i) => i.to_string(),
                Value::Double(f) => f.to_string(),
                Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
                Value::Text(s) => s.clone(),
                Value::Timestamp(t) => t.to_rfc3339(),
                other => panic!("unexpected written value {other:?}"),
            };
            assert_eq!(ty.coerce(Value::Text(as_text), None), original, "{ty:?}");
        }
    }

    #[test]
    fn test_serialize_keeps_unparseable_input() {
        assert_eq!(
            SemanticType::Integer.serialize(Value::Text("x".into()), None),
            Value::Text("x".into())
        );
        assert_eq!(
            SemanticType::Date.serialize(Value::Text("2024-01-02".into()), None),
            Value::Timestamp(ts("2024-01-02T00:00:00Z"))
        );
    }
}
