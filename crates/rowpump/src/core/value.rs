//! The closed value domain for rows in flight.
//!
//! Driver-returned scalars are normalized into [`Value`] before they enter a
//! row stream, so adapters on either side of a transfer never see each
//! other's native types. String data goes through [`parse_string`], which
//! upgrades text to the narrowest typed value it can.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// A single cell value.
///
/// Integers are widened to 64 bits. 32-bit floats widen exactly to `f64`;
/// 64-bit floats are carried as-is (their text form is the shortest string
/// that round-trips). Timestamps are timezone-naive.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

/// One row of a stream; always the stream's column count in length.
pub type Row = Vec<Value>;

/// Timestamp layouts accepted by [`parse_string`], tried in order.
const DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_LAYOUT: &str = "%Y-%m-%d";
const ISO_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view; parses text, truncates floats.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Text(s) => match s.trim() {
                "true" | "TRUE" | "True" | "1" => Some(true),
                "false" | "FALSE" | "False" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Text(s) => match parse_string(s) {
                Value::Timestamp(t) => Some(t),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Parse a string into the narrowest typed value.
///
/// Tries, in order: signed 64-bit integer, the three timestamp layouts,
/// 64-bit float. Booleans are deliberately not attempted; `true`/`false`
/// stay strings unless the driver reported a boolean column. The empty
/// string becomes null. On all failure the input is returned unchanged.
pub fn parse_string(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }

    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }

    if let Ok(t) = NaiveDateTime::parse_from_str(s, DATETIME_LAYOUT) {
        return Value::Timestamp(t);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, DATE_LAYOUT) {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Value::Timestamp(t);
        }
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, ISO_LAYOUT) {
        return Value::Timestamp(t);
    }

    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }

    Value::Text(s.to_string())
}

/// Normalize a raw byte cell: UTF-8 text through [`parse_string`],
/// non-UTF-8 kept lossily as text.
pub fn coerce_bytes(bytes: &[u8]) -> Value {
    parse_string(&String::from_utf8_lossy(bytes))
}

/// Normalize a driver decimal through its text form.
pub fn coerce_decimal(d: Decimal) -> Value {
    parse_string(&d.to_string())
}

/// The text form used by the CSV writer and SQL literal rendering.
///
/// Integers, floats and booleans round-trip losslessly; timestamps are
/// rendered at second precision; null renders as the empty string.
pub fn textual(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Timestamp(t) => t.format(DATETIME_LAYOUT).to_string(),
        Value::Text(s) => s.clone(),
    }
}

/// Idempotent projection of a value into a column's abstract type.
///
/// Used when a stream's columns are known (inferred or introspected) and
/// each cell must conform. The empty string always projects to null.
pub fn cast_val(v: &Value, typ: crate::core::column::AbstractType) -> Value {
    use crate::core::column::AbstractType;

    if v.is_null() {
        return Value::Null;
    }
    if let Value::Text(s) = v {
        if s.is_empty() {
            return Value::Null;
        }
    }

    match typ {
        AbstractType::String | AbstractType::Text | AbstractType::Unknown => {
            Value::Text(textual(v))
        }
        AbstractType::Integer => v.as_i64().map_or(Value::Null, Value::Int),
        AbstractType::Decimal => v.as_f64().map_or(Value::Null, Value::Float),
        AbstractType::Bool => v.as_bool().map_or(Value::Null, Value::Bool),
        AbstractType::Datetime | AbstractType::Date | AbstractType::Timestamp => {
            v.as_timestamp().map_or(Value::Null, Value::Timestamp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column::AbstractType;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_string_integer() {
        assert_eq!(parse_string("42"), Value::Int(42));
        assert_eq!(parse_string("-7"), Value::Int(-7));
    }

    #[test]
    fn test_parse_string_timestamps() {
        assert_eq!(
            parse_string("2019-06-09 00:00:00"),
            Value::Timestamp(ts("2019-06-09 00:00:00"))
        );
        assert_eq!(
            parse_string("2019-06-09"),
            Value::Timestamp(ts("2019-06-09 00:00:00"))
        );
        assert_eq!(
            parse_string("2019-06-09T11:10:09.000Z"),
            Value::Timestamp(ts("2019-06-09 11:10:09"))
        );
    }

    #[test]
    fn test_parse_string_float() {
        assert_eq!(parse_string("1.5"), Value::Float(1.5));
    }

    #[test]
    fn test_parse_string_keeps_booleans_as_text() {
        // SQLite and Oracle report booleans as text or numbers; parsing
        // them here would misread legitimate string columns.
        assert_eq!(parse_string("true"), Value::Text("true".to_string()));
        assert_eq!(parse_string("false"), Value::Text("false".to_string()));
    }

    #[test]
    fn test_parse_string_empty_is_null() {
        assert_eq!(parse_string(""), Value::Null);
    }

    #[test]
    fn test_parse_string_fallback() {
        assert_eq!(parse_string("hello"), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_textual_round_trip() {
        // parse_string ∘ textual is the identity for integers, timestamps
        // and plain text; null maps to the empty string by convention.
        for v in [
            Value::Int(123),
            Value::Timestamp(ts("2020-02-02 02:02:02")),
            Value::Text("plain words".to_string()),
            Value::Float(1.25),
        ] {
            assert_eq!(parse_string(&textual(&v)), v);
        }
        assert_eq!(parse_string(&textual(&Value::Null)), Value::Null);
    }

    #[test]
    fn test_coerce_bytes() {
        assert_eq!(coerce_bytes(b"99"), Value::Int(99));
        assert_eq!(coerce_bytes(b"abc"), Value::Text("abc".to_string()));
    }

    #[test]
    fn test_coerce_decimal() {
        let d: Decimal = "10.5000".parse().unwrap();
        assert_eq!(coerce_decimal(d), Value::Float(10.5));
        let whole: Decimal = "12".parse().unwrap();
        assert_eq!(coerce_decimal(whole), Value::Int(12));
    }

    #[test]
    fn test_cast_val() {
        assert_eq!(
            cast_val(&Value::Text("12".into()), AbstractType::Integer),
            Value::Int(12)
        );
        assert_eq!(
            cast_val(&Value::Int(12), AbstractType::String),
            Value::Text("12".to_string())
        );
        assert_eq!(
            cast_val(&Value::Text("".into()), AbstractType::Integer),
            Value::Null
        );
        assert_eq!(
            cast_val(&Value::Text("true".into()), AbstractType::Bool),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_cast_val_idempotent() {
        let v = cast_val(&Value::Text("3.25".into()), AbstractType::Decimal);
        assert_eq!(cast_val(&v, AbstractType::Decimal), v);
    }
}
