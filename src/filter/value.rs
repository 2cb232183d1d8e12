//! Filter value coercion.
//!
//! Client values arrive loosely typed (query strings, JSON). Coercion turns
//! them into the canonical JSON shape for the field's semantic type so the
//! renderer can bind them with a matching placeholder type. Coercing an
//! already coerced value is a no-op.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};

use super::error::FilterError;
use super::types::{FieldType, FilterOp, VALUE_SPLIT_SEPARATOR};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

pub fn coerce_value(
    field: &str,
    op: FilterOp,
    field_type: FieldType,
    value: &Value,
) -> Result<Value, FilterError> {
    if op.is_null_check() {
        return Ok(value.clone());
    }

    // Booleans never split: "true,false" is not a list of flags
    if op.can_use_value_list() && field_type != FieldType::Boolean {
        let items: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::String(s) => s
                .split(VALUE_SPLIT_SEPARATOR)
                .map(|part| Value::String(part.to_string()))
                .collect(),
            other => vec![other.clone()],
        };
        return coerce_all(field, field_type, &items);
    }

    match value {
        Value::Array(items) => coerce_all(field, field_type, items),
        scalar => coerce_scalar(field, field_type, scalar),
    }
}

fn coerce_all(field: &str, field_type: FieldType, items: &[Value]) -> Result<Value, FilterError> {
    items
        .iter()
        .map(|item| coerce_scalar(field, field_type, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn coerce_scalar(field: &str, field_type: FieldType, value: &Value) -> Result<Value, FilterError> {
    let coerced = match field_type {
        FieldType::String | FieldType::Path | FieldType::List => as_text(value),
        FieldType::Integer => as_integer(value),
        FieldType::Float => as_float(value),
        FieldType::Boolean => as_boolean(value),
        FieldType::Timestamp => as_timestamp(value),
    };
    coerced.ok_or_else(|| FilterError::InvalidFilterValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: field_type,
    })
}

fn as_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() => Some(value.clone()),
        Value::String(s) => s.parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<Value> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }?;
    Number::from_f64(parsed).map(Value::Number)
}

fn as_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "y" => Some(Value::Bool(true)),
            "false" | "no" | "0" | "n" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<Value> {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        _ => None,
    }?;
    Some(Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    s.parse::<f64>().ok().and_then(from_epoch_seconds)
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let floor = secs.floor();
    let mut whole = floor as i64;
    let mut nanos = ((secs - floor) * NANOS_PER_SECOND).round() as u32;
    // Fractions that round up to a full second carry over
    if nanos >= NANOS_PER_SECOND as u32 {
        whole = whole.checked_add(1)?;
        nanos = 0;
    }
    Utc.timestamp_opt(whole, nanos).single()
}
