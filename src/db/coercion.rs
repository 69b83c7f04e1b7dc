//! Field-metadata-driven type coercion.
//!
//! Values are encoded on the way into an engine and decoded on the way out,
//! driven by the field's declared type and the engine's [`Capabilities`].
//! The `id` field has no attribute and is never coerced.

use serde::Serialize;

use super::query::Operator;
use super::schema::{FieldAttribute, FieldType};
use super::value::{format_date, parse_date, Value};

/// What an engine stores natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_json: bool,
    pub supports_dates: bool,
    pub supports_booleans: bool,
    /// The engine generates its own keys when no id is supplied.
    pub supports_numeric_ids: bool,
    /// Native list columns for `string[]` / `number[]`.
    pub supports_arrays: bool,
}

impl Capabilities {
    /// Everything native. The in-memory store keeps values as they are.
    pub const NATIVE: Capabilities = Capabilities {
        supports_json: true,
        supports_dates: true,
        supports_booleans: true,
        supports_numeric_ids: false,
        supports_arrays: true,
    };
}

/// Encode one field value for storage.
pub fn encode(attr: &FieldAttribute, value: Value, caps: Capabilities) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match attr.field_type {
        FieldType::String | FieldType::Number => value,
        FieldType::Boolean => match value {
            Value::Bool(b) if !caps.supports_booleans => Value::Int(b as i64),
            other => other,
        },
        FieldType::Date => {
            let value = match value {
                Value::Text(raw) => match parse_date(&raw) {
                    Some(date) => Value::Date(date),
                    None => Value::Text(raw),
                },
                other => other,
            };
            match value {
                Value::Date(date) if !caps.supports_dates => Value::Text(format_date(&date)),
                other => other,
            }
        }
        FieldType::Json => match value {
            Value::Json(_) | Value::List(_) if !caps.supports_json => {
                Value::Text(value.to_json().to_string())
            }
            Value::List(_) => Value::Json(value.to_json()),
            other => other,
        },
        FieldType::StringArray | FieldType::NumberArray => match value {
            Value::List(_) | Value::Json(_) if !caps.supports_arrays => {
                Value::Text(value.to_json().to_string())
            }
            Value::Json(json) => Value::from_json(json),
            other => other,
        },
    }
}

/// Decode one stored value back to the field's logical type.
pub fn decode(attr: &FieldAttribute, value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match attr.field_type {
        FieldType::String => value,
        FieldType::Number => whole_float_to_int(value),
        FieldType::Boolean => match value {
            Value::Int(i) => Value::Bool(i == 1),
            Value::Float(f) => Value::Bool(f == 1.0),
            other => other,
        },
        FieldType::Date => match value {
            Value::Text(raw) => match parse_date(&raw) {
                Some(date) => Value::Date(date),
                None => Value::Text(raw),
            },
            other => other,
        },
        FieldType::Json => match value {
            Value::Text(raw) if looks_like_json(&raw) => match serde_json::from_str(&raw) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::Text(raw),
            },
            Value::List(_) => Value::Json(value.to_json()),
            other => other,
        },
        FieldType::StringArray | FieldType::NumberArray => {
            let list = match value {
                Value::Text(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(json @ serde_json::Value::Array(_)) => Value::from_json(json),
                    _ => Value::Text(raw),
                },
                Value::Json(json @ serde_json::Value::Array(_)) => Value::from_json(json),
                other => other,
            };
            match list {
                Value::List(items) if attr.field_type == FieldType::NumberArray => {
                    Value::List(items.into_iter().map(whole_float_to_int).collect())
                }
                other => other,
            }
        }
    }
}

/// Encode a where-clause operand. `attr` is `None` for `id`.
pub fn encode_operand(
    attr: Option<&FieldAttribute>,
    operator: Operator,
    value: Value,
    caps: Capabilities,
) -> Value {
    if operator.is_substring() {
        return Value::Text(value.to_text());
    }
    let encode_one = |v: Value| match attr {
        Some(attr) => encode(attr, v, caps),
        None => v,
    };
    if operator.is_list() {
        Value::List(value.into_list().into_iter().map(encode_one).collect())
    } else {
        encode_one(value)
    }
}

fn whole_float_to_int(value: Value) -> Value {
    match value {
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::Int(f as i64)
        }
        other => other,
    }
}

fn looks_like_json(raw: &str) -> bool {
    matches!(raw.trim_start().chars().next(), Some('{') | Some('['))
}
