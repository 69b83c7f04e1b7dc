//! Backend-agnostic record values.
//!
//! Every engine materializes rows differently (SQL rows, Cozo tuples, BSON
//! documents, plain maps). `Value` is the common currency the adapter hands to
//! and receives from them, and `Record` is one logical row.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical row: field name to value, ordered for deterministic output.
pub type Record = BTreeMap<String, Value>;

/// A typed cell value.
///
/// `Date` and `Json` only reach an engine when its capability flags say it
/// stores them natively; otherwise the coercion policy has already turned
/// them into text or numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Json(serde_json::Value),
}

impl Value {
    /// Wrap arbitrary JSON as a free-form `json` field value.
    pub fn json(value: serde_json::Value) -> Self {
        Value::Json(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Json(_) => "json",
        }
    }

    /// Coerce to a list: lists pass through, anything else becomes a
    /// one-element list. Used for `in` / `not_in` operands.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            Value::Json(serde_json::Value::Array(items)) => {
                items.into_iter().map(Value::from_json).collect()
            }
            other => vec![other],
        }
    }

    /// Text form used by substring operators when the caller passed a
    /// non-text operand.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Convert to plain JSON, dates rendered as RFC 3339.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(format_date(d)),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(v) => v.clone(),
        }
    }

    /// Convert plain JSON into a value. Arrays become lists, objects stay JSON.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Json(object),
        }
    }

    /// Equality with numeric widening (`Int(3) == Float(3.0)`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    /// Ordering for range predicates. `None` when the two values are not
    /// comparable (different kinds, or either side null).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Ordering used for `ORDER BY`. Nulls sort first; text compares
    /// ASCII-case-insensitively, so `"b"` and `"B"` are equal keys.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => {
                a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
            }
            _ => self
                .compare(other)
                .unwrap_or_else(|| self.type_name().cmp(other.type_name())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", format_date(d)),
            Value::List(_) | Value::Json(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Canonical text form of a date: RFC 3339, millisecond precision, `Z`.
///
/// Fixed width, so lexical order equals chronological order for backends
/// that store dates as text.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse the text form written by [`format_date`] (any RFC 3339 accepted).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a [`Record`] from `field => value` pairs.
///
/// ```
/// use storage_adapter::record;
/// let r = record! { "title" => "General", "pinned" => false };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::db::Record::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::db::Record::new();
        $( record.insert(($field).to_string(), $crate::db::Value::from($value)); )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_as_str() {
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(Value::Int(1).as_str(), None);
    }

    #[rstest]
    fn test_as_i64_from_float() {
        assert_eq!(Value::Float(42.7).as_i64(), Some(42));
    }

    #[rstest]
    fn test_loose_eq_widens_numbers() {
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert!(!Value::Int(3).loose_eq(&Value::Text("3".into())));
    }

    #[rstest]
    #[case(Value::Int(1), Value::Int(2), Some(Ordering::Less))]
    #[case(Value::Float(2.5), Value::Int(2), Some(Ordering::Greater))]
    #[case(Value::from("b"), Value::from("a"), Some(Ordering::Greater))]
    #[case(Value::Null, Value::Int(1), None)]
    #[case(Value::from("a"), Value::Int(1), None)]
    fn test_compare(#[case] a: Value, #[case] b: Value, #[case] expected: Option<Ordering>) {
        assert_eq!(a.compare(&b), expected);
    }

    #[rstest]
    fn test_sort_cmp_is_case_insensitive() {
        assert_eq!(
            Value::from("Beta").sort_cmp(&Value::from("alpha")),
            Ordering::Greater
        );
        assert_eq!(Value::Null.sort_cmp(&Value::from("a")), Ordering::Less);
    }

    #[rstest]
    fn test_sort_cmp_case_only_difference_is_a_tie() {
        assert_eq!(Value::from("b").sort_cmp(&Value::from("B")), Ordering::Equal);
        assert_eq!(Value::from("B").sort_cmp(&Value::from("a")), Ordering::Greater);
    }

    #[rstest]
    fn test_into_list() {
        assert_eq!(Value::from("a").into_list(), vec![Value::from("a")]);
        assert_eq!(
            Value::from(vec!["a", "b"]).into_list(),
            vec![Value::from("a"), Value::from("b")]
        );
    }

    #[rstest]
    fn test_date_text_round_trip() {
        let date = parse_date("2026-01-02T03:04:05.678Z").unwrap();
        assert_eq!(format_date(&date), "2026-01-02T03:04:05.678Z");
        assert!(parse_date("not a date").is_none());
    }

    #[rstest]
    fn test_from_json_keeps_objects() {
        let value = Value::from_json(serde_json::json!({"a": [1, 2]}));
        assert!(matches!(value, Value::Json(_)));
        let list = Value::from_json(serde_json::json!([1, "x"]));
        assert_eq!(list, Value::List(vec![Value::Int(1), Value::from("x")]));
    }

    #[rstest]
    fn test_record_macro() {
        let r = crate::record! { "title" => "General", "count" => 2i64 };
        assert_eq!(r.get("title"), Some(&Value::from("General")));
        assert_eq!(r.get("count"), Some(&Value::Int(2)));
    }
}
