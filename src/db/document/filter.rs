//! Where-clause and value translation for document stores.

use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};

use crate::db::escape::escape_regex;
use crate::db::query::{Operator, SortDirection, WhereClause, WhereCondition, SortBy};
use crate::db::schema::ID_FIELD;
use crate::db::value::{Record, Value};

/// Primary key field of a document.
pub const DOCUMENT_ID: &str = "_id";

fn document_field(field: &str) -> &str {
    if field == ID_FIELD { DOCUMENT_ID } else { field }
}

pub fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int(n) => Bson::Int64(*n),
        Value::Float(f) => Bson::Double(*f),
        Value::Text(s) => Bson::String(s.clone()),
        Value::Date(d) => Bson::DateTime(bson::DateTime::from_millis(d.timestamp_millis())),
        Value::List(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Json(json) => json_to_bson(json),
    }
}

fn json_to_bson(json: &serde_json::Value) -> Bson {
    match json {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Bson::String(s.clone()),
        serde_json::Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_bson(v)))
                .collect(),
        ),
    }
}

pub fn from_bson(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => Value::Int(n as i64),
        Bson::Int64(n) => Value::Int(n),
        Bson::Double(f) => Value::Float(f),
        Bson::String(s) => Value::Text(s),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map(Value::Date)
            .unwrap_or(Value::Null),
        Bson::Array(items) => Value::List(items.into_iter().map(from_bson).collect()),
        Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
        other => Value::Json(other.into_relaxed_extjson()),
    }
}

/// Record to document, `id` renamed to `_id`.
pub fn to_document(record: &Record) -> Document {
    record
        .iter()
        .map(|(k, v)| (document_field(k).to_string(), to_bson(v)))
        .collect()
}

/// Document to record, `_id` renamed to `id`.
pub fn from_document(document: Document) -> Record {
    document
        .into_iter()
        .map(|(k, v)| {
            let key = if k == DOCUMENT_ID { ID_FIELD.to_string() } else { k };
            (key, from_bson(v))
        })
        .collect()
}

fn list(value: &Value) -> Bson {
    Bson::Array(value.clone().into_list().iter().map(to_bson).collect())
}

/// Compile one condition to `{ field: { $op: operand } }`.
pub fn condition(condition: &WhereCondition) -> Document {
    let field = document_field(&condition.field);
    let value = &condition.value;
    let predicate = match condition.operator {
        Operator::Eq => doc! { "$eq": to_bson(value) },
        Operator::Ne => doc! { "$ne": to_bson(value) },
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte if value.is_null() => {
            // Ordering against null matches nothing.
            doc! { "$in": [] }
        }
        Operator::Lt => doc! { "$lt": to_bson(value) },
        Operator::Lte => doc! { "$lte": to_bson(value) },
        Operator::Gt => doc! { "$gt": to_bson(value) },
        Operator::Gte => doc! { "$gte": to_bson(value) },
        Operator::In => doc! { "$in": list(value) },
        Operator::NotIn => doc! { "$nin": list(value) },
        Operator::Contains => doc! { "$regex": escape_regex(&value.to_text()) },
        Operator::StartsWith => doc! { "$regex": format!("^{}", escape_regex(&value.to_text())) },
        Operator::EndsWith => doc! { "$regex": format!("{}$", escape_regex(&value.to_text())) },
    };
    doc! { field: predicate }
}

/// Compile a condition list under the grouping rule.
pub fn compile(conditions: &[WhereCondition]) -> Document {
    match WhereClause::groups(conditions) {
        WhereClause::All => Document::new(),
        WhereClause::Single(c) => condition(c),
        WhereClause::Groups { and_group, or_group } => {
            let mut all: Vec<Document> = and_group.into_iter().map(condition).collect();
            if !or_group.is_empty() {
                let any: Vec<Document> = or_group.into_iter().map(condition).collect();
                all.push(doc! { "$or": any });
            }
            if all.len() == 1 {
                all.remove(0)
            } else {
                doc! { "$and": all }
            }
        }
    }
}

/// Sort document for the first sort key; later keys are ignored.
pub fn sort(sort_by: &[SortBy]) -> Option<Document> {
    sort_by.first().map(|s| {
        let direction = match s.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        doc! { document_field(&s.field): direction }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use rstest::rstest;

    #[rstest]
    #[case(Operator::Eq, doc! { "title": { "$eq": "a.b" } })]
    #[case(Operator::Ne, doc! { "title": { "$ne": "a.b" } })]
    #[case(Operator::Contains, doc! { "title": { "$regex": "a\\.b" } })]
    #[case(Operator::StartsWith, doc! { "title": { "$regex": "^a\\.b" } })]
    #[case(Operator::EndsWith, doc! { "title": { "$regex": "a\\.b$" } })]
    #[case(Operator::In, doc! { "title": { "$in": ["a.b"] } })]
    #[case(Operator::NotIn, doc! { "title": { "$nin": ["a.b"] } })]
    fn test_operator_mapping(#[case] op: Operator, #[case] expected: Document) {
        assert_eq!(condition(&WhereCondition::new("title", op, "a.b")), expected);
    }

    #[rstest]
    fn test_id_maps_to_document_id() {
        assert_eq!(compile(&[WhereCondition::eq("id", "t1")]), doc! { "_id": { "$eq": "t1" } });
    }

    #[rstest]
    fn test_grouping() {
        let filter = compile(&[
            WhereCondition::eq("userId", "u1"),
            WhereCondition::eq("visibility", "public").or(),
            WhereCondition::eq("pinned", true).or(),
        ]);
        assert_eq!(
            filter,
            doc! { "$and": [
                { "userId": { "$eq": "u1" } },
                { "$or": [
                    { "visibility": { "$eq": "public" } },
                    { "pinned": { "$eq": true } }
                ] }
            ] }
        );
        assert_eq!(compile(&[]), Document::new());
    }

    #[rstest]
    fn test_null_ordering_matches_nothing() {
        let filter = condition(&WhereCondition::new("rank", Operator::Gt, Value::Null));
        assert_eq!(filter, doc! { "rank": { "$in": [] } });
    }

    #[rstest]
    fn test_only_first_sort_key() {
        let sorted = sort(&[SortBy::desc("id"), SortBy::asc("title")]).unwrap();
        assert_eq!(sorted, doc! { "_id": -1 });
        assert!(sort(&[]).is_none());
    }

    #[rstest]
    fn test_document_conversion() {
        let created = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let record = record! {
            "id" => "t1",
            "tags" => vec!["a", "b"],
            "createdAt" => created,
            "metadata" => Value::json(serde_json::json!({ "k": 1 })),
        };
        let document = to_document(&record);
        assert_eq!(document.get_str("_id").unwrap(), "t1");
        assert!(document.get_datetime("createdAt").is_ok());

        let back = from_document(document);
        assert_eq!(back["id"], Value::from("t1"));
        assert_eq!(back["createdAt"], Value::Date(created));
        assert_eq!(back["tags"], Value::List(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(back["metadata"], Value::json(serde_json::json!({ "k": 1 })));
    }
}
