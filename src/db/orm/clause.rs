//! Nested filter objects handed to generated-client delegates.

use serde_json::{json, Map};

use crate::db::query::{Operator, WhereClause, WhereCondition};
use crate::db::value::Value;

/// Per-field filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals(Value),
    Not(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl FieldFilter {
    pub fn from_condition(condition: &WhereCondition) -> Self {
        let value = condition.value.clone();
        match condition.operator {
            Operator::Eq => FieldFilter::Equals(value),
            Operator::Ne => FieldFilter::Not(value),
            Operator::Lt => FieldFilter::Lt(value),
            Operator::Lte => FieldFilter::Lte(value),
            Operator::Gt => FieldFilter::Gt(value),
            Operator::Gte => FieldFilter::Gte(value),
            Operator::In => FieldFilter::In(value.into_list()),
            Operator::NotIn => FieldFilter::NotIn(value.into_list()),
            Operator::Contains => FieldFilter::Contains(value.to_text()),
            Operator::StartsWith => FieldFilter::StartsWith(value.to_text()),
            Operator::EndsWith => FieldFilter::EndsWith(value.to_text()),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let list = |items: &[Value]| serde_json::Value::Array(items.iter().map(Value::to_json).collect());
        match self {
            FieldFilter::Equals(v) => json!({ "equals": v.to_json() }),
            FieldFilter::Not(v) => json!({ "not": v.to_json() }),
            FieldFilter::Lt(v) => json!({ "lt": v.to_json() }),
            FieldFilter::Lte(v) => json!({ "lte": v.to_json() }),
            FieldFilter::Gt(v) => json!({ "gt": v.to_json() }),
            FieldFilter::Gte(v) => json!({ "gte": v.to_json() }),
            FieldFilter::In(items) => json!({ "in": list(items) }),
            FieldFilter::NotIn(items) => json!({ "notIn": list(items) }),
            FieldFilter::Contains(s) => json!({ "contains": s }),
            FieldFilter::StartsWith(s) => json!({ "startsWith": s }),
            FieldFilter::EndsWith(s) => json!({ "endsWith": s }),
        }
    }
}

/// A where-object: field filters nested under `AND` / `OR`.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Matches every record.
    Any,
    Field { field: String, filter: FieldFilter },
    And(Vec<Clause>),
    Or(Vec<Clause>),
}

impl Clause {
    fn field(condition: &WhereCondition) -> Self {
        Clause::Field {
            field: condition.field.clone(),
            filter: FieldFilter::from_condition(condition),
        }
    }

    /// Compile a condition list under the grouping rule.
    pub fn compile(conditions: &[WhereCondition]) -> Self {
        match WhereClause::groups(conditions) {
            WhereClause::All => Clause::Any,
            WhereClause::Single(condition) => Self::field(condition),
            WhereClause::Groups { and_group, or_group } => {
                let mut all: Vec<Clause> = and_group.into_iter().map(Self::field).collect();
                if !or_group.is_empty() {
                    all.push(Clause::Or(or_group.into_iter().map(Self::field).collect()));
                }
                match all.len() {
                    1 => all.remove(0),
                    _ => Clause::And(all),
                }
            }
        }
    }

    /// Prisma-shaped JSON, for logs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Clause::Any => json!({}),
            Clause::Field { field, filter } => {
                let mut object = Map::new();
                object.insert(field.clone(), filter.to_json());
                serde_json::Value::Object(object)
            }
            Clause::And(parts) => json!({ "AND": parts.iter().map(Clause::to_json).collect::<Vec<_>>() }),
            Clause::Or(parts) => json!({ "OR": parts.iter().map(Clause::to_json).collect::<Vec<_>>() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_empty_is_any() {
        assert_eq!(Clause::compile(&[]), Clause::Any);
    }

    #[rstest]
    fn test_single_condition_json() {
        let clause = Clause::compile(&[WhereCondition::new("title", Operator::Contains, "room")]);
        assert_eq!(clause.to_json(), json!({ "title": { "contains": "room" } }));
    }

    #[rstest]
    fn test_and_with_or_group() {
        let clause = Clause::compile(&[
            WhereCondition::new("id", Operator::NotIn, "t1"),
            WhereCondition::eq("visibility", "public").or(),
            WhereCondition::eq("pinned", true).or(),
        ]);
        assert_eq!(
            clause.to_json(),
            json!({
                "AND": [
                    { "id": { "notIn": ["t1"] } },
                    { "OR": [
                        { "visibility": { "equals": "public" } },
                        { "pinned": { "equals": true } }
                    ] }
                ]
            })
        );
    }

    #[rstest]
    fn test_only_or_group() {
        let clause = Clause::compile(&[
            WhereCondition::eq("a", 1i64).or(),
            WhereCondition::eq("b", 2i64).or(),
        ]);
        assert!(matches!(clause, Clause::Or(ref parts) if parts.len() == 2));
    }
}
