//! Normalized where-clause, sort and pagination model.
//!
//! Every engine consumes predicates through [`WhereClause::groups`], which is
//! the single place the connector grouping rule lives:
//!
//! ```text
//! (c1 AND c2 AND ...) AND (o1 OR o2 OR ...)
//! ```
//!
//! where `c*` carry the `And` connector and `o*` the `Or` connector. A lone
//! condition collapses to itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::Value;
use super::AdapterError;

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        }
    }

    /// Operators whose operand is a list.
    pub fn is_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Substring operators, whose operand stays text.
    pub fn is_substring(self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| AdapterError::UnsupportedOperator {
                operator: s.to_string(),
            })
    }
}

/// How a condition joins the predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

/// One predicate term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereCondition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    #[serde(default)]
    pub connector: Connector,
}

impl WhereCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Join this condition through the OR-group.
    pub fn or(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }

    /// Same condition against another field name (logical to physical).
    pub fn with_field(&self, field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: self.operator,
            value,
            connector: self.connector,
        }
    }
}

/// The shape a list of conditions compiles to.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause<'a> {
    /// No conditions: matches everything.
    All,
    /// Exactly one condition, used directly.
    Single(&'a WhereCondition),
    /// `(AND of and_group) AND (OR of or_group)`; either group may be empty.
    Groups {
        and_group: Vec<&'a WhereCondition>,
        or_group: Vec<&'a WhereCondition>,
    },
}

impl<'a> WhereClause<'a> {
    pub fn groups(conditions: &'a [WhereCondition]) -> Self {
        match conditions {
            [] => WhereClause::All,
            [single] => WhereClause::Single(single),
            many => {
                let (or_group, and_group): (Vec<_>, Vec<_>) = many
                    .iter()
                    .partition(|c| c.connector == Connector::Or);
                WhereClause::Groups { and_group, or_group }
            }
        }
    }

    /// Evaluate the grouping rule with a per-condition test.
    pub fn evaluate(&self, mut test: impl FnMut(&WhereCondition) -> bool) -> bool {
        match self {
            WhereClause::All => true,
            WhereClause::Single(c) => test(c),
            WhereClause::Groups { and_group, or_group } => {
                and_group.iter().all(|c| test(c))
                    && (or_group.is_empty() || or_group.iter().any(|c| test(c)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Arguments of `find_many`.
///
/// `sort_by` keys apply in order; the document store honors only the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindMany {
    #[serde(default, rename = "where")]
    pub filter: Vec<WhereCondition>,
    #[serde(default)]
    pub sort_by: Vec<SortBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FindMany {
    pub fn filter(filter: Vec<WhereCondition>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: SortBy) -> Self {
        self.sort_by.push(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("eq", Operator::Eq)]
    #[case("not_in", Operator::NotIn)]
    #[case("starts_with", Operator::StartsWith)]
    #[case("ends_with", Operator::EndsWith)]
    fn test_parse_operator(#[case] text: &str, #[case] expected: Operator) {
        assert_eq!(text.parse::<Operator>().unwrap(), expected);
    }

    #[rstest]
    fn test_parse_unknown_operator() {
        let err = "like".parse::<Operator>().unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedOperator { operator } if operator == "like"));
    }

    #[rstest]
    fn test_single_condition_collapses() {
        let conditions = vec![WhereCondition::eq("id", "t1").or()];
        assert!(matches!(
            WhereClause::groups(&conditions),
            WhereClause::Single(_)
        ));
    }

    #[rstest]
    fn test_groups_partition_by_connector() {
        let conditions = vec![
            WhereCondition::eq("a", 1i64),
            WhereCondition::eq("b", 2i64).or(),
            WhereCondition::eq("c", 3i64),
        ];
        match WhereClause::groups(&conditions) {
            WhereClause::Groups { and_group, or_group } => {
                assert_eq!(and_group.len(), 2);
                assert_eq!(or_group.len(), 1);
                assert_eq!(or_group[0].field, "b");
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[rstest]
    #[case(true, true, false, true)]
    #[case(true, false, false, false)]
    #[case(true, true, true, true)]
    #[case(false, true, true, false)]
    fn test_evaluate_and_or(
        #[case] a: bool,
        #[case] or1: bool,
        #[case] or2: bool,
        #[case] expected: bool,
    ) {
        let conditions = vec![
            WhereCondition::eq("a", true),
            WhereCondition::eq("o1", true).or(),
            WhereCondition::eq("o2", true).or(),
        ];
        let outcome = WhereClause::groups(&conditions).evaluate(|c| match c.field.as_str() {
            "a" => a,
            "o1" => or1,
            _ => or2,
        });
        assert_eq!(outcome, expected);
    }

    #[rstest]
    fn test_empty_matches_all() {
        assert!(WhereClause::groups(&[]).evaluate(|_| false));
    }

    #[rstest]
    fn test_find_many_deserializes_where_key() {
        let json = r#"{"where":[{"field":"title","operator":"contains","value":"room"}],"sort_by":[{"field":"title","direction":"desc"}],"limit":2,"offset":null}"#;
        let query: FindMany = serde_json::from_str(json).unwrap();
        assert_eq!(query.filter[0].operator, Operator::Contains);
        assert_eq!(query.filter[0].connector, Connector::And);
        assert_eq!(query.sort_by[0], SortBy::desc("title"));
        assert_eq!(query.limit, Some(2));
    }
}
