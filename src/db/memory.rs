//! In-memory reference store.
//!
//! Plain per-table vectors behind an explicit, cloneable [`MemoryStore`]
//! handle. Its predicate semantics are the reference the other engines are
//! tested against: string sorting is ASCII-case-insensitive, substring
//! matches are case-sensitive, and a missing field reads as null.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::backend::{Engine, PhysicalQuery};
use super::coercion::Capabilities;
use super::query::{Operator, SortBy, SortDirection, WhereClause, WhereCondition};
use super::schema::{Schema, Table, ID_FIELD};
use super::value::{Record, Value};
use super::{AdapterError, SchemaError};

type Tables = BTreeMap<String, Vec<Record>>;

/// Shared handle to in-memory tables. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored under a physical table name.
    pub fn len(&self, table: &str) -> usize {
        self.read()
            .map(|tables| tables.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AdapterError> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AdapterError> {
        self.tables.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> AdapterError {
    AdapterError::BackendUnavailable {
        model: "*".to_string(),
        reason: "memory store lock poisoned".to_string(),
    }
}

/// Whether a record satisfies a condition list under the grouping rule.
pub fn matches(record: &Record, filter: &[WhereCondition]) -> bool {
    WhereClause::groups(filter).evaluate(|condition| matches_condition(record, condition))
}

fn matches_condition(record: &Record, condition: &WhereCondition) -> bool {
    let actual = record.get(&condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;
    match condition.operator {
        Operator::Eq => actual.loose_eq(expected),
        Operator::Ne => !actual.loose_eq(expected),
        Operator::Lt => actual.compare(expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            actual.compare(expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => actual.compare(expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            actual.compare(expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => in_list(actual, expected),
        Operator::NotIn => !in_list(actual, expected),
        Operator::Contains => text_test(actual, expected, |s, p| s.contains(p)),
        Operator::StartsWith => text_test(actual, expected, |s, p| s.starts_with(p)),
        Operator::EndsWith => text_test(actual, expected, |s, p| s.ends_with(p)),
    }
}

fn in_list(actual: &Value, operand: &Value) -> bool {
    match operand {
        Value::List(items) => items.iter().any(|item| actual.loose_eq(item)),
        single => actual.loose_eq(single),
    }
}

fn text_test(actual: &Value, operand: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match actual {
        Value::Text(s) => test(s, &operand.to_text()),
        _ => false,
    }
}

/// Sort records by the given keys, stable for ties.
pub fn sort_records(records: &mut [Record], sort_by: &[SortBy]) {
    if sort_by.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        sort_by
            .iter()
            .map(|key| {
                let left = a.get(&key.field).unwrap_or(&Value::Null);
                let right = b.get(&key.field).unwrap_or(&Value::Null);
                let ordering = left.sort_cmp(right);
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Engine over a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    store: MemoryStore,
}

impl MemoryEngine {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Reject a row that would duplicate the key or a unique column of
    /// another row. `skip` is the row's own position when updating.
    fn check_unique(
        table: &Table,
        rows: &[Record],
        candidate: &Record,
        skip: Option<usize>,
    ) -> Result<(), AdapterError> {
        for (column, value) in candidate {
            if value.is_null() || !table.is_unique_column(column) {
                continue;
            }
            let clash = rows
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, row)| row.get(column).is_some_and(|v| v.loose_eq(value)));
            if clash {
                return Err(AdapterError::Constraint {
                    model: table.model_name.clone(),
                    message: format!("duplicate value for unique column '{}'", column),
                });
            }
        }
        Ok(())
    }

    fn insert(table: &Table, rows: &mut Vec<Record>, row: Record) -> Result<Record, AdapterError> {
        if !row.contains_key(ID_FIELD) {
            return Err(SchemaError::MissingRequiredField {
                model: table.model_name.clone(),
                field: ID_FIELD.to_string(),
            }
            .into());
        }
        Self::check_unique(table, rows, &row, None)?;
        rows.push(row.clone());
        Ok(row)
    }

    fn apply_update(
        table: &Table,
        rows: &mut [Record],
        index: usize,
        update: &Record,
    ) -> Result<Record, AdapterError> {
        let mut merged = rows[index].clone();
        merged.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::check_unique(table, rows, &merged, Some(index))?;
        rows[index] = merged.clone();
        Ok(merged)
    }
}

impl Engine for MemoryEngine {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NATIVE
    }

    fn migrate(&self, schema: &Schema) -> Result<Vec<String>, AdapterError> {
        let mut tables = self.store.write()?;
        let mut created = Vec::new();
        for table in schema.tables.values() {
            if !tables.contains_key(&table.model_name) {
                tables.insert(table.model_name.clone(), Vec::new());
                created.push(table.model_name.clone());
            }
        }
        Ok(created)
    }

    fn create(&self, table: &Table, row: Record) -> Result<Record, AdapterError> {
        let mut tables = self.store.write()?;
        let rows = tables.entry(table.model_name.clone()).or_default();
        Self::insert(table, rows, row)
    }

    fn find_one(
        &self,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError> {
        let tables = self.store.read()?;
        Ok(tables
            .get(&table.model_name)
            .and_then(|rows| rows.iter().find(|row| matches(row, filter)))
            .cloned())
    }

    fn find_many(&self, table: &Table, query: &PhysicalQuery) -> Result<Vec<Record>, AdapterError> {
        let tables = self.store.read()?;
        let mut rows: Vec<Record> = tables
            .get(&table.model_name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        sort_records(&mut rows, &query.sort_by);
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let tables = self.store.read()?;
        Ok(tables
            .get(&table.model_name)
            .map_or(0, |rows| rows.iter().filter(|row| matches(row, filter)).count()) as u64)
    }

    fn update(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError> {
        let mut tables = self.store.write()?;
        let Some(rows) = tables.get_mut(&table.model_name) else {
            return Ok(None);
        };
        match rows.iter().position(|row| matches(row, filter)) {
            Some(index) => Self::apply_update(table, rows, index, &update).map(Some),
            None => Ok(None),
        }
    }

    fn update_many(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError> {
        let mut tables = self.store.write()?;
        let Some(rows) = tables.get_mut(&table.model_name) else {
            return Ok(0);
        };
        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches(row, filter))
            .map(|(i, _)| i)
            .collect();
        for &index in &targets {
            Self::apply_update(table, rows, index, &update)?;
        }
        Ok(targets.len() as u64)
    }

    fn upsert(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError> {
        let mut tables = self.store.write()?;
        let rows = tables.entry(table.model_name.clone()).or_default();
        match rows.iter().position(|row| matches(row, filter)) {
            Some(index) => Self::apply_update(table, rows, index, &update),
            None => Self::insert(table, rows, create),
        }
    }

    fn delete(&self, table: &Table, filter: &[WhereCondition]) -> Result<(), AdapterError> {
        let mut tables = self.store.write()?;
        if let Some(rows) = tables.get_mut(&table.model_name) {
            if let Some(index) = rows.iter().position(|row| matches(row, filter)) {
                rows.remove(index);
            }
        }
        Ok(())
    }

    fn delete_many(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let mut tables = self.store.write()?;
        let Some(rows) = tables.get_mut(&table.model_name) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches(row, filter));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{FieldAttribute, FieldType};
    use crate::record;
    use rstest::{fixture, rstest};

    #[fixture]
    fn table() -> Table {
        Table::new("thread")
            .with_field("title", FieldAttribute::new(FieldType::String))
            .with_field("visibility", FieldAttribute::new(FieldType::String))
            .with_field("slug", FieldAttribute::new(FieldType::String).unique())
    }

    #[fixture]
    fn engine(table: Table) -> MemoryEngine {
        let engine = MemoryEngine::new(MemoryStore::new());
        for (id, title, visibility) in [
            ("t1", "General", "private"),
            ("t2", "alpha-room", "public"),
            ("t3", "beta-room", "public"),
        ] {
            engine
                .create(&table, record! { "id" => id, "title" => title, "visibility" => visibility })
                .unwrap();
        }
        engine
    }

    fn ids(rows: &[Record]) -> Vec<String> {
        rows.iter().map(|r| r["id"].to_text()).collect()
    }

    #[rstest]
    #[case(WhereCondition::new("title", Operator::Contains, "room"), vec!["t2", "t3"])]
    #[case(WhereCondition::new("title", Operator::StartsWith, "alpha"), vec!["t2"])]
    #[case(WhereCondition::new("title", Operator::EndsWith, "room"), vec!["t2", "t3"])]
    #[case(WhereCondition::new("title", Operator::Contains, "ROOM"), vec![])]
    #[case(WhereCondition::new("id", Operator::In, vec!["t1", "t3"]), vec!["t1", "t3"])]
    #[case(WhereCondition::new("id", Operator::NotIn, vec!["t1"]), vec!["t2", "t3"])]
    #[case(WhereCondition::new("visibility", Operator::Ne, "public"), vec!["t1"])]
    #[case(WhereCondition::new("title", Operator::Gt, "a"), vec!["t2", "t3"])]
    fn test_operators(
        engine: MemoryEngine,
        table: Table,
        #[case] condition: WhereCondition,
        #[case] expected: Vec<&str>,
    ) {
        let query = PhysicalQuery {
            filter: vec![condition],
            ..PhysicalQuery::default()
        };
        assert_eq!(ids(&engine.find_many(&table, &query).unwrap()), expected);
    }

    #[rstest]
    fn test_sort_is_case_insensitive(engine: MemoryEngine, table: Table) {
        let query = PhysicalQuery {
            sort_by: vec![SortBy::asc("title")],
            ..PhysicalQuery::default()
        };
        assert_eq!(ids(&engine.find_many(&table, &query).unwrap()), vec!["t2", "t3", "t1"]);
    }

    #[rstest]
    fn test_limit_offset(engine: MemoryEngine, table: Table) {
        let query = PhysicalQuery {
            sort_by: vec![SortBy::desc("title")],
            limit: Some(1),
            offset: Some(1),
            ..PhysicalQuery::default()
        };
        assert_eq!(ids(&engine.find_many(&table, &query).unwrap()), vec!["t3"]);
    }

    #[rstest]
    fn test_duplicate_id_is_constraint(engine: MemoryEngine, table: Table) {
        let err = engine.create(&table, record! { "id" => "t1" }).unwrap_err();
        assert!(matches!(err, AdapterError::Constraint { .. }));
    }

    #[rstest]
    fn test_missing_id_is_required_field(engine: MemoryEngine, table: Table) {
        let err = engine.create(&table, record! { "title" => "no id" }).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Schema(SchemaError::MissingRequiredField { ref field, .. }) if field == "id"
        ));
    }

    #[rstest]
    fn test_sort_keeps_insertion_order_for_case_only_ties(table: Table) {
        let engine = MemoryEngine::new(MemoryStore::new());
        for (id, title) in [("t1", "b"), ("t2", "B"), ("t3", "a")] {
            engine.create(&table, record! { "id" => id, "title" => title }).unwrap();
        }
        let query = PhysicalQuery {
            sort_by: vec![SortBy::asc("title")],
            ..PhysicalQuery::default()
        };
        assert_eq!(ids(&engine.find_many(&table, &query).unwrap()), vec!["t3", "t1", "t2"]);
    }

    #[rstest]
    fn test_unique_column(engine: MemoryEngine, table: Table) {
        engine.create(&table, record! { "id" => "t9", "slug" => "s" }).unwrap();
        let err = engine.create(&table, record! { "id" => "t10", "slug" => "s" }).unwrap_err();
        assert!(matches!(err, AdapterError::Constraint { .. }));
    }

    #[rstest]
    fn test_update_many_and_delete_many(engine: MemoryEngine, table: Table) {
        let filter = vec![WhereCondition::eq("visibility", "public")];
        let updated = engine
            .update_many(&table, &filter, record! { "visibility" => "private" })
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(engine.count(&table, &[WhereCondition::eq("visibility", "private")]).unwrap(), 3);

        let all = vec![WhereCondition::new("id", Operator::In, vec!["t1", "t2", "t3"])];
        assert_eq!(engine.delete_many(&table, &all).unwrap(), 3);
        assert_eq!(engine.delete_many(&table, &all).unwrap(), 0);
        assert!(engine.store().is_empty("thread"));
    }

    #[rstest]
    fn test_update_missing_is_none(engine: MemoryEngine, table: Table) {
        let result = engine
            .update(&table, &[WhereCondition::eq("id", "nope")], record! { "title" => "x" })
            .unwrap();
        assert!(result.is_none());
        engine.delete(&table, &[WhereCondition::eq("id", "nope")]).unwrap();
        assert_eq!(engine.store().len("thread"), 3);
    }

    #[rstest]
    fn test_upsert(engine: MemoryEngine, table: Table) {
        let filter = vec![WhereCondition::eq("id", "t4")];
        let created = engine
            .upsert(&table, &filter, record! { "id" => "t4", "title" => "new" }, record! { "title" => "changed" })
            .unwrap();
        assert_eq!(created["title"], Value::from("new"));
        let updated = engine
            .upsert(&table, &filter, record! { "id" => "t4", "title" => "new" }, record! { "title" => "changed" })
            .unwrap();
        assert_eq!(updated["title"], Value::from("changed"));
        assert_eq!(engine.store().len("thread"), 4);
    }

    #[rstest]
    fn test_missing_field_reads_as_null(table: Table) {
        let engine = MemoryEngine::new(MemoryStore::new());
        engine.create(&table, record! { "id" => "x" }).unwrap();
        let found = engine
            .find_one(&table, &[WhereCondition::eq("title", Value::Null)])
            .unwrap();
        assert!(found.is_some());
        let none = engine
            .find_many(&table, &PhysicalQuery {
                filter: vec![WhereCondition::new("title", Operator::Lt, "z")],
                ..PhysicalQuery::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[rstest]
    fn test_store_handles_share_data(table: Table) {
        let store = MemoryStore::new();
        MemoryEngine::new(store.clone())
            .create(&table, record! { "id" => "a" })
            .unwrap();
        assert_eq!(MemoryEngine::new(store).store().len("thread"), 1);
    }
}
