//! The storage contract over logical model and field names.
//!
//! [`StorageAdapter`] owns the schema and one [`Backend`]. Every call:
//!
//! 1. resolves the model and validates field names against the schema,
//! 2. maps logical fields to physical columns and applies input transforms,
//! 3. encodes values for the backend's [`Capabilities`],
//! 4. runs the engine,
//! 5. decodes, applies output transforms, strips `returned: false` fields and
//!    the `select` projection.
//!
//! Not-found is never an error: `find_one` and `update` return `None`,
//! `delete` is a no-op.

use super::backend::{Backend, Engine, PhysicalQuery};
use super::coercion::{self, Capabilities};
use super::identity::{self, AdapterOptions};
use super::memory::{MemoryEngine, MemoryStore};
use super::query::{Connector, FindMany, Operator, SortBy, WhereCondition};
use super::schema::{FieldAttribute, Schema, Table};
use super::value::{Record, Value};
use super::AdapterError;

/// One CRUD-and-query contract, identical across backends.
pub trait Adapter: Send + Sync {
    /// Backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;

    /// Insert a record; returns it merged with generated id and defaults.
    fn create(&self, model: &str, data: Record, select: Option<&[&str]>) -> Result<Record, AdapterError>;

    fn find_one(
        &self,
        model: &str,
        filter: &[WhereCondition],
        select: Option<&[&str]>,
    ) -> Result<Option<Record>, AdapterError>;

    fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError>;

    fn count(&self, model: &str, filter: &[WhereCondition]) -> Result<u64, AdapterError>;

    /// Update the first match with the given fields only.
    fn update(
        &self,
        model: &str,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError>;

    /// Returns the number of matched records.
    fn update_many(
        &self,
        model: &str,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError>;

    /// Update the first match, or create when nothing matches.
    fn upsert(
        &self,
        model: &str,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError>;

    fn delete(&self, model: &str, filter: &[WhereCondition]) -> Result<(), AdapterError>;

    /// Returns the number of deleted records.
    fn delete_many(&self, model: &str, filter: &[WhereCondition]) -> Result<u64, AdapterError>;
}

/// Adapter over one backend, chosen at construction.
#[derive(Debug)]
pub struct StorageAdapter {
    schema: Schema,
    backend: Backend,
    options: AdapterOptions,
}

impl StorageAdapter {
    pub fn new(schema: Schema, backend: impl Into<Backend>, options: AdapterOptions) -> Self {
        Self {
            schema,
            backend: backend.into(),
            options,
        }
    }

    /// Zero-configuration adapter over a fresh in-memory store.
    pub fn in_memory(schema: Schema, options: AdapterOptions) -> Self {
        tracing::warn!(
            "using the in-memory store; data will not survive a restart"
        );
        Self::new(schema, MemoryEngine::new(MemoryStore::new()), options)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Create storage for every table.
    pub fn migrate(&self) -> Result<Vec<String>, AdapterError> {
        self.backend.migrate(&self.schema)
    }

    fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn log(&self, model: &str, operation: &str) {
        if self.options.debug_logs {
            tracing::info!(model, operation, backend = self.backend.backend_name(), "adapter call");
        }
    }

    /// Logical record to physical row: columns renamed, transforms applied,
    /// values encoded.
    fn to_row(&self, model: &str, table: &Table, record: Record) -> Result<Record, AdapterError> {
        let caps = self.capabilities();
        record
            .into_iter()
            .map(|(field, value)| -> Result<(String, Value), AdapterError> {
                let column = table.column_name(model, &field)?;
                let value = match table.field(&field) {
                    Some(attr) => coercion::encode(attr, convert_input(attr, value), caps),
                    None => value,
                };
                Ok((column, value))
            })
            .collect()
    }

    fn to_filter(
        &self,
        model: &str,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Vec<WhereCondition>, AdapterError> {
        let caps = self.capabilities();
        filter
            .iter()
            .map(|condition| -> Result<WhereCondition, AdapterError> {
                let column = table.column_name(model, &condition.field)?;
                let attr = table.field(&condition.field);
                let value = match attr {
                    Some(attr) => convert_operand(attr, condition.operator, condition.value.clone()),
                    None => condition.value.clone(),
                };
                let value = coercion::encode_operand(attr, condition.operator, value, caps);
                Ok(condition.with_field(column, value))
            })
            .collect()
    }

    fn to_sort(&self, model: &str, table: &Table, sort_by: &[SortBy]) -> Result<Vec<SortBy>, AdapterError> {
        sort_by
            .iter()
            .map(|sort| -> Result<SortBy, AdapterError> {
                Ok(SortBy {
                    field: table.column_name(model, &sort.field)?,
                    direction: sort.direction,
                })
            })
            .collect()
    }

    /// Physical row to the logical output record.
    fn to_output(&self, table: &Table, row: Record, select: Option<&[&str]>) -> Record {
        let mut record: Record = row
            .into_iter()
            .map(|(column, value)| match table.logical_for_column(&column) {
                Some((field, Some(attr))) => {
                    let value = coercion::decode(attr, value);
                    let value = match attr.output_conversion() {
                        Some(conversion) => conversion.apply(value),
                        None => value,
                    };
                    (field.to_string(), value)
                }
                Some((field, None)) => (field.to_string(), value),
                None => (column, value),
            })
            .collect();
        table.strip_hidden(&mut record);
        if let Some(fields) = select {
            record.retain(|field, _| fields.contains(&field.as_str()));
        }
        record
    }

    fn require_filter(model: &str, operation: &str, filter: &[WhereCondition]) -> Result<(), AdapterError> {
        if filter.is_empty() {
            return Err(AdapterError::InvalidQuery {
                message: format!("{} on '{}' requires a where clause", operation, model),
            });
        }
        Ok(())
    }
}

fn convert_input(attr: &FieldAttribute, value: Value) -> Value {
    match attr.input_conversion() {
        Some(conversion) => conversion.apply(value),
        None => value,
    }
}

/// Input transforms apply to operands too, so `email eq "A@x.io"` finds the
/// stored lowercase value.
fn convert_operand(attr: &FieldAttribute, operator: Operator, value: Value) -> Value {
    if attr.input_conversion().is_none() {
        return value;
    }
    if operator.is_list() {
        Value::List(
            value
                .into_list()
                .into_iter()
                .map(|v| convert_input(attr, v))
                .collect(),
        )
    } else {
        convert_input(attr, value)
    }
}

/// Equality conditions of the AND-group, as logical field values.
fn where_equalities(filter: &[WhereCondition]) -> impl Iterator<Item = (&str, &Value)> {
    let single = filter.len() == 1;
    filter
        .iter()
        .filter(move |c| single || c.connector == Connector::And)
        .filter(|c| c.operator == Operator::Eq && !c.value.is_null())
        .map(|c| (c.field.as_str(), &c.value))
}

impl Adapter for StorageAdapter {
    fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    fn create(&self, model: &str, data: Record, select: Option<&[&str]>) -> Result<Record, AdapterError> {
        self.log(model, "create");
        let table = self.schema.table(model)?;
        let prepared = identity::prepare_create(
            model,
            table,
            data,
            &self.options,
            self.capabilities().supports_numeric_ids,
        )?;
        let row = self.to_row(model, table, prepared)?;
        let created = self.backend.create(table, row)?;
        Ok(self.to_output(table, created, select))
    }

    fn find_one(
        &self,
        model: &str,
        filter: &[WhereCondition],
        select: Option<&[&str]>,
    ) -> Result<Option<Record>, AdapterError> {
        self.log(model, "findOne");
        let table = self.schema.table(model)?;
        let filter = self.to_filter(model, table, filter)?;
        Ok(self
            .backend
            .find_one(table, &filter)?
            .map(|row| self.to_output(table, row, select)))
    }

    fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError> {
        self.log(model, "findMany");
        let table = self.schema.table(model)?;
        let physical = PhysicalQuery {
            filter: self.to_filter(model, table, &query.filter)?,
            sort_by: self.to_sort(model, table, &query.sort_by)?,
            limit: query.limit,
            offset: query.offset,
        };
        Ok(self
            .backend
            .find_many(table, &physical)?
            .into_iter()
            .map(|row| self.to_output(table, row, None))
            .collect())
    }

    fn count(&self, model: &str, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        self.log(model, "count");
        let table = self.schema.table(model)?;
        let filter = self.to_filter(model, table, filter)?;
        self.backend.count(table, &filter)
    }

    fn update(
        &self,
        model: &str,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError> {
        self.log(model, "update");
        Self::require_filter(model, "update", filter)?;
        let table = self.schema.table(model)?;
        let physical_filter = self.to_filter(model, table, filter)?;
        let row = self.to_row(model, table, update)?;
        let updated = if row.is_empty() {
            self.backend.find_one(table, &physical_filter)?
        } else {
            self.backend.update(table, &physical_filter, row)?
        };
        Ok(updated.map(|row| self.to_output(table, row, None)))
    }

    fn update_many(
        &self,
        model: &str,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError> {
        self.log(model, "updateMany");
        let table = self.schema.table(model)?;
        let physical_filter = self.to_filter(model, table, filter)?;
        let row = self.to_row(model, table, update)?;
        if row.is_empty() {
            return self.backend.count(table, &physical_filter);
        }
        self.backend.update_many(table, &physical_filter, row)
    }

    fn upsert(
        &self,
        model: &str,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError> {
        self.log(model, "upsert");
        Self::require_filter(model, "upsert", filter)?;
        let table = self.schema.table(model)?;

        let mut create = create;
        for (field, value) in where_equalities(filter) {
            if !create.contains_key(field) {
                create.insert(field.to_string(), value.clone());
            }
        }
        let prepared = identity::prepare_create(
            model,
            table,
            create,
            &self.options,
            self.capabilities().supports_numeric_ids,
        )?;

        let physical_filter = self.to_filter(model, table, filter)?;
        let create_row = self.to_row(model, table, prepared)?;
        let update_row = self.to_row(model, table, update)?;

        let row = if update_row.is_empty() {
            match self.backend.find_one(table, &physical_filter)? {
                Some(existing) => existing,
                None => self.backend.create(table, create_row)?,
            }
        } else {
            self.backend
                .upsert(table, &physical_filter, create_row, update_row)?
        };
        Ok(self.to_output(table, row, None))
    }

    fn delete(&self, model: &str, filter: &[WhereCondition]) -> Result<(), AdapterError> {
        self.log(model, "delete");
        Self::require_filter(model, "delete", filter)?;
        let table = self.schema.table(model)?;
        let filter = self.to_filter(model, table, filter)?;
        self.backend.delete(table, &filter)
    }

    fn delete_many(&self, model: &str, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        self.log(model, "deleteMany");
        let table = self.schema.table(model)?;
        let filter = self.to_filter(model, table, filter)?;
        self.backend.delete_many(table, &filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{builtin_tables, FieldType};
    use crate::db::SchemaError;
    use crate::record;
    use rstest::{fixture, rstest};

    #[fixture]
    fn adapter() -> StorageAdapter {
        StorageAdapter::new(
            Schema { tables: builtin_tables() },
            MemoryEngine::new(MemoryStore::new()),
            AdapterOptions::default(),
        )
    }

    fn thread(id: &str, title: &str) -> Record {
        record! { "id" => id, "title" => title, "userId" => "u1" }
    }

    #[rstest]
    fn test_create_applies_defaults_and_columns(adapter: StorageAdapter) {
        let created = adapter.create("thread", thread("t1", "General"), None).unwrap();
        assert_eq!(created["visibility"], Value::from("private"));
        assert_eq!(created["pinned"], Value::Bool(false));
        assert!(created["createdAt"].as_date().is_some());
        assert!(!created.contains_key("user_id"));
        assert_eq!(created["userId"], Value::from("u1"));
    }

    #[rstest]
    fn test_unknown_model_and_field(adapter: StorageAdapter) {
        let err = adapter.create("ghost", Record::new(), None).unwrap_err();
        assert!(matches!(err, AdapterError::Schema(SchemaError::UnknownModel { .. })));

        let err = adapter
            .find_one("thread", &[WhereCondition::eq("nope", 1i64)], None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Schema(SchemaError::UnknownField { .. })));
    }

    #[rstest]
    fn test_missing_required_field(adapter: StorageAdapter) {
        let err = adapter.create("thread", record! { "userId" => "u1" }, None).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Schema(SchemaError::MissingRequiredField { ref field, .. }) if field == "title"
        ));
    }

    #[rstest]
    fn test_select_projection(adapter: StorageAdapter) {
        adapter.create("thread", thread("t1", "General"), None).unwrap();
        let found = adapter
            .find_one("thread", &[WhereCondition::eq("id", "t1")], Some(&["id", "title"]))
            .unwrap()
            .unwrap();
        assert_eq!(found, record! { "id" => "t1", "title" => "General" });
    }

    #[rstest]
    fn test_hidden_fields_and_input_transform(adapter: StorageAdapter) {
        let created = adapter
            .create(
                "user",
                record! { "id" => "u1", "email" => "Ada@Example.COM", "password" => "secret" },
                None,
            )
            .unwrap();
        assert_eq!(created["email"], Value::from("ada@example.com"));
        assert!(!created.contains_key("password"));

        let found = adapter
            .find_one("user", &[WhereCondition::eq("email", "ADA@example.com")], None)
            .unwrap();
        assert!(found.is_some());
    }

    #[rstest]
    fn test_partial_update_keeps_other_fields(adapter: StorageAdapter) {
        adapter.create("thread", thread("t1", "General"), None).unwrap();
        let updated = adapter
            .update("thread", &[WhereCondition::eq("id", "t1")], record! { "pinned" => true })
            .unwrap()
            .unwrap();
        assert_eq!(updated["pinned"], Value::Bool(true));
        assert_eq!(updated["title"], Value::from("General"));
    }

    #[rstest]
    fn test_not_found_is_soft(adapter: StorageAdapter) {
        let by_id = [WhereCondition::eq("id", "missing")];
        assert!(adapter.find_one("thread", &by_id, None).unwrap().is_none());
        assert!(adapter.update("thread", &by_id, record! { "title" => "x" }).unwrap().is_none());
        adapter.delete("thread", &by_id).unwrap();
    }

    #[rstest]
    #[case("update")]
    #[case("upsert")]
    #[case("delete")]
    fn test_empty_where_is_invalid(adapter: StorageAdapter, #[case] operation: &str) {
        let result = match operation {
            "update" => adapter.update("thread", &[], record! { "title" => "x" }).map(|_| ()),
            "upsert" => adapter
                .upsert("thread", &[], thread("t1", "x"), record! { "title" => "y" })
                .map(|_| ()),
            _ => adapter.delete("thread", &[]),
        };
        assert!(matches!(result, Err(AdapterError::InvalidQuery { .. })));
    }

    #[rstest]
    fn test_upsert_completes_create_from_where(adapter: StorageAdapter) {
        let by_id = [WhereCondition::eq("id", "t9")];
        let created = adapter
            .upsert(
                "thread",
                &by_id,
                record! { "title" => "New", "userId" => "u1" },
                record! { "title" => "Updated" },
            )
            .unwrap();
        assert_eq!(created["id"], Value::from("t9"));
        assert_eq!(created["title"], Value::from("New"));

        let updated = adapter
            .upsert(
                "thread",
                &by_id,
                record! { "title" => "New", "userId" => "u1" },
                record! { "title" => "Updated" },
            )
            .unwrap();
        assert_eq!(updated["title"], Value::from("Updated"));
        assert_eq!(adapter.count("thread", &[]).unwrap(), 1);
    }

    #[rstest]
    fn test_sort_by_remapped_field(adapter: StorageAdapter) {
        adapter.create("thread", thread("t1", "a"), None).unwrap();
        adapter
            .create("thread", record! { "id" => "t2", "title" => "b", "userId" => "u2" }, None)
            .unwrap();
        let rows = adapter
            .find_many("thread", &FindMany::default().sort(SortBy::desc("userId")))
            .unwrap();
        assert_eq!(rows[0]["id"], Value::from("t2"));
    }

    #[rstest]
    fn test_numeric_field_decodes(adapter: StorageAdapter) {
        let created = adapter.create("thread", thread("t1", "General"), None).unwrap();
        assert_eq!(created["messageCount"], Value::Int(0));
        assert_eq!(
            adapter.schema().table("thread").unwrap().field("messageCount").unwrap().field_type,
            FieldType::Number
        );
    }
}
