//! Document-store backend.
//!
//! [`DocumentEngine`] compiles the shared query model to MongoDB-style filter
//! documents and runs them through a [`DocumentStore`] handle. The shipped
//! handle is `mongodb::sync::Database`; tests substitute their own.
//!
//! Only the first sort key is honored, compared with a case-insensitive
//! collation. `id` is stored as `_id`.

pub mod filter;
mod mongo;

pub use filter::DOCUMENT_ID;
pub use mongo::connect;

use bson::{doc, Document};

use super::backend::{Engine, PhysicalQuery};
use super::coercion::Capabilities;
use super::query::WhereCondition;
use super::schema::{Schema, Table, ID_FIELD};
use super::value::Record;
use super::AdapterError;

/// `find` arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

/// Collection-level operations of a document database.
pub trait DocumentStore: Send + Sync {
    fn insert_one(&self, collection: &str, document: Document) -> Result<(), AdapterError>;

    fn find(&self, collection: &str, spec: FindSpec) -> Result<Vec<Document>, AdapterError>;

    fn count(&self, collection: &str, filter: Document) -> Result<u64, AdapterError>;

    /// Apply `update` to the first match and return the updated document.
    /// With `upsert`, insert when nothing matches.
    fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<Option<Document>, AdapterError>;

    /// Returns the matched count.
    fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64, AdapterError>;

    fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, AdapterError>;

    fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, AdapterError>;

    /// Returns the index name.
    fn create_unique_index(&self, collection: &str, field: &str) -> Result<String, AdapterError>;
}

const CAPABILITIES: Capabilities = Capabilities {
    supports_json: true,
    supports_dates: true,
    supports_booleans: true,
    supports_numeric_ids: false,
    supports_arrays: true,
};

pub struct DocumentEngine {
    store: Box<dyn DocumentStore>,
    debug_logs: bool,
}

impl DocumentEngine {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            debug_logs: false,
        }
    }

    pub fn with_debug_logs(mut self, debug_logs: bool) -> Self {
        self.debug_logs = debug_logs;
        self
    }

    fn filter(&self, table: &Table, operation: &str, conditions: &[WhereCondition]) -> Document {
        let filter = filter::compile(conditions);
        if self.debug_logs {
            tracing::debug!(collection = %table.model_name, operation, %filter, "document filter");
        }
        filter
    }
}

fn set(update: &Record) -> Document {
    doc! { "$set": filter::to_document(update) }
}

impl Engine for DocumentEngine {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn migrate(&self, schema: &Schema) -> Result<Vec<String>, AdapterError> {
        let mut created = Vec::new();
        for (_, table) in schema.ordered_tables() {
            for column in table.columns() {
                if column != ID_FIELD && table.is_unique_column(&column) {
                    created.push(self.store.create_unique_index(&table.model_name, &column)?);
                }
            }
        }
        Ok(created)
    }

    fn create(&self, table: &Table, row: Record) -> Result<Record, AdapterError> {
        self.store
            .insert_one(&table.model_name, filter::to_document(&row))?;
        Ok(row)
    }

    fn find_one(
        &self,
        table: &Table,
        conditions: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError> {
        let spec = FindSpec {
            filter: self.filter(table, "findOne", conditions),
            limit: Some(1),
            ..FindSpec::default()
        };
        Ok(self
            .store
            .find(&table.model_name, spec)?
            .into_iter()
            .next()
            .map(filter::from_document))
    }

    fn find_many(&self, table: &Table, query: &PhysicalQuery) -> Result<Vec<Record>, AdapterError> {
        let spec = FindSpec {
            filter: self.filter(table, "find", &query.filter),
            sort: filter::sort(&query.sort_by),
            skip: query.offset.map(|n| n as u64),
            limit: query.limit.map(|n| n as i64),
        };
        Ok(self
            .store
            .find(&table.model_name, spec)?
            .into_iter()
            .map(filter::from_document)
            .collect())
    }

    fn count(&self, table: &Table, conditions: &[WhereCondition]) -> Result<u64, AdapterError> {
        let filter = self.filter(table, "countDocuments", conditions);
        self.store.count(&table.model_name, filter)
    }

    fn update(
        &self,
        table: &Table,
        conditions: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError> {
        let filter = self.filter(table, "findOneAndUpdate", conditions);
        Ok(self
            .store
            .find_one_and_update(&table.model_name, filter, set(&update), false)?
            .map(filter::from_document))
    }

    fn update_many(
        &self,
        table: &Table,
        conditions: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError> {
        let filter = self.filter(table, "updateMany", conditions);
        self.store.update_many(&table.model_name, filter, set(&update))
    }

    fn upsert(
        &self,
        table: &Table,
        conditions: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError> {
        let filter = self.filter(table, "findOneAndUpdate", conditions);
        let insert_only: Record = create
            .into_iter()
            .filter(|(field, _)| !update.contains_key(field))
            .collect();

        let mut modifications = Document::new();
        if !update.is_empty() {
            modifications.insert("$set", filter::to_document(&update));
        }
        if !insert_only.is_empty() {
            modifications.insert("$setOnInsert", filter::to_document(&insert_only));
        }

        self.store
            .find_one_and_update(&table.model_name, filter, modifications, true)?
            .map(filter::from_document)
            .ok_or_else(|| AdapterError::InvalidQuery {
                message: format!("upsert on '{}' returned no document", table.model_name),
            })
    }

    fn delete(&self, table: &Table, conditions: &[WhereCondition]) -> Result<(), AdapterError> {
        let filter = self.filter(table, "deleteOne", conditions);
        self.store.delete_one(&table.model_name, filter)?;
        Ok(())
    }

    fn delete_many(&self, table: &Table, conditions: &[WhereCondition]) -> Result<u64, AdapterError> {
        let filter = self.filter(table, "deleteMany", conditions);
        self.store.delete_many(&table.model_name, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::SortBy;
    use crate::db::schema::builtin_tables;
    use crate::record;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    /// Records every call; answers with canned documents.
    #[derive(Default, Clone)]
    struct RecordingStore {
        calls: Arc<Mutex<Vec<(String, Document)>>>,
    }

    impl RecordingStore {
        fn push(&self, call: &str, document: Document) {
            self.calls.lock().unwrap().push((call.to_string(), document));
        }
    }

    impl DocumentStore for RecordingStore {
        fn insert_one(&self, _: &str, document: Document) -> Result<(), AdapterError> {
            self.push("insert_one", document);
            Ok(())
        }
        fn find(&self, _: &str, spec: FindSpec) -> Result<Vec<Document>, AdapterError> {
            let mut shape = doc! { "filter": spec.filter };
            if let Some(sort) = spec.sort {
                shape.insert("sort", sort);
            }
            if let Some(skip) = spec.skip {
                shape.insert("skip", skip as i64);
            }
            if let Some(limit) = spec.limit {
                shape.insert("limit", limit);
            }
            self.push("find", shape);
            Ok(vec![doc! { "_id": "t1", "title": "General" }])
        }
        fn count(&self, _: &str, filter: Document) -> Result<u64, AdapterError> {
            self.push("count", filter);
            Ok(3)
        }
        fn find_one_and_update(
            &self,
            _: &str,
            filter: Document,
            update: Document,
            upsert: bool,
        ) -> Result<Option<Document>, AdapterError> {
            self.push("find_one_and_update", doc! { "filter": filter, "update": update, "upsert": upsert });
            Ok(Some(doc! { "_id": "t1" }))
        }
        fn update_many(&self, _: &str, filter: Document, _: Document) -> Result<u64, AdapterError> {
            self.push("update_many", filter);
            Ok(2)
        }
        fn delete_one(&self, _: &str, filter: Document) -> Result<u64, AdapterError> {
            self.push("delete_one", filter);
            Ok(0)
        }
        fn delete_many(&self, _: &str, filter: Document) -> Result<u64, AdapterError> {
            self.push("delete_many", filter);
            Ok(0)
        }
        fn create_unique_index(&self, collection: &str, field: &str) -> Result<String, AdapterError> {
            self.push("create_unique_index", doc! { "collection": collection, "field": field });
            Ok(format!("{}_1", field))
        }
    }

    fn engine() -> (DocumentEngine, RecordingStore) {
        let store = RecordingStore::default();
        (DocumentEngine::new(store.clone()), store)
    }

    fn last(store: &RecordingStore) -> (String, Document) {
        store.calls.lock().unwrap().last().cloned().unwrap()
    }

    #[rstest]
    fn test_find_many_shape() {
        let (engine, store) = engine();
        let query = PhysicalQuery {
            filter: vec![WhereCondition::eq("id", "t1")],
            sort_by: vec![SortBy::asc("title"), SortBy::desc("id")],
            limit: Some(2),
            offset: Some(1),
        };
        let rows = engine.find_many(&Table::new("thread"), &query).unwrap();
        assert_eq!(rows[0]["id"], crate::db::Value::from("t1"));
        assert_eq!(
            last(&store),
            (
                "find".to_string(),
                doc! {
                    "filter": { "_id": { "$eq": "t1" } },
                    "sort": { "title": 1 },
                    "skip": 1i64,
                    "limit": 2i64,
                }
            )
        );
    }

    #[rstest]
    fn test_upsert_splits_set_and_set_on_insert() {
        let (engine, store) = engine();
        engine
            .upsert(
                &Table::new("thread"),
                &[WhereCondition::eq("id", "t1")],
                record! { "id" => "t1", "title" => "New" },
                record! { "title" => "Updated" },
            )
            .unwrap();
        let (call, shape) = last(&store);
        assert_eq!(call, "find_one_and_update");
        assert_eq!(
            shape,
            doc! {
                "filter": { "_id": { "$eq": "t1" } },
                "update": {
                    "$set": { "title": "Updated" },
                    "$setOnInsert": { "_id": "t1" },
                },
                "upsert": true,
            }
        );
    }

    #[rstest]
    fn test_update_is_set_without_upsert() {
        let (engine, store) = engine();
        engine
            .update(&Table::new("thread"), &[WhereCondition::eq("id", "t1")], record! { "pinned" => true })
            .unwrap();
        let (_, shape) = last(&store);
        assert_eq!(shape.get_bool("upsert").unwrap(), false);
        assert_eq!(shape.get_document("update").unwrap(), &doc! { "$set": { "pinned": true } });
    }

    #[rstest]
    fn test_migrate_creates_unique_indexes() {
        let (engine, store) = engine();
        let schema = Schema { tables: builtin_tables() };
        let created = engine.migrate(&schema).unwrap();
        assert_eq!(created, vec!["email_1".to_string()]);
        assert_eq!(
            last(&store).1,
            doc! { "collection": "user", "field": "email" }
        );
    }
}
