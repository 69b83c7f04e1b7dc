//! `DocumentStore` for the synchronous MongoDB driver.

use bson::{doc, Document};
use mongodb::options::{Collation, CollationStrength, IndexOptions, ReturnDocument};
use mongodb::sync::{Client, Collection, Database};
use mongodb::IndexModel;

use super::{DocumentStore, FindSpec};
use crate::db::AdapterError;

/// Connect and select a database.
pub fn connect(uri: &str, database: &str) -> Result<Database, AdapterError> {
    let client = Client::with_uri_str(uri).map_err(AdapterError::backend)?;
    Ok(client.database(database))
}

/// ASCII-case-insensitive ordering for string sort keys.
fn case_insensitive() -> Collation {
    Collation::builder()
        .locale("en")
        .strength(CollationStrength::Secondary)
        .build()
}

fn collection(db: &Database, name: &str) -> Collection<Document> {
    db.collection::<Document>(name)
}

impl DocumentStore for Database {
    fn insert_one(&self, name: &str, document: Document) -> Result<(), AdapterError> {
        collection(self, name)
            .insert_one(document)
            .run()
            .map_err(AdapterError::backend)?;
        Ok(())
    }

    fn find(&self, name: &str, spec: FindSpec) -> Result<Vec<Document>, AdapterError> {
        let coll = collection(self, name);
        let mut find = coll.find(spec.filter);
        if let Some(sort) = spec.sort {
            find = find.sort(sort).collation(case_insensitive());
        }
        if let Some(skip) = spec.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = spec.limit {
            find = find.limit(limit);
        }
        find.run()
            .map_err(AdapterError::backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AdapterError::backend)
    }

    fn count(&self, name: &str, filter: Document) -> Result<u64, AdapterError> {
        collection(self, name)
            .count_documents(filter)
            .run()
            .map_err(AdapterError::backend)
    }

    fn find_one_and_update(
        &self,
        name: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<Option<Document>, AdapterError> {
        collection(self, name)
            .find_one_and_update(filter, update)
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .run()
            .map_err(AdapterError::backend)
    }

    fn update_many(&self, name: &str, filter: Document, update: Document) -> Result<u64, AdapterError> {
        let result = collection(self, name)
            .update_many(filter, update)
            .run()
            .map_err(AdapterError::backend)?;
        Ok(result.matched_count)
    }

    fn delete_one(&self, name: &str, filter: Document) -> Result<u64, AdapterError> {
        let result = collection(self, name)
            .delete_one(filter)
            .run()
            .map_err(AdapterError::backend)?;
        Ok(result.deleted_count)
    }

    fn delete_many(&self, name: &str, filter: Document) -> Result<u64, AdapterError> {
        let result = collection(self, name)
            .delete_many(filter)
            .run()
            .map_err(AdapterError::backend)?;
        Ok(result.deleted_count)
    }

    fn create_unique_index(&self, name: &str, field: &str) -> Result<String, AdapterError> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let result = collection(self, name)
            .create_index(index)
            .run()
            .map_err(AdapterError::backend)?;
        Ok(result.index_name)
    }
}
