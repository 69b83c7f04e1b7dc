//! Engine trait and the sealed set of backends.
//!
//! Engines work on physical names and encoded values only: the adapter has
//! already mapped logical fields, applied defaults and coerced values. Each
//! method receives the [`Table`] so an engine can look up its physical name
//! and column metadata.

use enum_dispatch::enum_dispatch;

use super::coercion::Capabilities;
use super::document::DocumentEngine;
use super::memory::MemoryEngine;
use super::orm::OrmEngine;
use super::query::{SortBy, WhereCondition};
use super::schema::{Schema, Table};
use super::sql::SqlEngine;
use super::value::Record;
use super::AdapterError;

/// `find_many` arguments after name mapping.
#[derive(Debug, Clone, Default)]
pub struct PhysicalQuery {
    pub filter: Vec<WhereCondition>,
    pub sort_by: Vec<SortBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One backend compiler.
///
/// `update` and `delete` act on the first matching record; a miss is not an
/// error (`None` / no-op).
#[enum_dispatch]
pub trait Engine {
    /// Backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Create storage for every table. Returns the created names.
    fn migrate(&self, schema: &Schema) -> Result<Vec<String>, AdapterError>;

    fn create(&self, table: &Table, row: Record) -> Result<Record, AdapterError>;

    fn find_one(
        &self,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError>;

    fn find_many(&self, table: &Table, query: &PhysicalQuery) -> Result<Vec<Record>, AdapterError>;

    fn count(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError>;

    fn update(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError>;

    fn update_many(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError>;

    /// Update the first match, or insert `create` when nothing matches.
    fn upsert(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError>;

    fn delete(&self, table: &Table, filter: &[WhereCondition]) -> Result<(), AdapterError>;

    fn delete_many(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError>;
}

/// The backend an adapter is bound to, chosen once at construction.
#[enum_dispatch(Engine)]
pub enum Backend {
    Sql(SqlEngine),
    Orm(OrmEngine),
    Document(DocumentEngine),
    Memory(MemoryEngine),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Backend").field(&self.backend_name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use rstest::rstest;

    #[rstest]
    fn test_memory_backend_dispatch() {
        let backend: Backend = MemoryEngine::new(MemoryStore::new()).into();
        assert_eq!(backend.backend_name(), "memory");
        assert_eq!(backend.capabilities(), Capabilities::NATIVE);
        assert_eq!(format!("{:?}", backend), "Backend(\"memory\")");
    }
}
