//! Generated-client backend.
//!
//! A [`GeneratedClient`] exposes one [`ModelDelegate`] per model, looked up by
//! physical model name at call time. [`OrmEngine`] compiles where-clauses to
//! nested [`Clause`] objects and maps delegate outcomes onto the adapter
//! contract: a missing delegate is `BackendUnavailable`, a missing record is
//! soft.

mod clause;
pub mod cozo;

pub use clause::{Clause, FieldFilter};
pub use cozo::CozoClient;

use std::error::Error;

use thiserror::Error;

use super::backend::{Engine, PhysicalQuery};
use super::coercion::Capabilities;
use super::query::{SortBy, WhereCondition};
use super::schema::{Schema, Table};
use super::value::Record;
use super::AdapterError;

/// Delegate failures.
#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("Record not found")]
    RecordNotFound,

    #[error("Operation '{0}' not supported by this client")]
    Unsupported(&'static str),

    #[error(transparent)]
    Client(Box<dyn Error + Send + Sync>),
}

impl From<DelegateError> for AdapterError {
    fn from(err: DelegateError) -> Self {
        match err {
            DelegateError::Client(inner) => AdapterError::Backend(inner),
            other => AdapterError::Backend(Box::new(other)),
        }
    }
}

/// `findMany` arguments in client terms.
#[derive(Debug, Clone)]
pub struct FindManyArgs {
    pub filter: Clause,
    pub order_by: Vec<SortBy>,
    pub take: Option<usize>,
    pub skip: Option<usize>,
}

/// Per-model operations of a generated client.
pub trait ModelDelegate: Send + Sync {
    fn create(&self, data: Record) -> Result<Record, DelegateError>;

    fn find_first(&self, filter: &Clause) -> Result<Option<Record>, DelegateError>;

    fn find_many(&self, args: &FindManyArgs) -> Result<Vec<Record>, DelegateError>;

    fn count(&self, filter: &Clause) -> Result<u64, DelegateError>;

    /// Update the first match; `RecordNotFound` when nothing matches.
    fn update(&self, filter: &Clause, data: Record) -> Result<Record, DelegateError>;

    fn update_many(&self, filter: &Clause, data: Record) -> Result<u64, DelegateError>;

    fn upsert(
        &self,
        _filter: &Clause,
        _create: Record,
        _update: Record,
    ) -> Result<Record, DelegateError> {
        Err(DelegateError::Unsupported("upsert"))
    }

    /// Delete the first match; `RecordNotFound` when nothing matches.
    fn delete(&self, filter: &Clause) -> Result<Record, DelegateError>;

    fn delete_many(&self, filter: &Clause) -> Result<u64, DelegateError>;
}

/// A client generated for a schema.
pub trait GeneratedClient: Send + Sync {
    fn client_name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn delegate(&self, model: &str) -> Option<&dyn ModelDelegate>;

    /// Create storage for models the client has no delegate for yet.
    fn generate(&self, schema: &Schema) -> Result<Vec<String>, DelegateError>;
}

pub struct OrmEngine {
    client: Box<dyn GeneratedClient>,
    debug_logs: bool,
}

impl OrmEngine {
    pub fn new(client: impl GeneratedClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            debug_logs: false,
        }
    }

    pub fn with_debug_logs(mut self, debug_logs: bool) -> Self {
        self.debug_logs = debug_logs;
        self
    }

    fn delegate(&self, table: &Table) -> Result<&dyn ModelDelegate, AdapterError> {
        self.client
            .delegate(&table.model_name)
            .ok_or_else(|| AdapterError::BackendUnavailable {
                model: table.model_name.clone(),
                reason: format!("{} has no delegate for this model", self.client.client_name()),
            })
    }

    fn compile(&self, table: &Table, operation: &str, filter: &[WhereCondition]) -> Clause {
        let clause = Clause::compile(filter);
        if self.debug_logs {
            tracing::debug!(
                model = %table.model_name,
                operation,
                filter = %clause.to_json(),
                "orm delegate call"
            );
        }
        clause
    }
}

impl Engine for OrmEngine {
    fn backend_name(&self) -> &'static str {
        self.client.client_name()
    }

    fn capabilities(&self) -> Capabilities {
        self.client.capabilities()
    }

    fn migrate(&self, schema: &Schema) -> Result<Vec<String>, AdapterError> {
        Ok(self.client.generate(schema)?)
    }

    fn create(&self, table: &Table, row: Record) -> Result<Record, AdapterError> {
        Ok(self.delegate(table)?.create(row)?)
    }

    fn find_one(
        &self,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError> {
        let delegate = self.delegate(table)?;
        Ok(delegate.find_first(&self.compile(table, "findFirst", filter))?)
    }

    fn find_many(&self, table: &Table, query: &PhysicalQuery) -> Result<Vec<Record>, AdapterError> {
        let delegate = self.delegate(table)?;
        let args = FindManyArgs {
            filter: self.compile(table, "findMany", &query.filter),
            order_by: query.sort_by.clone(),
            take: query.limit,
            skip: query.offset,
        };
        Ok(delegate.find_many(&args)?)
    }

    fn count(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let delegate = self.delegate(table)?;
        Ok(delegate.count(&self.compile(table, "count", filter))?)
    }

    fn update(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError> {
        let delegate = self.delegate(table)?;
        match delegate.update(&self.compile(table, "update", filter), update) {
            Ok(record) => Ok(Some(record)),
            Err(DelegateError::RecordNotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn update_many(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError> {
        let delegate = self.delegate(table)?;
        Ok(delegate.update_many(&self.compile(table, "updateMany", filter), update)?)
    }

    fn upsert(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError> {
        let delegate = self.delegate(table)?;
        let clause = self.compile(table, "upsert", filter);
        match delegate.upsert(&clause, create.clone(), update.clone()) {
            Err(DelegateError::Unsupported(_)) => {}
            other => return Ok(other?),
        }
        tracing::debug!(
            model = %table.model_name,
            "delegate has no native upsert, using update then create"
        );
        match delegate.update(&clause, update) {
            Ok(record) => Ok(record),
            Err(DelegateError::RecordNotFound) => Ok(delegate.create(create)?),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, table: &Table, filter: &[WhereCondition]) -> Result<(), AdapterError> {
        let delegate = self.delegate(table)?;
        match delegate.delete(&self.compile(table, "delete", filter)) {
            Ok(_) | Err(DelegateError::RecordNotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_many(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let delegate = self.delegate(table)?;
        Ok(delegate.delete_many(&self.compile(table, "deleteMany", filter))?)
    }
}
