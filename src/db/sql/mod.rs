//! Relational backend.
//!
//! [`SqlEngine`] compiles every operation through [`SqlBuilder`] and runs it
//! on a [`SqlConnection`] handle. Shipped handles: SQLite (`sqlite` crate)
//! and PostgreSQL (`postgres` crate). MySQL and SQL Server are supported at
//! the dialect level for any caller-provided handle.

mod builder;
mod dialect;
pub mod postgres;
pub mod sqlite;

pub use builder::{ExprBuilder, SqlBuilder, SqlExpr, Statement};
pub use dialect::Dialect;

use std::sync::{Mutex, MutexGuard};

use super::backend::{Engine, PhysicalQuery};
use super::coercion::Capabilities;
use super::query::{Operator, WhereCondition};
use super::schema::compilers::SqlCompiler;
use super::schema::{Schema, Table, ID_FIELD};
use super::value::{Record, Value};
use super::AdapterError;

/// A live SQL connection. Rows come back keyed by column name.
pub trait SqlConnection: Send {
    fn dialect(&self) -> Dialect;

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, AdapterError>;

    /// Run a statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, AdapterError>;

    /// Run parameterless DDL.
    fn execute_batch(&mut self, sql: &str) -> Result<(), AdapterError> {
        self.execute(sql, &[]).map(|_| ())
    }
}

/// Engine over one SQL connection, used serially.
pub struct SqlEngine {
    connection: Mutex<Box<dyn SqlConnection>>,
    builder: SqlBuilder,
    numeric_ids: bool,
    debug_logs: bool,
}

impl SqlEngine {
    pub fn new(connection: impl SqlConnection + 'static) -> Self {
        let builder = SqlBuilder::new(connection.dialect());
        Self {
            connection: Mutex::new(Box::new(connection)),
            builder,
            numeric_ids: false,
            debug_logs: false,
        }
    }

    /// Let the database generate integer keys (`generate_id: false`).
    pub fn with_numeric_ids(mut self, numeric_ids: bool) -> Self {
        self.numeric_ids = numeric_ids;
        self
    }

    pub fn with_debug_logs(mut self, debug_logs: bool) -> Self {
        self.debug_logs = debug_logs;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.builder.dialect()
    }

    fn lock(&self, table: &Table) -> Result<MutexGuard<'_, Box<dyn SqlConnection>>, AdapterError> {
        self.connection
            .lock()
            .map_err(|_| AdapterError::BackendUnavailable {
                model: table.model_name.clone(),
                reason: "connection lock poisoned".to_string(),
            })
    }

    fn log(&self, statement: &Statement) {
        if self.debug_logs {
            tracing::debug!(
                dialect = self.dialect().name(),
                sql = %statement.sql,
                params = statement.params.len(),
                "sql statement"
            );
        }
    }

    fn query(
        &self,
        conn: &mut dyn SqlConnection,
        statement: &Statement,
    ) -> Result<Vec<Record>, AdapterError> {
        self.log(statement);
        conn.query(&statement.sql, &statement.params)
    }

    fn execute(&self, conn: &mut dyn SqlConnection, statement: &Statement) -> Result<u64, AdapterError> {
        self.log(statement);
        conn.execute(&statement.sql, &statement.params)
    }

    fn first_row(rows: Vec<Record>, what: &str) -> Result<Record, AdapterError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| AdapterError::decode(format!("{} returned no row", what)))
    }

    fn select_one(
        &self,
        conn: &mut dyn SqlConnection,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError> {
        let statement = self.builder.select(table, filter, &[], Some(1), None);
        Ok(self.query(conn, &statement)?.into_iter().next())
    }

    fn first_id(
        &self,
        conn: &mut dyn SqlConnection,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Value>, AdapterError> {
        let statement = self.builder.select_first_id(table, filter);
        Ok(self
            .query(conn, &statement)?
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(ID_FIELD)))
    }

    fn insert(
        &self,
        conn: &mut dyn SqlConnection,
        table: &Table,
        row: Record,
    ) -> Result<Record, AdapterError> {
        let statement = self.builder.insert(table, &row);
        if self.dialect().supports_returning() {
            return Self::first_row(self.query(conn, &statement)?, "insert");
        }
        self.execute(conn, &statement)?;
        let reselect = match row.get(ID_FIELD) {
            Some(id) => self
                .builder
                .select(table, &[WhereCondition::eq(ID_FIELD, id.clone())], &[], Some(1), None),
            None => self.builder.select_last_inserted(table),
        };
        Self::first_row(self.query(conn, &reselect)?, "insert re-select")
    }

    fn update_by_id(
        &self,
        conn: &mut dyn SqlConnection,
        table: &Table,
        id: Value,
        update: &Record,
    ) -> Result<Option<Record>, AdapterError> {
        let by_id = [WhereCondition::eq(ID_FIELD, id)];
        if update.is_empty() {
            return self.select_one(conn, table, &by_id);
        }
        let statement = self.builder.update(table, update, &by_id);
        if self.dialect().supports_returning() {
            return Ok(self.query(conn, &statement)?.into_iter().next());
        }
        self.execute(conn, &statement)?;
        self.select_one(conn, table, &by_id)
    }

    /// Column a native upsert can key on: a single equality on the key or a
    /// unique column, present in the create payload.
    fn conflict_column<'a>(
        table: &Table,
        filter: &'a [WhereCondition],
        create: &Record,
    ) -> Option<&'a str> {
        match filter {
            [condition]
                if condition.operator == Operator::Eq
                    && !condition.value.is_null()
                    && table.is_unique_column(&condition.field)
                    && create.contains_key(&condition.field) =>
            {
                Some(condition.field.as_str())
            }
            _ => None,
        }
    }
}

impl Engine for SqlEngine {
    fn backend_name(&self) -> &'static str {
        self.dialect().name()
    }

    fn capabilities(&self) -> Capabilities {
        self.dialect().capabilities()
    }

    fn migrate(&self, schema: &Schema) -> Result<Vec<String>, AdapterError> {
        let Some((_, first)) = schema.ordered_tables().into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut conn = self.lock(first)?;
        for ddl in SqlCompiler::compile_all(schema, self.dialect(), self.numeric_ids) {
            if self.debug_logs {
                tracing::debug!(sql = %ddl, "ddl");
            }
            conn.execute_batch(&ddl)?;
        }
        Ok(schema
            .ordered_tables()
            .into_iter()
            .map(|(_, table)| table.model_name.clone())
            .collect())
    }

    fn create(&self, table: &Table, row: Record) -> Result<Record, AdapterError> {
        let mut conn = self.lock(table)?;
        self.insert(conn.as_mut(), table, row)
    }

    fn find_one(
        &self,
        table: &Table,
        filter: &[WhereCondition],
    ) -> Result<Option<Record>, AdapterError> {
        let mut conn = self.lock(table)?;
        self.select_one(conn.as_mut(), table, filter)
    }

    fn find_many(&self, table: &Table, query: &PhysicalQuery) -> Result<Vec<Record>, AdapterError> {
        let statement = self.builder.select(
            table,
            &query.filter,
            &query.sort_by,
            query.limit,
            query.offset,
        );
        let mut conn = self.lock(table)?;
        self.query(conn.as_mut(), &statement)
    }

    fn count(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let statement = self.builder.count(table, filter);
        let mut conn = self.lock(table)?;
        let row = Self::first_row(self.query(conn.as_mut(), &statement)?, "count")?;
        row.get("count")
            .and_then(Value::as_i64)
            .map(|n| n as u64)
            .ok_or_else(|| AdapterError::decode("count column missing or not numeric"))
    }

    fn update(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<Option<Record>, AdapterError> {
        let mut conn = self.lock(table)?;
        match self.first_id(conn.as_mut(), table, filter)? {
            Some(id) => self.update_by_id(conn.as_mut(), table, id, &update),
            None => Ok(None),
        }
    }

    fn update_many(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        update: Record,
    ) -> Result<u64, AdapterError> {
        let mut conn = self.lock(table)?;
        if update.is_empty() {
            drop(conn);
            return self.count(table, filter);
        }
        let mut statement = self.builder.update(table, &update, filter);
        if self.dialect().supports_returning() {
            statement.sql = statement.sql.trim_end_matches(" RETURNING *").to_string();
        }
        self.execute(conn.as_mut(), &statement)
    }

    fn upsert(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        create: Record,
        update: Record,
    ) -> Result<Record, AdapterError> {
        let mut conn = self.lock(table)?;

        if let Some(column) = Self::conflict_column(table, filter, &create) {
            if let Some(statement) = self.builder.upsert(table, column, &create, &update) {
                if self.dialect().supports_returning() {
                    return Self::first_row(self.query(conn.as_mut(), &statement)?, "upsert");
                }
                self.execute(conn.as_mut(), &statement)?;
                return self
                    .select_one(conn.as_mut(), table, filter)?
                    .ok_or_else(|| AdapterError::decode("upsert re-select returned no row"));
            }
        }

        tracing::debug!(
            table = %table.model_name,
            "no native upsert for this filter, using update then insert"
        );
        if let Some(id) = self.first_id(conn.as_mut(), table, filter)? {
            if let Some(updated) = self.update_by_id(conn.as_mut(), table, id, &update)? {
                return Ok(updated);
            }
        }
        self.insert(conn.as_mut(), table, create)
    }

    fn delete(&self, table: &Table, filter: &[WhereCondition]) -> Result<(), AdapterError> {
        let mut conn = self.lock(table)?;
        if let Some(id) = self.first_id(conn.as_mut(), table, filter)? {
            let statement = self
                .builder
                .delete(table, &[WhereCondition::eq(ID_FIELD, id)]);
            self.execute(conn.as_mut(), &statement)?;
        }
        Ok(())
    }

    fn delete_many(&self, table: &Table, filter: &[WhereCondition]) -> Result<u64, AdapterError> {
        let statement = self.builder.delete(table, filter);
        let mut conn = self.lock(table)?;
        self.execute(conn.as_mut(), &statement)
    }
}
