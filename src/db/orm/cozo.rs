//! Generated client over CozoDB.
//!
//! One stored relation per table (`id: String => col: Any?, ...`), one
//! [`CozoDelegate`] per model. Clauses compile to a single CozoScript filter
//! expression with `$pN` parameters. Cozo has no conditional write in this
//! shape, so writes query first and then `:put` / `:rm` while holding the
//! client's write lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cozo::{DataValue, DbInstance, NamedRows, Num, ScriptMutability};
use thiserror::Error;

use super::{Clause, DelegateError, FieldFilter, FindManyArgs, GeneratedClient, ModelDelegate};
use crate::db::coercion::Capabilities;
use crate::db::query::SortDirection;
use crate::db::schema::compilers::CozoCompiler;
use crate::db::schema::{Schema, Table, ID_FIELD};
use crate::db::value::{format_date, Record, Value};

pub type Params = BTreeMap<String, DataValue>;

#[derive(Error, Debug)]
pub enum CozoError {
    #[error("Query failed: {message}")]
    QueryFailed { message: String },

    #[error("Duplicate value for unique column '{column}' in '{relation}'")]
    Duplicate { relation: String, column: String },

    #[error("Write lock poisoned")]
    Poisoned,
}

impl From<CozoError> for DelegateError {
    fn from(err: CozoError) -> Self {
        DelegateError::Client(Box::new(err))
    }
}

const CAPABILITIES: Capabilities = Capabilities {
    supports_json: false,
    supports_dates: false,
    supports_booleans: true,
    supports_numeric_ids: false,
    supports_arrays: true,
};

fn run(db: &DbInstance, script: &str, params: Params) -> Result<NamedRows, CozoError> {
    tracing::trace!(script, "cozo script");
    db.run_script(script, params, ScriptMutability::Mutable)
        .map_err(|e| CozoError::QueryFailed {
            message: format!("{:?}", e),
        })
}

/// Try to create a relation, returning Ok(true) if created, Ok(false) if already exists.
fn try_create_relation(db: &DbInstance, script: &str) -> Result<bool, CozoError> {
    match run(db, script, Params::new()) {
        Ok(_) => Ok(true),
        Err(e) => {
            let err_str = e.to_string();
            if err_str.contains("AlreadyExists") || err_str.contains("stored_relation_conflict") {
                Ok(false)
            } else {
                Err(e)
            }
        }
    }
}

pub fn to_data_value(value: &Value) -> DataValue {
    match value {
        Value::Null => DataValue::Null,
        Value::Bool(b) => DataValue::Bool(*b),
        Value::Int(n) => DataValue::Num(Num::Int(*n)),
        Value::Float(f) => DataValue::Num(Num::Float(*f)),
        Value::Text(s) => DataValue::Str(s.as_str().into()),
        Value::Date(d) => DataValue::Str(format_date(d).into()),
        Value::List(items) => DataValue::List(items.iter().map(to_data_value).collect()),
        Value::Json(json) => DataValue::Str(json.to_string().into()),
    }
}

pub fn from_data_value(value: &DataValue) -> Value {
    match value {
        DataValue::Null => Value::Null,
        DataValue::Bool(b) => Value::Bool(*b),
        DataValue::Num(Num::Int(n)) => Value::Int(*n),
        DataValue::Num(Num::Float(f)) => Value::Float(*f),
        DataValue::Str(s) => Value::Text(s.to_string()),
        DataValue::List(items) => Value::List(items.iter().map(from_data_value).collect()),
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Keys are `String`; numeric ids supplied by a caller are stored as text.
fn key_value(value: &Value) -> DataValue {
    match value {
        Value::Int(n) => DataValue::Str(n.to_string().into()),
        other => to_data_value(other),
    }
}

/// Accumulates `$pN` parameters while compiling a script.
#[derive(Default)]
struct ScriptBuilder {
    params: Params,
}

impl ScriptBuilder {
    fn bind(&mut self, value: DataValue) -> String {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), value);
        format!("${}", name)
    }

    fn field(&mut self, column: &str, filter: &FieldFilter) -> String {
        let c = column;
        match filter {
            FieldFilter::Equals(Value::Null) => format!("is_null({c})"),
            FieldFilter::Equals(v) => format!("{c} == {}", self.bind(to_data_value(v))),
            FieldFilter::Not(Value::Null) => format!("negate(is_null({c}))"),
            FieldFilter::Not(v) => format!("{c} != {}", self.bind(to_data_value(v))),
            FieldFilter::Lt(v) => self.comparison(c, "<", v),
            FieldFilter::Lte(v) => self.comparison(c, "<=", v),
            FieldFilter::Gt(v) => self.comparison(c, ">", v),
            FieldFilter::Gte(v) => self.comparison(c, ">=", v),
            FieldFilter::In(items) => self.membership(c, items),
            FieldFilter::NotIn(items) => format!("negate({})", self.membership(c, items)),
            FieldFilter::Contains(s) => self.substring(c, "str_includes", s),
            FieldFilter::StartsWith(s) => self.substring(c, "starts_with", s),
            FieldFilter::EndsWith(s) => self.substring(c, "ends_with", s),
        }
    }

    // `is_in` tells `Int(3)` from `Float(3.0)`; numbers go through `==`,
    // which widens.
    fn membership(&mut self, column: &str, items: &[Value]) -> String {
        let (numbers, others): (Vec<&Value>, Vec<&Value>) = items
            .iter()
            .partition(|item| matches!(item, Value::Int(_) | Value::Float(_)));
        let mut terms = Vec::new();
        if !others.is_empty() {
            let list = DataValue::List(others.into_iter().map(to_data_value).collect());
            terms.push(format!("is_in({column}, {})", self.bind(list)));
        }
        for number in numbers {
            terms.push(format!("{column} == {}", self.bind(to_data_value(number))));
        }
        match terms.len() {
            0 => "false".to_string(),
            1 => terms.remove(0),
            _ => format!("({})", terms.join(" || ")),
        }
    }

    // Cozo rejects ordering across types, so nulls are filtered first.
    fn comparison(&mut self, column: &str, op: &str, value: &Value) -> String {
        if value.is_null() {
            return "false".to_string();
        }
        let p = self.bind(to_data_value(value));
        format!("if(is_null({column}), false, {column} {op} {p})")
    }

    fn substring(&mut self, column: &str, function: &str, needle: &str) -> String {
        let p = self.bind(DataValue::Str(needle.into()));
        format!("if(is_string({column}), {function}({column}, {p}), false)")
    }

    fn clause(&mut self, clause: &Clause) -> Option<String> {
        match clause {
            Clause::Any => None,
            Clause::Field { field, filter } => Some(self.field(field, filter)),
            Clause::And(parts) => self.join(parts, " && "),
            Clause::Or(parts) => self.join(parts, " || "),
        }
    }

    fn join(&mut self, parts: &[Clause], op: &str) -> Option<String> {
        let compiled: Vec<String> = parts.iter().filter_map(|part| self.clause(part)).collect();
        match compiled.len() {
            0 => None,
            1 => compiled.into_iter().next(),
            _ => Some(format!("({})", compiled.join(op))),
        }
    }
}

/// Delegate for one stored relation.
pub struct CozoDelegate {
    db: Arc<DbInstance>,
    table: Table,
    columns: Vec<String>,
    write_lock: Arc<Mutex<()>>,
}

impl CozoDelegate {
    fn new(db: Arc<DbInstance>, table: Table, write_lock: Arc<Mutex<()>>) -> Self {
        let columns = table.columns();
        Self {
            db,
            table,
            columns,
            write_lock,
        }
    }

    fn relation(&self) -> &str {
        &self.table.model_name
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, CozoError> {
        self.write_lock.lock().map_err(|_| CozoError::Poisoned)
    }

    fn body(&self) -> String {
        format!("*{}{{{}}}", self.relation(), self.columns.join(", "))
    }

    /// Compile a read of whole rows.
    fn select(&self, args: &FindManyArgs) -> (String, Params) {
        let mut builder = ScriptBuilder::default();
        let mut head = self.columns.clone();
        let mut body = vec![self.body()];
        if let Some(filter) = builder.clause(&args.filter) {
            body.push(filter);
        }

        let mut order = Vec::new();
        for (i, sort) in args.order_by.iter().enumerate() {
            let var = format!("s__{}", i);
            body.push(format!(
                "{var} = if(is_string({c}), lowercase({c}), {c})",
                c = sort.field
            ));
            head.push(var.clone());
            order.push(match sort.direction {
                SortDirection::Asc => var,
                SortDirection::Desc => format!("-{}", var),
            });
        }

        let mut script = format!("?[{}] := {}", head.join(", "), body.join(", "));
        if !order.is_empty() {
            script.push_str(&format!("\n:order {}", order.join(", ")));
        }
        if let Some(limit) = args.take {
            script.push_str(&format!("\n:limit {}", limit));
        }
        if let Some(offset) = args.skip {
            script.push_str(&format!("\n:offset {}", offset));
        }
        (script, builder.params)
    }

    fn rows(&self, args: &FindManyArgs) -> Result<Vec<Record>, CozoError> {
        let (script, params) = self.select(args);
        let result = run(&self.db, &script, params)?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), from_data_value(value)))
                    .collect()
            })
            .collect())
    }

    fn matching(&self, filter: &Clause, take: Option<usize>) -> Result<Vec<Record>, CozoError> {
        self.rows(&FindManyArgs {
            filter: filter.clone(),
            order_by: Vec::new(),
            take,
            skip: None,
        })
    }

    /// Fail if another row already holds a unique value of `row`.
    fn check_unique(&self, row: &Record) -> Result<(), CozoError> {
        let own_id = row.get(ID_FIELD).cloned().unwrap_or(Value::Null);
        for (column, value) in row {
            if value.is_null() || !self.table.is_unique_column(column) {
                continue;
            }
            let clause = Clause::And(vec![
                Clause::Field {
                    field: column.clone(),
                    filter: FieldFilter::Equals(value.clone()),
                },
                Clause::Field {
                    field: ID_FIELD.to_string(),
                    filter: FieldFilter::Not(own_id.clone()),
                },
            ]);
            if !self.matching(&clause, Some(1))?.is_empty() {
                return Err(CozoError::Duplicate {
                    relation: self.relation().to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// `:put` full rows; missing columns are written as null.
    fn put(&self, rows: &[Record]) -> Result<(), CozoError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = ScriptBuilder::default();
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = self
                    .columns
                    .iter()
                    .map(|column| {
                        let value = row.get(column).unwrap_or(&Value::Null);
                        if column == ID_FIELD {
                            builder.bind(key_value(value))
                        } else {
                            builder.bind(to_data_value(value))
                        }
                    })
                    .collect();
                format!("[{}]", cells.join(", "))
            })
            .collect();

        let values = &self.columns[1..];
        let spec = if values.is_empty() {
            ID_FIELD.to_string()
        } else {
            format!("{} => {}", ID_FIELD, values.join(", "))
        };
        let script = format!(
            "?[{}] <- [{}]\n:put {} {{{}}}",
            self.columns.join(", "),
            tuples.join(", "),
            self.relation(),
            spec
        );
        run(&self.db, &script, builder.params)?;
        Ok(())
    }

    fn remove(&self, rows: &[Record]) -> Result<(), CozoError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut builder = ScriptBuilder::default();
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let id = row.get(ID_FIELD).unwrap_or(&Value::Null);
                format!("[{}]", builder.bind(key_value(id)))
            })
            .collect();
        let script = format!(
            "?[{id}] <- [{}]\n:rm {} {{{id}}}",
            tuples.join(", "),
            self.relation(),
            id = ID_FIELD
        );
        run(&self.db, &script, builder.params)?;
        Ok(())
    }

    fn merge(&self, rows: Vec<Record>, data: &Record) -> Result<Vec<Record>, CozoError> {
        let merged: Vec<Record> = rows
            .into_iter()
            .map(|mut row| {
                row.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                row
            })
            .collect();
        for row in &merged {
            self.check_unique(row)?;
        }
        self.put(&merged)?;
        Ok(merged)
    }
}

impl ModelDelegate for CozoDelegate {
    fn create(&self, data: Record) -> Result<Record, DelegateError> {
        let _guard = self.lock()?;
        if let Some(id) = data.get(ID_FIELD) {
            let existing = Clause::Field {
                field: ID_FIELD.to_string(),
                filter: FieldFilter::Equals(from_data_value(&key_value(id))),
            };
            if !self.matching(&existing, Some(1))?.is_empty() {
                return Err(CozoError::Duplicate {
                    relation: self.relation().to_string(),
                    column: ID_FIELD.to_string(),
                }
                .into());
            }
        }
        self.check_unique(&data)?;

        let row: Record = self
            .columns
            .iter()
            .map(|column| (column.clone(), data.get(column).cloned().unwrap_or(Value::Null)))
            .collect();
        self.put(std::slice::from_ref(&row))?;
        Ok(row)
    }

    fn find_first(&self, filter: &Clause) -> Result<Option<Record>, DelegateError> {
        Ok(self.matching(filter, Some(1))?.into_iter().next())
    }

    fn find_many(&self, args: &FindManyArgs) -> Result<Vec<Record>, DelegateError> {
        Ok(self.rows(args)?)
    }

    fn count(&self, filter: &Clause) -> Result<u64, DelegateError> {
        Ok(self.matching(filter, None)?.len() as u64)
    }

    fn update(&self, filter: &Clause, data: Record) -> Result<Record, DelegateError> {
        let _guard = self.lock()?;
        let first = self.matching(filter, Some(1))?;
        if first.is_empty() {
            return Err(DelegateError::RecordNotFound);
        }
        self.merge(first, &data)?
            .into_iter()
            .next()
            .ok_or(DelegateError::RecordNotFound)
    }

    fn update_many(&self, filter: &Clause, data: Record) -> Result<u64, DelegateError> {
        let _guard = self.lock()?;
        let rows = self.matching(filter, None)?;
        Ok(self.merge(rows, &data)?.len() as u64)
    }

    fn delete(&self, filter: &Clause) -> Result<Record, DelegateError> {
        let _guard = self.lock()?;
        let row = self
            .matching(filter, Some(1))?
            .into_iter()
            .next()
            .ok_or(DelegateError::RecordNotFound)?;
        self.remove(std::slice::from_ref(&row))?;
        Ok(row)
    }

    fn delete_many(&self, filter: &Clause) -> Result<u64, DelegateError> {
        let _guard = self.lock()?;
        let rows = self.matching(filter, None)?;
        self.remove(&rows)?;
        Ok(rows.len() as u64)
    }
}

/// Client generated from a schema: one delegate per table.
pub struct CozoClient {
    db: Arc<DbInstance>,
    delegates: BTreeMap<String, CozoDelegate>,
}

impl CozoClient {
    pub fn new(db: Arc<DbInstance>, schema: &Schema) -> Self {
        let write_lock = Arc::new(Mutex::new(()));
        let delegates = schema
            .ordered_tables()
            .into_iter()
            .map(|(_, table)| {
                (
                    table.model_name.clone(),
                    CozoDelegate::new(db.clone(), table.clone(), write_lock.clone()),
                )
            })
            .collect();
        Self { db, delegates }
    }

    /// Open an in-memory Cozo database.
    pub fn open_mem() -> Result<DbInstance, CozoError> {
        DbInstance::new("mem", "", "").map_err(|e| CozoError::QueryFailed {
            message: format!("{:?}", e),
        })
    }

    /// Open a Cozo database backed by SQLite storage.
    pub fn open_sqlite(path: &std::path::Path) -> Result<DbInstance, CozoError> {
        DbInstance::new("sqlite", path, "").map_err(|e| CozoError::QueryFailed {
            message: format!("Failed to open database '{}': {:?}", path.display(), e),
        })
    }
}

impl GeneratedClient for CozoClient {
    fn client_name(&self) -> &'static str {
        "cozo"
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn delegate(&self, model: &str) -> Option<&dyn ModelDelegate> {
        self.delegates
            .get(model)
            .map(|delegate| delegate as &dyn ModelDelegate)
    }

    fn generate(&self, schema: &Schema) -> Result<Vec<String>, DelegateError> {
        let mut created = Vec::new();
        for (_, table) in schema.ordered_tables() {
            let script = CozoCompiler::compile_relation(table);
            if try_create_relation(&self.db, &script)? {
                created.push(table.model_name.clone());
            }
        }
        Ok(created)
    }
}
