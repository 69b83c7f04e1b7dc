//! PostgreSQL handle over the `postgres` crate.
//!
//! Parameters are converted against the types the server infers for each
//! placeholder, so one `Value` binds correctly whether the column is
//! `DOUBLE PRECISION`, `BIGINT`, `TIMESTAMPTZ`, `JSONB` or `TEXT`.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Row};

use super::{Dialect, SqlConnection};
use crate::db::value::{format_date, parse_date, Record, Value};
use crate::db::AdapterError;

/// A NULL accepted for any parameter type.
#[derive(Debug)]
struct PgNull;

impl ToSql for PgNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

type Param = Box<dyn ToSql + Sync>;

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn is_json(ty: &Type) -> bool {
    *ty == Type::JSON || *ty == Type::JSONB
}

/// Convert one value for a parameter of type `ty`.
fn to_param(value: &Value, ty: &Type) -> Param {
    match value {
        Value::Null => Box::new(PgNull),
        Value::Bool(b) => Box::new(*b),
        Value::Int(n) => int_param(*n, ty),
        Value::Float(f) => {
            if *ty == Type::FLOAT4 {
                Box::new(*f as f32)
            } else if (*ty == Type::INT8 || *ty == Type::INT4) && f.fract() == 0.0 {
                int_param(*f as i64, ty)
            } else {
                Box::new(*f)
            }
        }
        Value::Text(s) => {
            if *ty == Type::TIMESTAMPTZ {
                if let Some(date) = parse_date(s) {
                    return Box::new(date);
                }
            }
            if is_json(ty) {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(s) {
                    return Box::new(json);
                }
            }
            Box::new(s.clone())
        }
        Value::Date(d) => {
            if *ty == Type::TIMESTAMPTZ {
                Box::new(*d)
            } else if *ty == Type::TIMESTAMP {
                Box::new(d.naive_utc())
            } else {
                Box::new(format_date(d))
            }
        }
        Value::List(_) | Value::Json(_) => {
            if is_json(ty) {
                Box::new(value.to_json())
            } else {
                Box::new(value.to_json().to_string())
            }
        }
    }
}

fn int_param(n: i64, ty: &Type) -> Param {
    if *ty == Type::INT8 {
        Box::new(n)
    } else if *ty == Type::INT4 {
        Box::new(n as i32)
    } else if *ty == Type::INT2 {
        Box::new(n as i16)
    } else if is_text(ty) {
        Box::new(n.to_string())
    } else {
        // number columns are DOUBLE PRECISION
        Box::new(n as f64)
    }
}

fn get<'a, T>(row: &'a Row, index: usize) -> Result<Option<T>, AdapterError>
where
    T: postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(index).map_err(AdapterError::backend)
}

fn read_column(row: &Row, index: usize) -> Result<Value, AdapterError> {
    let ty = row.columns()[index].type_();
    let value = if *ty == Type::BOOL {
        get::<bool>(row, index)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, index)?.map(|n| Value::Int(n as i64))
    } else if *ty == Type::INT4 {
        get::<i32>(row, index)?.map(|n| Value::Int(n as i64))
    } else if *ty == Type::INT8 {
        get::<i64>(row, index)?.map(Value::Int)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, index)?.map(|f| Value::Float(f as f64))
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, index)?.map(Value::Float)
    } else if is_text(ty) {
        get::<String>(row, index)?.map(Value::Text)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, index)?.map(Value::Date)
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, index)?.map(|d| Value::Date(d.and_utc()))
    } else if is_json(ty) {
        get::<serde_json::Value>(row, index)?.map(Value::Json)
    } else {
        return Err(AdapterError::decode(format!(
            "unsupported column type '{}' for column '{}'",
            ty,
            row.columns()[index].name()
        )));
    };
    Ok(value.unwrap_or(Value::Null))
}

pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect with a libpq-style connection string or `postgres://` URL.
    pub fn connect(connection_string: &str) -> Result<Self, AdapterError> {
        let client = Client::connect(connection_string, NoTls).map_err(AdapterError::backend)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn params(
        &mut self,
        sql: &str,
        values: &[Value],
    ) -> Result<(postgres::Statement, Vec<Param>), AdapterError> {
        let statement = self.client.prepare(sql).map_err(AdapterError::backend)?;
        let params = values
            .iter()
            .zip(statement.params())
            .map(|(value, ty)| to_param(value, ty))
            .collect();
        Ok((statement, params))
    }
}

impl SqlConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&mut self, sql: &str, values: &[Value]) -> Result<Vec<Record>, AdapterError> {
        let (statement, params) = self.params(sql, values)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let rows = self
            .client
            .query(&statement, &refs)
            .map_err(AdapterError::backend)?;

        rows.iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(i, column)| Ok((column.name().to_string(), read_column(row, i)?)))
                    .collect::<Result<Record, AdapterError>>()
            })
            .collect()
    }

    fn execute(&mut self, sql: &str, values: &[Value]) -> Result<u64, AdapterError> {
        let (statement, params) = self.params(sql, values)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        self.client
            .execute(&statement, &refs)
            .map_err(AdapterError::backend)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), AdapterError> {
        self.client.batch_execute(sql).map_err(AdapterError::backend)
    }
}
