//! SQLite handle over the `sqlite` crate.

use std::path::Path;

use sqlite::State;

use super::{Dialect, SqlConnection};
use crate::db::value::{format_date, Record, Value};
use crate::db::AdapterError;

pub struct SqliteConnection {
    connection: sqlite::Connection,
}

impl SqliteConnection {
    /// Open or create a database file.
    pub fn open(path: &Path) -> Result<Self, AdapterError> {
        let connection = sqlite::open(path).map_err(AdapterError::backend)?;
        Self::init(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, AdapterError> {
        let connection = sqlite::open(":memory:").map_err(AdapterError::backend)?;
        Self::init(connection)
    }

    fn init(connection: sqlite::Connection) -> Result<Self, AdapterError> {
        connection
            .execute("PRAGMA foreign_keys = ON;")
            .map_err(AdapterError::backend)?;
        Ok(Self { connection })
    }

    fn prepare(&self, sql: &str, params: &[Value]) -> Result<sqlite::Statement<'_>, AdapterError> {
        let mut statement = self.connection.prepare(sql).map_err(AdapterError::backend)?;
        for (i, value) in params.iter().enumerate() {
            let index = i + 1;
            match value {
                Value::Null => statement.bind((index, ())),
                Value::Bool(b) => statement.bind((index, *b as i64)),
                Value::Int(n) => statement.bind((index, *n)),
                Value::Float(f) => statement.bind((index, *f)),
                Value::Text(s) => statement.bind((index, s.as_str())),
                Value::Date(d) => statement.bind((index, format_date(d).as_str())),
                Value::List(_) | Value::Json(_) => {
                    statement.bind((index, value.to_json().to_string().as_str()))
                }
            }
            .map_err(AdapterError::backend)?;
        }
        Ok(statement)
    }
}

fn from_sqlite(value: sqlite::Value) -> Value {
    match value {
        sqlite::Value::Null => Value::Null,
        sqlite::Value::Integer(n) => Value::Int(n),
        sqlite::Value::Float(f) => Value::Float(f),
        sqlite::Value::String(s) => Value::Text(s),
        sqlite::Value::Binary(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, AdapterError> {
        let mut statement = self.prepare(sql, params)?;
        let names = statement.column_names().to_vec();
        let mut rows = Vec::new();
        while let State::Row = statement.next().map_err(AdapterError::backend)? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                let value = statement
                    .read::<sqlite::Value, _>(i)
                    .map_err(AdapterError::backend)?;
                record.insert(name.clone(), from_sqlite(value));
            }
            rows.push(record);
        }
        Ok(rows)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, AdapterError> {
        let mut statement = self.prepare(sql, params)?;
        while let State::Row = statement.next().map_err(AdapterError::backend)? {}
        drop(statement);
        Ok(self.connection.change_count() as u64)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), AdapterError> {
        self.connection.execute(sql).map_err(AdapterError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_round_trip_values() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY, n REAL, b INTEGER, note TEXT)")
            .unwrap();
        let inserted = conn
            .execute(
                "INSERT INTO t (id, n, b, note) VALUES (?, ?, ?, ?)",
                &[Value::from("a"), Value::Float(2.0), Value::Bool(true), Value::Null],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = conn.query("SELECT * FROM t WHERE id = ?", &[Value::from("a")]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], Value::Float(2.0));
        assert_eq!(rows[0]["b"], Value::Int(1));
        assert_eq!(rows[0]["note"], Value::Null);
    }

    #[rstest]
    fn test_glob_is_case_sensitive() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (title TEXT)").unwrap();
        conn.execute("INSERT INTO t (title) VALUES (?)", &[Value::from("Room")]).unwrap();
        let lower = conn.query("SELECT * FROM t WHERE title GLOB ?", &[Value::from("*room*")]).unwrap();
        let exact = conn.query("SELECT * FROM t WHERE title GLOB ?", &[Value::from("*Room*")]).unwrap();
        assert!(lower.is_empty());
        assert_eq!(exact.len(), 1);
    }

    #[rstest]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapter.sqlite");
        {
            let mut conn = SqliteConnection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (id TEXT)").unwrap();
            conn.execute("INSERT INTO t (id) VALUES (?)", &[Value::from("x")]).unwrap();
        }
        let mut reopened = SqliteConnection::open(&path).unwrap();
        assert_eq!(reopened.query("SELECT id FROM t", &[]).unwrap().len(), 1);
    }
}
