//! SQL DDL compiler.
//!
//! Generates `CREATE TABLE` and `CREATE INDEX` statements for a dialect from
//! the schema. Tables are emitted in dependency order so foreign keys always
//! point at an existing table.

use crate::db::schema::definition::{Schema, Table};
use crate::db::sql::Dialect;

/// Compiler for generating SQL DDL from schema definitions.
pub struct SqlCompiler;

impl SqlCompiler {
    /// Generate `CREATE TABLE` for a single table.
    ///
    /// `numeric_ids` switches the key to a backend-generated integer.
    pub fn compile_table(table: &Table, dialect: Dialect, numeric_ids: bool) -> String {
        let mut columns = vec![format!(
            "    {} {}",
            dialect.quote("id"),
            dialect.id_type(numeric_ids)
        )];

        for (name, attr) in &table.fields {
            let column = attr.field_name.as_deref().unwrap_or(name);
            let keyed = attr.unique || attr.index || attr.references.is_some();
            let mut def = format!(
                "    {} {}",
                dialect.quote(column),
                dialect.column_type(attr.field_type, keyed)
            );
            if attr.required {
                def.push_str(" NOT NULL");
            }
            if attr.unique {
                def.push_str(" UNIQUE");
            }
            columns.push(def);
        }

        for (name, attr) in &table.fields {
            let Some(reference) = &attr.references else {
                continue;
            };
            let column = attr.field_name.as_deref().unwrap_or(name);
            columns.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                dialect.quote(column),
                dialect.quote(&reference.model),
                dialect.quote(&reference.field),
                reference.on_delete.as_sql()
            ));
        }

        format!(
            "{} (\n{}\n)",
            dialect.create_table(&dialect.quote(&table.model_name), &table.model_name),
            columns.join(",\n")
        )
    }

    /// Generate `CREATE INDEX` statements for `index: true` fields and the
    /// table's index definitions.
    pub fn compile_indexes(table: &Table, dialect: Dialect) -> Vec<String> {
        let mut statements = Vec::new();

        for (name, attr) in &table.fields {
            if !attr.index || attr.unique {
                continue;
            }
            let column = attr.field_name.as_deref().unwrap_or(name);
            statements.push(format!(
                "{} ON {} ({})",
                dialect.create_index(false, &format!("{}_{}_idx", table.model_name, column)),
                dialect.quote(&table.model_name),
                dialect.quote(column)
            ));
        }

        for index in &table.indexes {
            let columns = index
                .fields
                .iter()
                .map(|field| {
                    let column = table
                        .field(field)
                        .and_then(|attr| attr.field_name.as_deref())
                        .unwrap_or(field);
                    dialect.quote(column)
                })
                .collect::<Vec<_>>()
                .join(", ");
            statements.push(format!(
                "{} ON {} ({})",
                dialect.create_index(index.unique, &index.name),
                dialect.quote(&table.model_name),
                columns
            ));
        }

        statements
    }

    /// Generate DDL for the whole schema: every table, then every index.
    pub fn compile_all(schema: &Schema, dialect: Dialect, numeric_ids: bool) -> Vec<String> {
        let ordered = schema.ordered_tables();
        let tables = ordered
            .iter()
            .map(|(_, table)| Self::compile_table(table, dialect, numeric_ids));
        let indexes = ordered
            .iter()
            .flat_map(|(_, table)| Self::compile_indexes(table, dialect));
        tables.chain(indexes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{builtin_tables, SchemaOptions, SchemaRegistry};
    use rstest::rstest;

    #[rstest]
    fn test_compile_thread_sqlite() {
        let thread = &builtin_tables()["thread"];
        let ddl = SqlCompiler::compile_table(thread, Dialect::Sqlite, false);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"thread\" ("));
        assert!(ddl.contains("\"id\" TEXT PRIMARY KEY"));
        assert!(ddl.contains("\"title\" TEXT NOT NULL"));
        assert!(ddl.contains("\"pinned\" INTEGER NOT NULL"));
        assert!(ddl.contains("\"message_count\" REAL"));
        assert!(ddl.contains(
            "FOREIGN KEY (\"user_id\") REFERENCES \"user\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[rstest]
    fn test_compile_thread_postgres_native_types() {
        let thread = &builtin_tables()["thread"];
        let ddl = SqlCompiler::compile_table(thread, Dialect::Postgres, false);
        assert!(ddl.contains("\"pinned\" BOOLEAN NOT NULL"));
        assert!(ddl.contains("\"created_at\" TIMESTAMPTZ NOT NULL"));
        assert!(ddl.contains("\"metadata\" JSONB"));
        assert!(ddl.contains("\"tags\" TEXT"));
    }

    #[rstest]
    fn test_numeric_ids() {
        let thread = &builtin_tables()["thread"];
        let ddl = SqlCompiler::compile_table(thread, Dialect::Postgres, true);
        assert!(ddl.contains("\"id\" BIGSERIAL PRIMARY KEY"));
    }

    #[rstest]
    fn test_mysql_keyed_strings_are_bounded() {
        let user = &builtin_tables()["user"];
        let ddl = SqlCompiler::compile_table(user, Dialect::MySql, false);
        assert!(ddl.contains("`email` VARCHAR(255) NOT NULL UNIQUE"));
        assert!(ddl.contains("`name` TEXT"));
    }

    #[rstest]
    fn test_mssql_create_guard() {
        let vote = &builtin_tables()["vote"];
        let ddl = SqlCompiler::compile_table(vote, Dialect::MsSql, false);
        assert!(ddl.starts_with("IF OBJECT_ID(N'vote', N'U') IS NULL CREATE TABLE [vote]"));
    }

    #[rstest]
    fn test_indexes() {
        let tables = builtin_tables();
        let indexes = SqlCompiler::compile_indexes(&tables["document"], Dialect::Sqlite);
        assert_eq!(
            indexes,
            vec![
                "CREATE INDEX IF NOT EXISTS \"document_user_created_idx\" ON \"document\" (\"user_id\", \"created_at\")"
                    .to_string()
            ]
        );
        let message = SqlCompiler::compile_indexes(&tables["message"], Dialect::Postgres);
        assert_eq!(message.len(), 1);
        assert!(message[0].contains("\"message_thread_id_idx\""));
    }

    #[rstest]
    fn test_compile_all_orders_by_dependency() {
        let schema = SchemaRegistry::build(&SchemaOptions::default());
        let ddl = SqlCompiler::compile_all(&schema, Dialect::Postgres, false);
        let position = |table: &str| {
            ddl.iter()
                .position(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS \"{}\"", table)))
                .unwrap()
        };
        assert!(position("user") < position("thread"));
        assert!(position("thread") < position("message"));
        assert!(position("message") < position("vote"));
        assert!(ddl.last().unwrap().starts_with("CREATE INDEX"));
    }
}
