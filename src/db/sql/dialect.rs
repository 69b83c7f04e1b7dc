//! SQL dialect differences.

use serde::{Deserialize, Serialize};

use crate::db::coercion::Capabilities;
use crate::db::schema::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MsSql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Dialect::Sqlite => Capabilities {
                supports_json: false,
                supports_dates: false,
                supports_booleans: false,
                supports_numeric_ids: true,
                supports_arrays: false,
            },
            Dialect::Postgres => Capabilities {
                supports_json: true,
                supports_dates: true,
                supports_booleans: true,
                supports_numeric_ids: true,
                supports_arrays: false,
            },
            Dialect::MySql | Dialect::MsSql => Capabilities {
                supports_json: false,
                supports_dates: true,
                supports_booleans: false,
                supports_numeric_ids: true,
                supports_arrays: false,
            },
        }
    }

    /// Quote an identifier, doubling the closing quote character.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::MsSql => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    /// Placeholder for the `n`-th bound parameter (1-based).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
            Dialect::MsSql => format!("@P{}", n),
        }
    }

    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Sqlite | Dialect::Postgres)
    }

    /// Suffix appended to every `ORDER BY` term.
    pub fn order_collation(self) -> &'static str {
        match self {
            Dialect::Sqlite => " COLLATE NOCASE",
            _ => "",
        }
    }

    /// `ESCAPE` clause for `LIKE` patterns built by `escape_like`.
    pub fn like_escape(self) -> &'static str {
        match self {
            Dialect::MySql => "ESCAPE '\\\\'",
            _ => "ESCAPE '\\'",
        }
    }

    /// Expression yielding the key generated by the last insert.
    pub fn last_insert_id(self) -> &'static str {
        match self {
            Dialect::Sqlite => "last_insert_rowid()",
            Dialect::Postgres => "lastval()",
            Dialect::MySql => "LAST_INSERT_ID()",
            Dialect::MsSql => "SCOPE_IDENTITY()",
        }
    }

    /// Column type of the primary key.
    pub fn id_type(self, numeric: bool) -> &'static str {
        match (self, numeric) {
            (Dialect::Sqlite, false) | (Dialect::Postgres, false) => "TEXT PRIMARY KEY",
            (Dialect::MySql, false) => "VARCHAR(255) PRIMARY KEY",
            (Dialect::MsSql, false) => "NVARCHAR(255) PRIMARY KEY",
            (Dialect::Sqlite, true) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (Dialect::Postgres, true) => "BIGSERIAL PRIMARY KEY",
            (Dialect::MySql, true) => "BIGINT AUTO_INCREMENT PRIMARY KEY",
            (Dialect::MsSql, true) => "BIGINT IDENTITY(1,1) PRIMARY KEY",
        }
    }

    /// Column type for a field. `keyed` columns (unique, indexed, referencing)
    /// need a bounded string type on MySQL and SQL Server.
    pub fn column_type(self, field_type: FieldType, keyed: bool) -> &'static str {
        let caps = self.capabilities();
        match self {
            Dialect::Sqlite => match field_type {
                FieldType::Number => "REAL",
                FieldType::Boolean => "INTEGER",
                _ => "TEXT",
            },
            Dialect::Postgres => match field_type {
                FieldType::Number => "DOUBLE PRECISION",
                FieldType::Boolean => "BOOLEAN",
                FieldType::Date => "TIMESTAMPTZ",
                FieldType::Json if caps.supports_json => "JSONB",
                _ => "TEXT",
            },
            Dialect::MySql => match field_type {
                FieldType::String if keyed => "VARCHAR(255)",
                FieldType::Number => "DOUBLE",
                FieldType::Boolean => "TINYINT(1)",
                FieldType::Date => "DATETIME(3)",
                _ => "TEXT",
            },
            Dialect::MsSql => match field_type {
                FieldType::String if keyed => "NVARCHAR(255)",
                FieldType::Number => "FLOAT",
                FieldType::Boolean => "BIT",
                FieldType::Date => "DATETIME2(3)",
                _ => "NVARCHAR(MAX)",
            },
        }
    }

    /// `CREATE TABLE` prefix; SQL Server has no `IF NOT EXISTS`.
    pub fn create_table(self, quoted: &str, name: &str) -> String {
        match self {
            Dialect::MsSql => format!(
                "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {}",
                name.replace('\'', "''"),
                quoted
            ),
            _ => format!("CREATE TABLE IF NOT EXISTS {}", quoted),
        }
    }

    /// `CREATE INDEX` prefix; MySQL and SQL Server have no `IF NOT EXISTS`.
    pub fn create_index(self, unique: bool, index: &str) -> String {
        let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
        match self {
            Dialect::Sqlite | Dialect::Postgres => {
                format!("CREATE {} IF NOT EXISTS {}", kind, self.quote(index))
            }
            Dialect::MySql | Dialect::MsSql => format!("CREATE {} {}", kind, self.quote(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Dialect::Sqlite, "\"title\"")]
    #[case(Dialect::Postgres, "\"title\"")]
    #[case(Dialect::MySql, "`title`")]
    #[case(Dialect::MsSql, "[title]")]
    fn test_quote(#[case] dialect: Dialect, #[case] expected: &str) {
        assert_eq!(dialect.quote("title"), expected);
    }

    #[rstest]
    fn test_quote_escapes_quote_char() {
        assert_eq!(Dialect::Postgres.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MsSql.quote("a]b"), "[a]]b]");
    }

    #[rstest]
    #[case(Dialect::Sqlite, "?")]
    #[case(Dialect::MySql, "?")]
    #[case(Dialect::Postgres, "$3")]
    #[case(Dialect::MsSql, "@P3")]
    fn test_placeholder(#[case] dialect: Dialect, #[case] expected: &str) {
        assert_eq!(dialect.placeholder(3), expected);
    }

    #[rstest]
    fn test_capabilities() {
        assert!(!Dialect::Sqlite.capabilities().supports_booleans);
        assert!(Dialect::Postgres.capabilities().supports_booleans);
        assert!(!Dialect::MySql.capabilities().supports_booleans);
        assert!(Dialect::MsSql.capabilities().supports_dates);
    }
}
