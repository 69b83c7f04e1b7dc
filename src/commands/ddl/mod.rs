mod execute;
mod output;

use clap::{Args, ValueEnum};

use crate::db::sql::Dialect;

/// Target of the DDL command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
    /// Cozo `:create` scripts
    Cozo,
}

impl DialectArg {
    /// The SQL dialect, `None` for Cozo.
    pub fn sql(self) -> Option<Dialect> {
        match self {
            DialectArg::Sqlite => Some(Dialect::Sqlite),
            DialectArg::Postgres => Some(Dialect::Postgres),
            DialectArg::Mysql => Some(Dialect::MySql),
            DialectArg::Mssql => Some(Dialect::MsSql),
            DialectArg::Cozo => None,
        }
    }

    pub fn name(self) -> &'static str {
        self.sql().map_or("cozo", Dialect::name)
    }
}

/// Print CREATE TABLE / CREATE INDEX statements for a SQL dialect
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  storage_adapter ddl --dialect postgres               # PostgreSQL DDL
  storage_adapter ddl --dialect mysql --numeric-ids    # Auto-increment integer keys
  storage_adapter ddl --dialect cozo                   # Cozo relations
  storage_adapter ddl --dialect sqlite --format json   # Statements as a JSON array")]
pub struct DdlCmd {
    /// Target dialect
    #[arg(short, long, value_enum, default_value_t = DialectArg::Sqlite)]
    pub dialect: DialectArg,

    /// Let the database generate integer keys instead of text ids
    #[arg(long, default_value_t = false)]
    pub numeric_ids: bool,
}

#[cfg(test)]
mod tests {
    use super::DialectArg;
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_defaults_test! {
        command: "ddl",
        variant: Ddl,
        required_args: [],
        defaults: {
            dialect: DialectArg::Sqlite,
            numeric_ids: false,
        },
    }

    crate::cli_option_test! {
        command: "ddl",
        variant: Ddl,
        test_name: test_with_dialect,
        args: ["--dialect", "mssql"],
        field: dialect,
        expected: DialectArg::Mssql,
    }

    crate::cli_option_test! {
        command: "ddl",
        variant: Ddl,
        test_name: test_with_numeric_ids,
        args: ["--numeric-ids"],
        field: numeric_ids,
        expected: true,
    }

    crate::cli_error_test! {
        command: "ddl",
        test_name: test_unknown_dialect_rejected,
        args: ["--dialect", "oracle"],
    }
}
