use std::error::Error;

use serde::Serialize;

use super::{DdlCmd, DialectArg};
use crate::commands::Execute;
use crate::config::ConfigFile;
use crate::db::schema::compilers::{CozoCompiler, SqlCompiler};
use crate::db::Schema;

/// Result of the ddl command
#[derive(Debug, Clone, Serialize)]
pub struct DdlResult {
    pub dialect: String,
    pub statements: Vec<String>,
}

/// Compile every table and index of `schema` for the target.
pub fn compile(schema: &Schema, dialect: DialectArg, numeric_ids: bool) -> DdlResult {
    let statements = match dialect.sql() {
        Some(sql) => SqlCompiler::compile_all(schema, sql, numeric_ids),
        None => CozoCompiler::compile_all(schema),
    };
    DdlResult {
        dialect: dialect.name().to_string(),
        statements,
    }
}

impl Execute for DdlCmd {
    type Output = DdlResult;

    fn execute(self, config: &ConfigFile) -> Result<Self::Output, Box<dyn Error>> {
        Ok(compile(&config.schema(), self.dialect, self.numeric_ids))
    }
}
