//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing (`mod.rs`)
//! - A serializable result and its `Execute` impl (`execute.rs`)
//! - The `Outputable` impl for table output (`output.rs`)

mod check;
mod ddl;
mod migrate;
mod schema;

pub use check::CheckCmd;
pub use ddl::{DdlCmd, DialectArg};
pub use migrate::MigrateCmd;
pub use schema::SchemaCmd;

use clap::Subcommand;
use std::error::Error;

use crate::config::ConfigFile;
use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, config: &ConfigFile) -> Result<Self::Output, Box<dyn Error>>;
}

/// Execute and format in one step.
pub trait CommandRunner {
    fn run(self, config: &ConfigFile, format: OutputFormat) -> Result<String, Box<dyn Error>>;
}

impl<T: Execute> CommandRunner for T {
    fn run(self, config: &ConfigFile, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        let result = self.execute(config)?;
        Ok(result.format(format))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the table map: models, columns, types and constraints
    Schema(SchemaCmd),

    /// Print CREATE TABLE / CREATE INDEX statements for a SQL dialect
    Ddl(DdlCmd),

    /// Create tables, relations or indexes on the configured backend
    Migrate(MigrateCmd),

    /// Run the conformance suite against the configured backend
    Check(CheckCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, config: &ConfigFile, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Schema(cmd) => cmd.run(config, format),
            Command::Ddl(cmd) => cmd.run(config, format),
            Command::Migrate(cmd) => cmd.run(config, format),
            Command::Check(cmd) => cmd.run(config, format),
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_unknown_command_errors() {
        let result = Command::Unknown(vec!["frobnicate".to_string()])
            .run(&ConfigFile::default(), OutputFormat::Table);
        assert_eq!(result.unwrap_err().to_string(), "Unknown command: frobnicate");
    }
}
