mod execute;
mod output;

use clap::Args;

/// Create tables, relations or indexes on the configured backend
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  storage_adapter migrate                              # Uses ./.storage_adapter.json or DATABASE_URL
  storage_adapter --config prod.json migrate           # Explicit configuration file
  DATABASE_URL=cozo+sqlite://./cozo.db storage_adapter migrate")]
pub struct MigrateCmd {}
