mod execute;
mod output;

use clap::Args;

/// Run the conformance suite against the configured backend
///
/// Scenarios only touch records with ids starting with `cf-` and remove them
/// again, but need write access.
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  storage_adapter check                                 # Configured backend (memory by default)
  storage_adapter --config pg.json check                # PostgreSQL from a config file
  DATABASE_URL=cozo+mem:// storage_adapter check --format json")]
pub struct CheckCmd {
    /// Skip creating storage before the run
    #[arg(long, default_value_t = false)]
    pub no_migrate: bool,
}
