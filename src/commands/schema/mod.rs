mod execute;
mod output;

use clap::Args;

/// Print the table map: models, columns, types and constraints
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  storage_adapter schema                  # All tables
  storage_adapter schema --model thread   # One model
  storage_adapter schema --format json    # Serialized table map")]
pub struct SchemaCmd {
    /// Only show this logical model
    #[arg(short, long)]
    pub model: Option<String>,
}
