use std::error::Error;

use serde::Serialize;

use super::MigrateCmd;
use crate::commands::Execute;
use crate::config::ConfigFile;

/// Result of the migrate command
#[derive(Debug, Clone, Serialize)]
pub struct MigrateResult {
    pub backend: String,
    /// Tables, relations or indexes, in the order they were applied.
    pub applied: Vec<String>,
}

impl Execute for MigrateCmd {
    type Output = MigrateResult;

    fn execute(self, config: &ConfigFile) -> Result<Self::Output, Box<dyn Error>> {
        let database = config.database()?;
        let adapter = database.connect(config.schema(), config.adapter.clone())?;
        let applied = adapter.migrate()?;
        tracing::info!(backend = database.kind(), count = applied.len(), "migrated");
        Ok(MigrateResult {
            backend: database.kind().to_string(),
            applied,
        })
    }
}
