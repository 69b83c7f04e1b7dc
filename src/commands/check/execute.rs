use std::error::Error;

use super::CheckCmd;
use crate::commands::Execute;
use crate::config::ConfigFile;
use crate::conformance::{self, SuiteReport};
use crate::db::AdapterError;

impl Execute for CheckCmd {
    type Output = SuiteReport;

    fn execute(self, config: &ConfigFile) -> Result<Self::Output, Box<dyn Error>> {
        let database = config.database()?;
        let schema = config.schema();
        let debug_logs = config.adapter.debug_logs;
        let migrate = !self.no_migrate;

        let factory = conformance::factory(database.kind(), |mut options| {
            options.debug_logs = debug_logs;
            let adapter = database
                .connect(schema.clone(), options)
                .map_err(AdapterError::backend)?;
            if migrate {
                adapter.migrate()?;
            }
            Ok(adapter)
        });
        Ok(conformance::run_suite(&factory))
    }
}
