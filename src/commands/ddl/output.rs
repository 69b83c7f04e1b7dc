//! Output formatting for ddl command results.

use super::execute::DdlResult;
use crate::output::Outputable;

impl Outputable for DdlResult {
    fn to_table(&self) -> String {
        let terminator = if self.dialect == "cozo" { "" } else { ";" };
        let mut lines = vec![format!(
            "-- {} ({} statements)",
            self.dialect,
            self.statements.len()
        )];
        for statement in &self.statements {
            lines.push(String::new());
            lines.push(format!("{}{}", statement, terminator));
        }
        lines.join("\n")
    }
}
