//! Output formatting for migrate command results.

use super::execute::MigrateResult;
use crate::output::Outputable;

impl Outputable for MigrateResult {
    fn to_table(&self) -> String {
        let mut output = format!("Migration ({})\n\n", self.backend);

        if self.applied.is_empty() {
            output.push_str("Nothing to apply.");
            return output;
        }

        for item in &self.applied {
            output.push_str(&format!("  ✓ {}\n", item));
        }
        output.push_str(&format!("\n{} applied.", self.applied.len()));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::execute::MigrateResult;
    use rstest::{fixture, rstest};

    const SQL_TABLE: &str = "\
Migration (sqlite)

  ✓ user
  ✓ thread

2 applied.";

    #[fixture]
    fn sql_result() -> MigrateResult {
        MigrateResult {
            backend: "sqlite".to_string(),
            applied: vec!["user".to_string(), "thread".to_string()],
        }
    }

    #[fixture]
    fn empty_result() -> MigrateResult {
        MigrateResult {
            backend: "memory".to_string(),
            applied: vec![],
        }
    }

    crate::output_table_test! {
        test_name: test_to_table_sql,
        fixture: sql_result,
        fixture_type: MigrateResult,
        expected: SQL_TABLE,
    }

    crate::output_table_test! {
        test_name: test_to_table_empty,
        fixture: empty_result,
        fixture_type: MigrateResult,
        expected: "Migration (memory)\n\nNothing to apply.",
    }

    crate::output_json_test! {
        test_name: test_format_json,
        fixture: empty_result,
        fixture_type: MigrateResult,
        assertions: {
            "backend": "memory",
            "applied": serde_json::json!([]),
        },
    }
}
