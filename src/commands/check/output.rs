//! Output formatting for check command results.

use crate::conformance::SuiteReport;
use crate::output::{pad, Outputable};

impl Outputable for SuiteReport {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Conformance: {}", self.backend), String::new()];

        let width = self.results.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for result in &self.results {
            let (symbol, status) = if result.passed {
                ("✓", "ok")
            } else {
                ("✗", "FAILED")
            };
            lines.push(format!("  {} {}  {}", symbol, pad(&result.name, width), status));
            if let Some(error) = &result.error {
                lines.push(format!("      {}", error));
            }
        }

        lines.push(String::new());
        lines.push(format!("{} passed, {} failed", self.passed(), self.failed()));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use crate::conformance::{ScenarioResult, SuiteReport};
    use rstest::{fixture, rstest};

    const MIXED_TABLE: &str = "\
Conformance: sqlite

  ✓ create  ok
  ✗ sort    FAILED
      title asc: expected [\"cf-t2\"], got [\"cf-t1\"]

1 passed, 1 failed";

    #[fixture]
    fn mixed_result() -> SuiteReport {
        SuiteReport {
            backend: "sqlite".to_string(),
            results: vec![
                ScenarioResult {
                    name: "create".to_string(),
                    passed: true,
                    error: None,
                },
                ScenarioResult {
                    name: "sort".to_string(),
                    passed: false,
                    error: Some("title asc: expected [\"cf-t2\"], got [\"cf-t1\"]".to_string()),
                },
            ],
        }
    }

    crate::output_table_test! {
        test_name: test_to_table_mixed,
        fixture: mixed_result,
        fixture_type: SuiteReport,
        expected: MIXED_TABLE,
    }

    crate::output_json_test! {
        test_name: test_format_json,
        fixture: mixed_result,
        fixture_type: SuiteReport,
        assertions: {
            "backend": "sqlite",
            "results": serde_json::json!([
                { "name": "create", "passed": true },
                { "name": "sort", "passed": false, "error": "title asc: expected [\"cf-t2\"], got [\"cf-t1\"]" }
            ]),
        },
    }

    crate::output_toon_test! {
        test_name: test_format_toon,
        fixture: mixed_result,
        fixture_type: SuiteReport,
        contains: ["backend: sqlite", "results[2]"],
    }
}
