//! Output formatting for schema command results.

use super::execute::{FieldSummary, SchemaResult};
use crate::output::{pad, Outputable};

fn flags(field: &FieldSummary) -> String {
    let mut flags = Vec::new();
    if field.required {
        flags.push("required".to_string());
    }
    if field.unique {
        flags.push("unique".to_string());
    }
    if field.hidden {
        flags.push("hidden".to_string());
    }
    if let Some(default) = &field.default {
        flags.push(format!("default {}", default));
    }
    if let Some(target) = &field.references {
        flags.push(format!("-> {}", target));
    }
    flags.join(", ")
}

impl Outputable for SchemaResult {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Schema ({} tables)", self.tables.len())];

        for table in &self.tables {
            lines.push(String::new());
            if table.model == table.table_name {
                lines.push(table.model.clone());
            } else {
                lines.push(format!("{} ({})", table.model, table.table_name));
            }
            let width = table.fields.iter().map(|f| f.column.len()).max().unwrap_or(0);
            for field in &table.fields {
                let line = format!(
                    "  {}  {}  {}",
                    pad(&field.column, width),
                    pad(&field.field_type, 8),
                    flags(field)
                );
                lines.push(line.trim_end().to_string());
            }
            if !table.indexes.is_empty() {
                lines.push(format!("  indexes: {}", table.indexes.join(", ")));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::super::execute::{FieldSummary, SchemaResult, TableSummary};
    use rstest::{fixture, rstest};

    const SINGLE_TABLE: &str = "\
Schema (1 tables)

thread (chat_threads)
  id       string    required, unique
  user_id  string    -> user.id (CASCADE)
  pinned   boolean   required, default false
  indexes: thread_user_idx";

    fn field(name: &str, column: &str, field_type: &str) -> FieldSummary {
        FieldSummary {
            name: name.to_string(),
            column: column.to_string(),
            field_type: field_type.to_string(),
            required: false,
            unique: false,
            default: None,
            references: None,
            hidden: false,
        }
    }

    #[fixture]
    fn single_result() -> SchemaResult {
        SchemaResult {
            tables: vec![TableSummary {
                model: "thread".to_string(),
                table_name: "chat_threads".to_string(),
                fields: vec![
                    FieldSummary {
                        required: true,
                        unique: true,
                        ..field("id", "id", "string")
                    },
                    FieldSummary {
                        references: Some("user.id (CASCADE)".to_string()),
                        ..field("userId", "user_id", "string")
                    },
                    FieldSummary {
                        required: true,
                        default: Some("false".to_string()),
                        ..field("pinned", "pinned", "boolean")
                    },
                ],
                indexes: vec!["thread_user_idx".to_string()],
            }],
        }
    }

    #[fixture]
    fn empty_result() -> SchemaResult {
        SchemaResult { tables: vec![] }
    }

    crate::output_table_test! {
        test_name: test_to_table_single,
        fixture: single_result,
        fixture_type: SchemaResult,
        expected: SINGLE_TABLE,
    }

    crate::output_table_test! {
        test_name: test_to_table_empty,
        fixture: empty_result,
        fixture_type: SchemaResult,
        expected: "Schema (0 tables)",
    }

    crate::output_json_test! {
        test_name: test_format_json,
        fixture: single_result,
        fixture_type: SchemaResult,
        assertions: {
            "tables": serde_json::json!([{
                "model": "thread",
                "table_name": "chat_threads",
                "fields": [
                    { "name": "id", "column": "id", "field_type": "string", "required": true, "unique": true },
                    { "name": "userId", "column": "user_id", "field_type": "string", "required": false, "unique": false, "references": "user.id (CASCADE)" },
                    { "name": "pinned", "column": "pinned", "field_type": "boolean", "required": true, "unique": false, "default": "false" }
                ],
                "indexes": ["thread_user_idx"]
            }]),
        },
    }

    crate::output_toon_test! {
        test_name: test_format_toon,
        fixture: single_result,
        fixture_type: SchemaResult,
        contains: ["model: thread", "table_name: chat_threads"],
    }
}
