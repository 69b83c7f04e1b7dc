//! Cozo Datalog DDL compiler.
//!
//! Generates `:create relation { id: String => ... }` from a table. Value
//! columns are untyped and nullable (`Any?`): coercion has already decided the
//! stored representation, so Cozo does not need to re-check it.

use crate::db::schema::definition::{Schema, Table};

/// Compiler for generating Cozo Datalog DDL from schema definitions.
pub struct CozoCompiler;

impl CozoCompiler {
    /// Generate Cozo DDL for a single table.
    ///
    /// Produces output in the format:
    /// ```cozo
    /// :create thread {
    ///     id: String
    ///     =>
    ///     created_at: Any?,
    ///     title: Any?
    /// }
    /// ```
    pub fn compile_relation(table: &Table) -> String {
        let value_fields = table
            .columns()
            .into_iter()
            .skip(1)
            .map(|column| format!("    {}: Any?", column))
            .collect::<Vec<_>>()
            .join(",\n");

        if value_fields.is_empty() {
            format!(":create {} {{\n    id: String\n}}", table.model_name)
        } else {
            format!(
                ":create {} {{\n    id: String\n    =>\n{}\n}}",
                table.model_name, value_fields
            )
        }
    }

    /// Generate DDL for all tables.
    pub fn compile_all(schema: &Schema) -> Vec<String> {
        schema
            .ordered_tables()
            .into_iter()
            .map(|(_, table)| Self::compile_relation(table))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::builtin_tables;
    use crate::db::schema::{FieldAttribute, FieldType};
    use rstest::rstest;

    #[rstest]
    fn test_compile_vote() {
        let vote = &builtin_tables()["vote"];
        assert_eq!(
            CozoCompiler::compile_relation(vote),
            ":create vote {\n    id: String\n    =>\n    is_upvoted: Any?,\n    message_id: Any?,\n    thread_id: Any?\n}"
        );
    }

    #[rstest]
    fn test_compile_key_only_relation() {
        let table = Table::new("tag");
        assert_eq!(CozoCompiler::compile_relation(&table), ":create tag {\n    id: String\n}");
    }

    #[rstest]
    fn test_remapped_column_is_used() {
        let table = Table::new("note").with_field(
            "body",
            FieldAttribute::new(FieldType::String).column("note_body"),
        );
        assert!(CozoCompiler::compile_relation(&table).contains("note_body: Any?"));
    }
}
