//! Built-in chat application tables.
//!
//! Five models: `user`, `thread`, `message`, `vote`, `document`. Foreign keys
//! and timestamps use snake_case columns behind camelCase logical names.

use std::collections::BTreeMap;

use super::definition::{
    Conversion, DefaultGenerator, FieldAttribute, FieldType, IndexDefinition, OnDelete, Table,
};

fn created_at() -> FieldAttribute {
    FieldAttribute::new(FieldType::Date)
        .required()
        .default_generated(DefaultGenerator::Now)
        .column("created_at")
}

/// Accounts owning threads and documents.
pub fn user_table() -> Table {
    Table::new("user")
        .with_field(
            "email",
            FieldAttribute::new(FieldType::String)
                .required()
                .unique()
                .transform(Some(Conversion::Lowercase), None),
        )
        .with_field("name", FieldAttribute::new(FieldType::String))
        .with_field("password", FieldAttribute::new(FieldType::String).hidden())
        .with_field("createdAt", created_at())
}

/// Conversations.
pub fn thread_table() -> Table {
    Table::new("thread")
        .with_field("title", FieldAttribute::new(FieldType::String).required())
        .with_field(
            "userId",
            FieldAttribute::new(FieldType::String)
                .column("user_id")
                .references("user", "id", OnDelete::Cascade)
                .indexed(),
        )
        .with_field(
            "visibility",
            FieldAttribute::new(FieldType::String)
                .required()
                .default_literal("private"),
        )
        .with_field(
            "pinned",
            FieldAttribute::new(FieldType::Boolean)
                .required()
                .default_literal(false),
        )
        .with_field(
            "messageCount",
            FieldAttribute::new(FieldType::Number)
                .column("message_count")
                .default_literal(0i64),
        )
        .with_field("tags", FieldAttribute::new(FieldType::StringArray))
        .with_field("metadata", FieldAttribute::new(FieldType::Json))
        .with_field("createdAt", created_at())
}

/// Messages within a thread.
pub fn message_table() -> Table {
    Table::new("message")
        .with_field(
            "threadId",
            FieldAttribute::new(FieldType::String)
                .required()
                .column("thread_id")
                .references("thread", "id", OnDelete::Cascade)
                .indexed(),
        )
        .with_field("role", FieldAttribute::new(FieldType::String).required())
        .with_field("parts", FieldAttribute::new(FieldType::Json).required())
        .with_field("attachments", FieldAttribute::new(FieldType::Json))
        .with_field("createdAt", created_at())
}

/// Per-message feedback.
pub fn vote_table() -> Table {
    Table::new("vote")
        .with_field(
            "threadId",
            FieldAttribute::new(FieldType::String)
                .required()
                .column("thread_id")
                .references("thread", "id", OnDelete::Cascade),
        )
        .with_field(
            "messageId",
            FieldAttribute::new(FieldType::String)
                .required()
                .column("message_id")
                .references("message", "id", OnDelete::Cascade),
        )
        .with_field("isUpvoted", FieldAttribute::new(FieldType::Boolean).required().column("is_upvoted"))
}

/// Artifacts produced in a thread.
pub fn document_table() -> Table {
    let mut table = Table::new("document")
        .with_field("title", FieldAttribute::new(FieldType::String).required())
        .with_field("content", FieldAttribute::new(FieldType::String))
        .with_field(
            "kind",
            FieldAttribute::new(FieldType::String)
                .required()
                .default_literal("text"),
        )
        .with_field(
            "userId",
            FieldAttribute::new(FieldType::String)
                .column("user_id")
                .references("user", "id", OnDelete::Cascade),
        )
        .with_field("createdAt", created_at());
    table.indexes.push(IndexDefinition {
        name: "document_user_created_idx".to_string(),
        fields: vec!["userId".to_string(), "createdAt".to_string()],
        unique: false,
    });
    table
}

/// All built-in tables keyed by logical model name.
pub fn builtin_tables() -> BTreeMap<String, Table> {
    [
        ("user", user_table()),
        ("thread", thread_table()),
        ("message", message_table()),
        ("vote", vote_table()),
        ("document", document_table()),
    ]
    .into_iter()
    .map(|(name, table)| (name.to_string(), table))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_builtin_models() {
        let tables = builtin_tables();
        let names: Vec<&str> = tables.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["document", "message", "thread", "user", "vote"]);
    }

    #[rstest]
    fn test_thread_defaults() {
        let thread = thread_table();
        assert!(thread.field("visibility").unwrap().default_value.is_some());
        assert!(thread.field("pinned").unwrap().default_value.is_some());
        assert!(thread.field("id").is_none());
    }

    #[rstest]
    #[case("thread", "createdAt", "created_at")]
    #[case("message", "threadId", "thread_id")]
    #[case("vote", "isUpvoted", "is_upvoted")]
    fn test_snake_case_columns(#[case] model: &str, #[case] field: &str, #[case] column: &str) {
        let tables = builtin_tables();
        assert_eq!(tables[model].column_name(model, field).unwrap(), column);
    }
}
