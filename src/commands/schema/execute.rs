use std::error::Error;

use serde::Serialize;

use super::SchemaCmd;
use crate::commands::Execute;
use crate::config::ConfigFile;
use crate::db::schema::{DefaultValue, FieldAttribute, Table, ID_FIELD};
use crate::db::{Schema, SchemaError};

/// One column of a table.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub column: String,
    pub field_type: String,
    pub required: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub model: String,
    pub table_name: String,
    pub fields: Vec<FieldSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
}

/// Result of the schema command
#[derive(Debug, Clone, Serialize)]
pub struct SchemaResult {
    pub tables: Vec<TableSummary>,
}

fn describe_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Literal(value) => value.to_string(),
        DefaultValue::Generate(generator) => format!("{:?}()", generator).to_lowercase(),
    }
}

fn field_summary(name: &str, attr: &FieldAttribute) -> FieldSummary {
    FieldSummary {
        name: name.to_string(),
        column: attr.field_name.clone().unwrap_or_else(|| name.to_string()),
        field_type: attr.field_type.as_str().to_string(),
        required: attr.required,
        unique: attr.unique,
        default: attr.default_value.as_ref().map(describe_default),
        references: attr
            .references
            .as_ref()
            .map(|r| format!("{}.{} ({})", r.model, r.field, r.on_delete.as_sql())),
        hidden: !attr.returned,
    }
}

fn table_summary(model: &str, table: &Table) -> TableSummary {
    let id = FieldSummary {
        name: ID_FIELD.to_string(),
        column: ID_FIELD.to_string(),
        field_type: "string".to_string(),
        required: true,
        unique: true,
        default: None,
        references: None,
        hidden: false,
    };
    TableSummary {
        model: model.to_string(),
        table_name: table.model_name.clone(),
        fields: std::iter::once(id)
            .chain(table.fields.iter().map(|(name, attr)| field_summary(name, attr)))
            .collect(),
        indexes: table.indexes.iter().map(|index| index.name.clone()).collect(),
    }
}

/// Summarize the schema in dependency order, optionally one model only.
pub fn summarize(schema: &Schema, model: Option<&str>) -> Result<SchemaResult, SchemaError> {
    if let Some(model) = model {
        if !schema.tables.contains_key(model) {
            return Err(SchemaError::UnknownModel {
                model: model.to_string(),
            });
        }
    }
    let tables = schema
        .ordered_tables()
        .into_iter()
        .filter(|(name, _)| model.is_none_or(|m| m == *name))
        .map(|(name, table)| table_summary(name, table))
        .collect();
    Ok(SchemaResult { tables })
}

impl Execute for SchemaCmd {
    type Output = SchemaResult;

    fn execute(self, config: &ConfigFile) -> Result<Self::Output, Box<dyn Error>> {
        Ok(summarize(&config.schema(), self.model.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_all_builtin_tables_in_dependency_order() {
        let result = SchemaCmd { model: None }.execute(&ConfigFile::default()).unwrap();
        let models: Vec<&str> = result.tables.iter().map(|t| t.model.as_str()).collect();
        assert_eq!(models.len(), 5);
        let position = |m: &str| models.iter().position(|x| *x == m).unwrap();
        assert!(position("user") < position("thread"));
        assert!(position("thread") < position("message"));
    }

    #[rstest]
    fn test_single_model_fields() {
        let result = SchemaCmd {
            model: Some("thread".to_string()),
        }
        .execute(&ConfigFile::default())
        .unwrap();
        assert_eq!(result.tables.len(), 1);
        let thread = &result.tables[0];
        assert_eq!(thread.fields[0].name, "id");

        let user_id = thread.fields.iter().find(|f| f.name == "userId").unwrap();
        assert_eq!(user_id.column, "user_id");
        assert_eq!(user_id.references.as_deref(), Some("user.id (CASCADE)"));

        let visibility = thread.fields.iter().find(|f| f.name == "visibility").unwrap();
        assert_eq!(visibility.default.as_deref(), Some("private"));

        let created = thread.fields.iter().find(|f| f.name == "createdAt").unwrap();
        assert_eq!(created.default.as_deref(), Some("now()"));
    }

    #[rstest]
    fn test_hidden_field_flagged() {
        let result = summarize(&ConfigFile::default().schema(), Some("user")).unwrap();
        let password = result.tables[0].fields.iter().find(|f| f.name == "password").unwrap();
        assert!(password.hidden);
    }

    #[rstest]
    fn test_unknown_model() {
        let result = SchemaCmd {
            model: Some("invoice".to_string()),
        }
        .execute(&ConfigFile::default());
        assert!(result.unwrap_err().to_string().contains("Unknown model 'invoice'"));
    }
}
