//! Schema registry: merges built-in tables with configured overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::definition::{FieldAttribute, IndexDefinition, Schema, Table};
use super::tables::builtin_tables;

/// Overrides for one model. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverride {
    /// Physical table / relation / collection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Logical field name to physical column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Extra fields; a built-in name here replaces the built-in attribute.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_fields: BTreeMap<String, FieldAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
}

/// Registry input, keyed by logical model name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaOptions {
    pub models: BTreeMap<String, ModelOverride>,
}

pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Build the complete schema. Overrides always win; models only known to
    /// the overrides become new tables.
    pub fn build(options: &SchemaOptions) -> Schema {
        let mut tables = builtin_tables();

        for (model, overrides) in &options.models {
            let table = tables
                .entry(model.clone())
                .or_insert_with(|| Table::new(model.clone()));
            Self::apply(table, overrides);
        }

        Schema { tables }
    }

    fn apply(table: &mut Table, overrides: &ModelOverride) {
        if let Some(name) = &overrides.model_name {
            table.model_name = name.clone();
        }
        for (field, attribute) in &overrides.additional_fields {
            table.fields.insert(field.clone(), attribute.clone());
        }
        for (field, column) in &overrides.fields {
            if let Some(attribute) = table.fields.get_mut(field) {
                attribute.field_name = Some(column.clone());
            }
        }
        for index in &overrides.indexes {
            table.indexes.retain(|existing| existing.name != index.name);
            table.indexes.push(index.clone());
        }
    }
}
