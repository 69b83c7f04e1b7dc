//! Core schema definition types.
//!
//! Backend-agnostic description of models and their fields. Tables are keyed
//! by *logical* field name; each attribute may remap to a different physical
//! column, so callers never see storage naming.

use std::collections::BTreeMap;

use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::db::identity;
use crate::db::value::{Record, Value};
use crate::db::SchemaError;

/// Name of the implicit primary key field, logical and physical.
pub const ID_FIELD: &str = "id";

/// Logical type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "number[]")]
    NumberArray,
}

impl FieldType {
    pub fn is_array(self) -> bool {
        matches!(self, FieldType::StringArray | FieldType::NumberArray)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::StringArray => "string[]",
            FieldType::NumberArray => "number[]",
        }
    }
}

/// Zero-argument value generators usable as defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultGenerator {
    /// Current time, truncated to milliseconds.
    Now,
    /// A fresh random identifier.
    RandomId,
}

impl DefaultGenerator {
    pub fn generate(self) -> Value {
        match self {
            DefaultGenerator::Now => Value::Date(Utc::now().trunc_subsecs(3)),
            DefaultGenerator::RandomId => Value::Text(identity::random_id(identity::DEFAULT_ID_SIZE)),
        }
    }
}

/// A field default: a literal, or a named generator evaluated per create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Literal(Value),
    Generate(DefaultGenerator),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Generate(g) => g.generate(),
        }
    }
}

/// Named text conversions for field transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    Lowercase,
    Uppercase,
    Trim,
}

impl Conversion {
    /// Apply to text values; other values pass through.
    pub fn apply(self, value: Value) -> Value {
        match value {
            Value::Text(s) => Value::Text(match self {
                Conversion::Lowercase => s.to_lowercase(),
                Conversion::Uppercase => s.to_uppercase(),
                Conversion::Trim => s.trim().to_string(),
            }),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Conversion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Conversion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    pub fn as_sql(self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

/// Foreign key target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub model: String,
    pub field: String,
    #[serde(default)]
    pub on_delete: OnDelete,
}

/// Metadata for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAttribute {
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    /// Physical column name when it differs from the logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    /// `false` strips the field from every output record.
    #[serde(default = "returned_default")]
    pub returned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

fn returned_default() -> bool {
    true
}

impl FieldAttribute {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default_value: None,
            field_name: None,
            references: None,
            unique: false,
            index: false,
            returned: true,
            transform: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.returned = false;
        self
    }

    pub fn default_literal(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_generated(mut self, generator: DefaultGenerator) -> Self {
        self.default_value = Some(DefaultValue::Generate(generator));
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn references(mut self, model: &str, field: &str, on_delete: OnDelete) -> Self {
        self.references = Some(Reference {
            model: model.to_string(),
            field: field.to_string(),
            on_delete,
        });
        self
    }

    pub fn transform(mut self, input: Option<Conversion>, output: Option<Conversion>) -> Self {
        self.transform = Some(Transform { input, output });
        self
    }

    pub fn input_conversion(&self) -> Option<Conversion> {
        self.transform.as_ref().and_then(|t| t.input)
    }

    pub fn output_conversion(&self) -> Option<Conversion> {
        self.transform.as_ref().and_then(|t| t.output)
    }
}

/// A secondary index over physical columns of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    /// Logical field names.
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// One model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Physical table / relation / collection name.
    pub model_name: String,
    /// Logical field name to attribute, `id` excluded.
    pub fields: BTreeMap<String, FieldAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
}

impl Table {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            fields: BTreeMap::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, attribute: FieldAttribute) -> Self {
        self.fields.insert(name.to_string(), attribute);
        self
    }

    pub fn field(&self, logical: &str) -> Option<&FieldAttribute> {
        self.fields.get(logical)
    }

    /// Physical column of a logical field; `id` is always `id`.
    pub fn column_name(&self, model: &str, logical: &str) -> Result<String, SchemaError> {
        if logical == ID_FIELD {
            return Ok(ID_FIELD.to_string());
        }
        self.fields
            .get(logical)
            .map(|attr| attr.field_name.clone().unwrap_or_else(|| logical.to_string()))
            .ok_or_else(|| SchemaError::UnknownField {
                model: model.to_string(),
                field: logical.to_string(),
            })
    }

    /// Logical field and attribute for a physical column. `id` maps to
    /// itself with no attribute.
    pub fn logical_for_column(&self, column: &str) -> Option<(&str, Option<&FieldAttribute>)> {
        if column == ID_FIELD {
            return Some((ID_FIELD, None));
        }
        self.fields.iter().find_map(|(name, attr)| {
            let physical = attr.field_name.as_deref().unwrap_or(name);
            (physical == column).then_some((name.as_str(), Some(attr)))
        })
    }

    /// Physical columns, `id` first, then fields by logical name.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(ID_FIELD.to_string())
            .chain(
                self.fields
                    .iter()
                    .map(|(name, attr)| attr.field_name.clone().unwrap_or_else(|| name.clone())),
            )
            .collect()
    }

    /// Whether a physical column is the key or carries a uniqueness constraint.
    pub fn is_unique_column(&self, column: &str) -> bool {
        match self.logical_for_column(column) {
            Some((_, None)) => true,
            Some((_, Some(attr))) => attr.unique,
            None => false,
        }
    }

    /// Fields referencing other models (model names), for dependency order.
    pub fn referenced_models(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter_map(|attr| attr.references.as_ref().map(|r| r.model.as_str()))
    }

    /// Drop `returned: false` fields from an output record.
    pub fn strip_hidden(&self, record: &mut Record) {
        for (name, attr) in &self.fields {
            if !attr.returned {
                record.remove(name);
            }
        }
    }
}

/// Model name to table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    pub fn table(&self, model: &str) -> Result<&Table, SchemaError> {
        self.tables.get(model).ok_or_else(|| SchemaError::UnknownModel {
            model: model.to_string(),
        })
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Tables ordered so every referenced model precedes its referrers.
    ///
    /// Cycles and references to unknown models are emitted in name order.
    pub fn ordered_tables(&self) -> Vec<(&str, &Table)> {
        let mut ordered: Vec<(&str, &Table)> = Vec::with_capacity(self.tables.len());
        let mut pending: Vec<(&str, &Table)> =
            self.tables.iter().map(|(k, v)| (k.as_str(), v)).collect();

        while !pending.is_empty() {
            let ready = pending.iter().position(|(name, table)| {
                table.referenced_models().all(|target| {
                    target == *name
                        || !self.tables.contains_key(target)
                        || ordered.iter().any(|(done, _)| *done == target)
                })
            });
            let index = ready.unwrap_or(0);
            ordered.push(pending.remove(index));
        }
        ordered
    }
}
