//! ID and default-value policy applied on create.

use std::fmt;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::schema::{Table, ID_FIELD};
use super::value::{Record, Value};
use super::SchemaError;

pub const DEFAULT_ID_SIZE: usize = 32;

/// What a generator is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRequest<'a> {
    pub model: &'a str,
    pub size: usize,
}

/// Caller-supplied id generator.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, request: IdRequest<'_>) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn(IdRequest<'_>) -> String + Send + Sync,
{
    fn generate(&self, request: IdRequest<'_>) -> String {
        self(request)
    }
}

/// Random alphanumeric identifier.
pub fn random_id(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}

/// Adapter-level options, loaded from the `adapter` section of the config file.
#[derive(Clone, Serialize, Deserialize)]
pub struct AdapterOptions {
    /// `false` leaves key generation to the backend.
    #[serde(default = "default_generate_id")]
    pub generate_id: bool,
    #[serde(default = "default_id_size")]
    pub id_size: usize,
    /// Log every operation and compiled statement.
    #[serde(default)]
    pub debug_logs: bool,
    #[serde(skip)]
    pub id_generator: Option<Arc<dyn IdGenerator>>,
}

fn default_generate_id() -> bool {
    true
}

fn default_id_size() -> usize {
    DEFAULT_ID_SIZE
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            generate_id: true,
            id_size: DEFAULT_ID_SIZE,
            debug_logs: false,
            id_generator: None,
        }
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("generate_id", &self.generate_id)
            .field("id_size", &self.id_size)
            .field("debug_logs", &self.debug_logs)
            .field("id_generator", &self.id_generator.is_some())
            .finish()
    }
}

impl AdapterOptions {
    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    fn next_id(&self, model: &str) -> String {
        match &self.id_generator {
            Some(generator) => generator.generate(IdRequest {
                model,
                size: self.id_size,
            }),
            None => random_id(self.id_size),
        }
    }
}

/// Complete a logical create payload: id, then defaults, then the required
/// check. `backend_keys` says whether the engine generates keys itself.
pub fn prepare_create(
    model: &str,
    table: &Table,
    mut data: Record,
    options: &AdapterOptions,
    backend_keys: bool,
) -> Result<Record, SchemaError> {
    let has_id = data.get(ID_FIELD).is_some_and(|v| !v.is_null());
    if !has_id {
        data.remove(ID_FIELD);
        if options.generate_id {
            data.insert(ID_FIELD.to_string(), Value::Text(options.next_id(model)));
        } else if !backend_keys {
            return Err(SchemaError::MissingRequiredField {
                model: model.to_string(),
                field: ID_FIELD.to_string(),
            });
        }
    }

    for (name, attr) in &table.fields {
        let absent = data.get(name).is_none_or(Value::is_null);
        if !absent {
            continue;
        }
        if let Some(default) = &attr.default_value {
            data.insert(name.clone(), default.resolve());
        } else if attr.required {
            return Err(SchemaError::MissingRequiredField {
                model: model.to_string(),
                field: name.clone(),
            });
        }
    }

    Ok(data)
}
