//! Storage layer: one CRUD-and-query contract over four backends.
//!
//! - `schema` builds per-model field metadata (the registry) and DDL
//! - `query` is the normalized where / sort / pagination model
//! - `coercion` and `identity` are the shared encode/decode and create policies
//! - `sql`, `orm`, `document`, `memory` implement [`Engine`] per backend
//! - `adapter` ties them together behind the [`Adapter`] trait
//!
//! # Architecture
//!
//! The adapter speaks logical model and field names. Engines only ever see
//! physical names and already-encoded values, so each engine is a thin
//! compiler from the shared query model to its backend's native form.
//!
//! **Why a sealed `Backend` enum instead of `Box<dyn Engine>`?**
//! The set of backends is closed and chosen once per configuration.
//! `enum_dispatch` keeps the call static and lets `match` see every variant.

pub mod adapter;
pub mod backend;
pub mod coercion;
pub mod config;
pub mod document;
mod escape;
pub mod identity;
pub mod memory;
pub mod orm;
pub mod query;
pub mod schema;
pub mod sql;
mod value;

pub use adapter::{Adapter, StorageAdapter};
pub use backend::{Backend, Engine};
pub use coercion::Capabilities;
pub use config::DatabaseConfig;
pub use identity::{AdapterOptions, IdGenerator, IdRequest};
pub use query::{Connector, FindMany, Operator, SortBy, SortDirection, WhereClause, WhereCondition};
pub use schema::{Schema, SchemaOptions, SchemaRegistry, Table};
pub use value::{format_date, parse_date, Record, Value};

use std::error::Error as StdError;

use thiserror::Error;

/// Schema violations, raised before any backend call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown model '{model}'")]
    UnknownModel { model: String },

    #[error("Unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("Missing required field '{field}' on model '{model}'")]
    MissingRequiredField { model: String, field: String },
}

/// Adapter error types
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Backend unavailable for model '{model}': {reason}")]
    BackendUnavailable { model: String, reason: String },

    /// Driver errors, constraint violations included, passed through unchanged.
    #[error(transparent)]
    Backend(Box<dyn StdError + Send + Sync>),

    #[error("Constraint violated on model '{model}': {message}")]
    Constraint { model: String, message: String },

    #[error("Unsupported operator '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("Cannot decode value: {message}")]
    Decode { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },
}

impl AdapterError {
    pub fn backend(err: impl StdError + Send + Sync + 'static) -> Self {
        AdapterError::Backend(Box::new(err))
    }

    pub fn decode(message: impl Into<String>) -> Self {
        AdapterError::Decode {
            message: message.into(),
        }
    }
}
