//! Database configuration for runtime backend selection.
//!
//! A [`DatabaseConfig`] comes from the `database` section of
//! `.storage_adapter.json`, from a `DATABASE_URL`, or falls back to the
//! in-memory store. [`DatabaseConfig::connect`] opens the handle and wraps it
//! in a [`StorageAdapter`].

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::adapter::StorageAdapter;
use super::document::{self, DocumentEngine};
use super::identity::AdapterOptions;
use super::orm::{CozoClient, OrmEngine};
use super::schema::Schema;
use super::sql::postgres::PostgresConnection;
use super::sql::sqlite::SqliteConnection;
use super::sql::SqlEngine;
use super::AdapterError;

const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_MONGO_DATABASE: &str = "storage_adapter";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported database URL '{url}'")]
    UnsupportedUrl { url: String },

    #[error("PostgreSQL configuration needs a connection_string or host, user and database")]
    IncompletePostgres,

    #[error("Cozo engine '{engine}' needs a path")]
    MissingPath { engine: &'static str },

    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Connect(#[from] AdapterError),
}

/// PostgreSQL connection settings: a connection string, or its components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// `0` means the default port.
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Quote a libpq key/value parameter.
fn quote_param(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl PostgresConfig {
    pub fn from_connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            ..Self::default()
        }
    }

    /// The connection string as given, or one built from the components.
    pub fn build_connection_string(&self) -> Result<String, ConfigError> {
        if let Some(conn) = &self.connection_string {
            return Ok(conn.clone());
        }
        let (Some(host), Some(user), Some(database)) = (&self.host, &self.user, &self.database)
        else {
            return Err(ConfigError::IncompletePostgres);
        };
        let port = if self.port == 0 { DEFAULT_POSTGRES_PORT } else { self.port };
        let mut conn = format!(
            "host={} port={} user={} dbname={}",
            quote_param(host),
            port,
            quote_param(user),
            quote_param(database)
        );
        if let Some(password) = &self.password {
            conn.push_str(&format!(" password={}", quote_param(password)));
        }
        Ok(conn)
    }
}

/// Storage engine under a Cozo database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CozoEngine {
    #[default]
    Mem,
    Sqlite,
}

/// Configuration for database backend selection.
///
/// JSON form uses a `type` tag with lowercase variant names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// In-memory store; nothing survives the process.
    Memory,
    Sqlite {
        path: PathBuf,
    },
    Postgres(PostgresConfig),
    /// CozoDB through the generated client.
    Cozo {
        #[serde(default)]
        engine: CozoEngine,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    #[serde(rename = "mongodb")]
    MongoDb {
        uri: String,
        database: String,
    },
}

impl DatabaseConfig {
    /// Parse from a connection URL or file path.
    ///
    /// Supported formats:
    /// - `:memory:` → Memory
    /// - `sqlite:///path/to/db` or a bare path → Sqlite
    /// - `postgres://...` / `postgresql://...` → Postgres
    /// - `cozo+mem://` → Cozo in memory
    /// - `cozo+sqlite:///path/to/db` → Cozo over SQLite storage
    /// - `mongodb://host/db` / `mongodb+srv://...` → MongoDb
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url == ":memory:" {
            return Ok(Self::Memory);
        }

        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(Self::Sqlite {
                path: PathBuf::from(path),
            });
        }

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres(PostgresConfig::from_connection_string(url)));
        }

        if url.starts_with("cozo+mem://") {
            return Ok(Self::Cozo {
                engine: CozoEngine::Mem,
                path: None,
            });
        }

        if let Some(path) = url.strip_prefix("cozo+sqlite://") {
            return Ok(Self::Cozo {
                engine: CozoEngine::Sqlite,
                path: Some(PathBuf::from(path)),
            });
        }

        if url.starts_with("mongodb://") || url.starts_with("mongodb+srv://") {
            return Ok(Self::MongoDb {
                uri: url.to_string(),
                database: mongo_database(url).unwrap_or(DEFAULT_MONGO_DATABASE).to_string(),
            });
        }

        if url.contains("://") {
            return Err(ConfigError::UnsupportedUrl {
                url: url.to_string(),
            });
        }

        // Default: treat as file path (Sqlite)
        Ok(Self::Sqlite {
            path: PathBuf::from(url),
        })
    }

    /// `DATABASE_URL`, when set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Ok(Some(Self::from_url(&url)?)),
            _ => Ok(None),
        }
    }

    /// Resolve configuration.
    ///
    /// Priority: config file > `DATABASE_URL` > in-memory.
    pub fn resolve(configured: Option<DatabaseConfig>) -> Result<Self, ConfigError> {
        if let Some(config) = configured {
            return Ok(config);
        }
        if let Some(config) = Self::from_env()? {
            return Ok(config);
        }
        tracing::debug!("no database configured, falling back to memory");
        Ok(Self::Memory)
    }

    /// Short backend label for output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::Cozo { .. } => "cozo",
            Self::MongoDb { .. } => "mongodb",
        }
    }

    /// Open the handle and build an adapter. Storage is not created; call
    /// [`StorageAdapter::migrate`] for that.
    pub fn connect(&self, schema: Schema, options: AdapterOptions) -> Result<StorageAdapter, ConfigError> {
        let debug_logs = options.debug_logs;
        let numeric_ids = !options.generate_id;
        let adapter = match self {
            Self::Memory => StorageAdapter::in_memory(schema, options),
            Self::Sqlite { path } => {
                let engine = SqlEngine::new(SqliteConnection::open(path)?)
                    .with_numeric_ids(numeric_ids)
                    .with_debug_logs(debug_logs);
                StorageAdapter::new(schema, engine, options)
            }
            Self::Postgres(pg_config) => {
                let conn_str = pg_config.build_connection_string()?;
                let engine = SqlEngine::new(PostgresConnection::connect(&conn_str)?)
                    .with_numeric_ids(numeric_ids)
                    .with_debug_logs(debug_logs);
                StorageAdapter::new(schema, engine, options)
            }
            Self::Cozo { engine, path } => {
                let db = match (engine, path) {
                    (CozoEngine::Mem, _) => CozoClient::open_mem(),
                    (CozoEngine::Sqlite, Some(path)) => CozoClient::open_sqlite(path),
                    (CozoEngine::Sqlite, None) => {
                        return Err(ConfigError::MissingPath { engine: "sqlite" });
                    }
                }
                .map_err(AdapterError::backend)?;
                let client = CozoClient::new(Arc::new(db), &schema);
                let engine = OrmEngine::new(client).with_debug_logs(debug_logs);
                StorageAdapter::new(schema, engine, options)
            }
            Self::MongoDb { uri, database } => {
                let db = document::connect(uri, database)?;
                let engine = DocumentEngine::new(db).with_debug_logs(debug_logs);
                StorageAdapter::new(schema, engine, options)
            }
        };
        Ok(adapter)
    }
}

/// Database name from the path of a MongoDB URI.
fn mongo_database(uri: &str) -> Option<&str> {
    let rest = uri.split_once("://")?.1;
    let path = rest.split_once('/')?.1;
    let name = path.split('?').next()?;
    (!name.is_empty()).then_some(name)
}
