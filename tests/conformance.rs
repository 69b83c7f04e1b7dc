//! Conformance suite against the backends that need no external service.
//!
//! Each scenario expands to its own test per backend through
//! `conformance_tests!`. PostgreSQL and MongoDB runs live in their own
//! feature-gated files.

use std::sync::Arc;

use storage_adapter::conformance::{AdapterFactory, factory};
use storage_adapter::db::config::CozoEngine;
use storage_adapter::db::memory::{MemoryEngine, MemoryStore};
use storage_adapter::db::orm::{CozoClient, OrmEngine};
use storage_adapter::db::sql::SqlEngine;
use storage_adapter::db::sql::sqlite::SqliteConnection;
use storage_adapter::db::{
    AdapterError, AdapterOptions, DatabaseConfig, Schema, SchemaOptions, SchemaRegistry,
    StorageAdapter,
};
use tempfile::TempDir;

fn schema() -> Schema {
    SchemaRegistry::build(&SchemaOptions::default())
}

fn migrated(adapter: StorageAdapter) -> Result<StorageAdapter, AdapterError> {
    adapter.migrate()?;
    Ok(adapter)
}

fn memory_factory() -> impl AdapterFactory {
    factory("memory", |options| {
        migrated(StorageAdapter::new(
            schema(),
            MemoryEngine::new(MemoryStore::new()),
            options,
        ))
    })
}

fn sqlite_memory_factory() -> impl AdapterFactory {
    factory("sqlite", |options: AdapterOptions| {
        let engine = SqlEngine::new(SqliteConnection::open_in_memory()?);
        migrated(StorageAdapter::new(schema(), engine, options))
    })
}

fn cozo_mem_factory() -> impl AdapterFactory {
    factory("cozo", |options| {
        let schema = schema();
        let db = CozoClient::open_mem().map_err(AdapterError::backend)?;
        let client = CozoClient::new(Arc::new(db), &schema);
        migrated(StorageAdapter::new(schema, OrmEngine::new(client), options))
    })
}

/// File-backed backends share one temporary directory per test; every build
/// reopens the same file.
struct FileFactory {
    dir: TempDir,
    name: &'static str,
    config: fn(&std::path::Path) -> DatabaseConfig,
}

impl FileFactory {
    fn new(name: &'static str, config: fn(&std::path::Path) -> DatabaseConfig) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            name,
            config,
        }
    }
}

impl AdapterFactory for FileFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn build(&self, options: AdapterOptions) -> Result<StorageAdapter, AdapterError> {
        let config = (self.config)(self.dir.path());
        let adapter = config
            .connect(schema(), options)
            .map_err(AdapterError::backend)?;
        migrated(adapter)
    }
}

fn sqlite_file_factory() -> FileFactory {
    FileFactory::new("sqlite-file", |dir| DatabaseConfig::Sqlite {
        path: dir.join("conformance.sqlite"),
    })
}

fn cozo_sqlite_factory() -> FileFactory {
    FileFactory::new("cozo-sqlite", |dir| DatabaseConfig::Cozo {
        engine: CozoEngine::Sqlite,
        path: Some(dir.join("conformance.cozo")),
    })
}

mod memory {
    use super::*;
    storage_adapter::conformance_tests!(factory: memory_factory());
}

mod sqlite {
    use super::*;
    storage_adapter::conformance_tests!(factory: sqlite_memory_factory());
}

mod sqlite_file {
    use super::*;
    storage_adapter::conformance_tests!(factory: sqlite_file_factory());
}

mod cozo_mem {
    use super::*;
    storage_adapter::conformance_tests!(factory: cozo_mem_factory());
}

mod cozo_sqlite {
    use super::*;
    storage_adapter::conformance_tests!(factory: cozo_sqlite_factory());
}

mod suite {
    use super::*;
    use rstest::rstest;
    use storage_adapter::conformance::{SCENARIOS, run_suite};

    #[rstest]
    fn test_run_suite_reports_every_scenario() {
        let report = run_suite(&cozo_mem_factory());
        assert_eq!(report.backend, "cozo");
        assert_eq!(report.results.len(), SCENARIOS.len());
        assert!(report.is_success(), "{:?}", report.results);
    }
}
