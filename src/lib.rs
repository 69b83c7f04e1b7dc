//! storage_adapter library - one CRUD and query contract over several databases
//!
//! Provides the storage adapter and its backends (SQL, a generated Cozo client,
//! MongoDB, in-memory), the conformance suite, and the command execution and
//! output formatting infrastructure of the `storage_adapter` CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod conformance;
pub mod db;
pub mod output;

#[macro_use]
pub mod test_macros;
