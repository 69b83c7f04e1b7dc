//! Database schema compilers.
//!
//! Generates backend-specific DDL from backend-agnostic schema definitions.

pub mod cozo;
pub mod sql;

pub use cozo::CozoCompiler;
pub use sql::SqlCompiler;
