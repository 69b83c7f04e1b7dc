//! Backend-agnostic schema definitions and the schema registry.
//!
//! # Overview
//!
//! 1. **Core Types** (`definition.rs`):
//!    - `FieldType` - `string | number | boolean | date | json | string[] | number[]`
//!    - `FieldAttribute` - type, required, default, physical name, reference,
//!      unique, index, returned, transform
//!    - `Table` / `Schema` - logical model name to table
//!
//! 2. **Built-in Tables** (`tables.rs`): `user`, `thread`, `message`, `vote`, `document`
//!
//! 3. **Registry** (`registry.rs`): merges configured overrides over the built-ins
//!
//! 4. **Compilers** (`compilers/`): SQL DDL per dialect and Cozo `:create`
//!
//! # Type Mapping
//!
//! | Field type | SQLite | PostgreSQL | Cozo |
//! |------------|--------|------------|------|
//! | string | TEXT | TEXT | Any? |
//! | number | REAL | DOUBLE PRECISION | Any? |
//! | boolean | INTEGER | BOOLEAN | Any? |
//! | date | TEXT | TIMESTAMPTZ | Any? |
//! | json | TEXT | JSONB | Any? |
//! | string[] / number[] | TEXT | TEXT | Any? |

pub mod compilers;
mod definition;
mod registry;
mod tables;

pub use definition::{
    Conversion, DefaultGenerator, DefaultValue, FieldAttribute, FieldType, IndexDefinition,
    OnDelete, Reference, Schema, Table, Transform, ID_FIELD,
};
pub use registry::{ModelOverride, SchemaOptions, SchemaRegistry};
pub use tables::builtin_tables;
