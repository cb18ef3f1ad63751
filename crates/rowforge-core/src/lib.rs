//! Core contracts for Rowforge.
//!
//! This crate defines the catalog model for introspected tables, the typed
//! row/value model used by the synthesis pipeline, the foreign-key dependency
//! resolver, and the traits implemented by schema sources and destination
//! stores.

pub mod error;
pub mod graph;
pub mod row;
pub mod schema;
pub mod store;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use graph::{PopulationOrder, population_order};
pub use row::GeneratedRow;
pub use schema::{ColumnKind, ColumnMetadata, ForeignKeyRef, TableMetadata};
pub use store::{Destination, SchemaSource};
pub use validation::validate_tables;
pub use value::CellValue;
