//! Postgres implementation of the schema source and destination store.
//!
//! Catalog reads go through `pg_catalog`/`information_schema` and are
//! normalized into the categorical column model; writes render that model
//! back to DDL/DML.

mod destination;
mod mapper;
mod queries;
mod source;

pub use destination::PostgresDestination;
pub use source::PostgresSource;
