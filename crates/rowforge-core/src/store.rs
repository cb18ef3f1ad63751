use async_trait::async_trait;

use crate::error::Result;
use crate::row::GeneratedRow;
use crate::schema::{ColumnKind, TableMetadata};
use crate::value::CellValue;

/// Read side: a relational metadata store that can describe its tables.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch metadata for every base table, in declaration order.
    ///
    /// Fails with [`crate::Error::Introspection`] when the metadata store is
    /// unreachable or a table has zero columns.
    async fn fetch_tables(&self) -> Result<Vec<TableMetadata>>;
}

/// Write side: a relational store the generated rows are loaded into.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Create the destination table. Foreign-key constraints are not
    /// re-created; the two-pass loader replaces deferred-constraint support.
    async fn create_table(&self, table: &TableMetadata) -> Result<()>;

    /// Insert one row. Identity columns are absent from the row and left for
    /// the store to assign.
    async fn insert_row(&self, table: &TableMetadata, row: &GeneratedRow) -> Result<()>;

    /// Update a single foreign-key column of the row identified by the
    /// primary-key predicate.
    async fn update_foreign_key(
        &self,
        table: &TableMetadata,
        fk_column: &str,
        key: &[(String, CellValue)],
        value: &CellValue,
    ) -> Result<()>;

    /// Toggle the NOT NULL constraint on a column.
    async fn alter_column_nullability(
        &self,
        table: &str,
        column: &str,
        nullable: bool,
    ) -> Result<()>;

    /// Non-null values of a key column, in insertion order.
    async fn key_values(&self, table: &str, column: &str, kind: ColumnKind)
    -> Result<Vec<CellValue>>;

    /// Current maximum of an integer key column, if any rows exist.
    async fn max_integer(&self, table: &str, column: &str) -> Result<Option<i64>>;
}
