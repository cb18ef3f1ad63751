use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::TableMetadata;

/// Validate internal consistency of an introspected catalog.
///
/// This checks:
/// - duplicate table/column names
/// - tables with zero columns
/// - primary key and unique columns exist
/// - foreign key columns exist and reference a primary or unique key of an
///   existing table
pub fn validate_tables(tables: &[TableMetadata]) -> Result<()> {
    let mut names = BTreeSet::new();
    for table in tables {
        if !names.insert(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }

        if table.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table {} has zero columns",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }

        for key in table.primary_key.iter().chain(table.unique_columns.iter()) {
            if !columns.contains(key.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "key column not found: {}.{}",
                    table.name, key
                )));
            }
        }
    }

    for table in tables {
        for fk in &table.foreign_keys {
            if table.column(&fk.column).is_none() {
                return Err(Error::InvalidSchema(format!(
                    "foreign key column not found: {}.{}",
                    table.name, fk.column
                )));
            }

            let referenced = tables
                .iter()
                .find(|candidate| candidate.name == fk.referenced_table)
                .ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "referenced table not found: {} (from {}.{})",
                        fk.referenced_table, table.name, fk.column
                    ))
                })?;

            if !referenced.is_key_column(&fk.referenced_column) {
                return Err(Error::InvalidSchema(format!(
                    "referenced column is not a primary or unique key: {}.{}",
                    fk.referenced_table, fk.referenced_column
                )));
            }
        }
    }

    Ok(())
}
