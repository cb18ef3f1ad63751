use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::schema::TableMetadata;
use crate::value::CellValue;

/// A synthesized row, validated against table metadata at construction.
///
/// Construction is the checked step: every non-identity column must be
/// present, values must conform to the declared column kind, and `Null` is
/// only accepted for nullable columns or foreign-key columns (whose values
/// are deferred to the integrity resolver).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRow {
    values: BTreeMap<String, CellValue>,
}

impl GeneratedRow {
    pub fn build(table: &TableMetadata, values: BTreeMap<String, CellValue>) -> Result<Self> {
        for name in values.keys() {
            if table.column(name).is_none() {
                return Err(Error::InvalidRow(format!(
                    "unknown column {}.{}",
                    table.name, name
                )));
            }
        }

        for column in &table.columns {
            if column.is_identity {
                if values.contains_key(&column.name) {
                    return Err(Error::InvalidRow(format!(
                        "identity column {}.{} must not be generated",
                        table.name, column.name
                    )));
                }
                continue;
            }

            let value = values.get(&column.name).ok_or_else(|| {
                Error::InvalidRow(format!("missing column {}.{}", table.name, column.name))
            })?;

            if value.is_null() {
                let deferred_fk = table.foreign_key_for(&column.name).is_some();
                if !column.is_nullable && !deferred_fk {
                    return Err(Error::InvalidRow(format!(
                        "null value for non-nullable column {}.{}",
                        table.name, column.name
                    )));
                }
                continue;
            }

            if !value.conforms_to(column.kind) {
                return Err(Error::InvalidRow(format!(
                    "value {:?} does not conform to {:?} for {}.{}",
                    value, column.kind, table.name, column.name
                )));
            }
        }

        Ok(Self { values })
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// Overwrite a column value. Used by the integrity resolver when wiring
    /// foreign keys in both passes; the replacement is already coerced to the
    /// column's declared kind.
    pub fn set(&mut self, column: &str, value: CellValue) {
        self.values.insert(column.to_string(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.values.iter()
    }
}
