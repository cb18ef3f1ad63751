use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Categorical column type the synthesis pipeline understands.
///
/// Catalog adapters normalize native database types into this set;
/// unrecognized native types map to [`ColumnKind::Text`] with a conservative
/// maximum length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Decimal,
    Text,
    Timestamp,
    Uuid,
    Boolean,
}

/// Column metadata for a table in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: ColumnKind,
    /// Declared maximum length for text columns.
    pub max_length: Option<i32>,
    pub is_nullable: bool,
    /// System-assigned column; never generated, never inserted.
    pub is_identity: bool,
    /// Unbounded text column routed to the natural-language producer.
    pub is_free_text: bool,
}

/// A foreign key reference from one column to a key column of another table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Table metadata as read from the schema source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    /// Primary key columns in declaration order.
    pub primary_key: Vec<String>,
    /// Columns covered by single-column unique constraints.
    pub unique_columns: BTreeSet<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyRef> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Whether a column must be unique within the table (PK or unique).
    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|column| column == name) || self.unique_columns.contains(name)
    }
}
