use std::collections::BTreeSet;

use tracing::warn;

use rowforge_core::{ColumnKind, ColumnMetadata, Error, ForeignKeyRef, Result, TableMetadata};

use crate::queries::{RawColumn, RawForeignKey};

/// Fallback length for native types with no categorical mapping; they are
/// carried as bounded text so generated values stay printable.
const UNKNOWN_TEXT_LENGTH: i32 = 255;

/// Normalize a Postgres udt name to a categorical kind. `None` for types
/// without a mapping; the caller falls back to bounded text.
pub fn normalize_kind(udt_name: &str) -> Option<ColumnKind> {
    match udt_name {
        "int2" | "int4" | "int8" => Some(ColumnKind::Integer),
        "numeric" | "float4" | "float8" => Some(ColumnKind::Decimal),
        "varchar" | "bpchar" | "text" | "name" => Some(ColumnKind::Text),
        "timestamp" | "timestamptz" | "date" => Some(ColumnKind::Timestamp),
        "uuid" => Some(ColumnKind::Uuid),
        "bool" => Some(ColumnKind::Boolean),
        _ => None,
    }
}

pub fn map_column(raw: RawColumn) -> ColumnMetadata {
    let (kind, max_length) = match normalize_kind(&raw.udt_name) {
        Some(kind) => (kind, raw.character_max_length),
        None => {
            warn!(
                column = %raw.name,
                udt = %raw.udt_name,
                "no categorical mapping for native type, treating as bounded text"
            );
            (ColumnKind::Text, Some(UNKNOWN_TEXT_LENGTH))
        }
    };

    // Unbounded character columns carry prose rather than codes; route them
    // to the natural-language producer.
    let is_free_text = kind == ColumnKind::Text && max_length.is_none();

    ColumnMetadata {
        name: raw.name,
        kind,
        max_length,
        is_nullable: raw.is_nullable,
        is_identity: raw.is_identity || raw.has_sequence_default,
        is_free_text,
    }
}

pub fn map_table(
    name: String,
    columns: Vec<RawColumn>,
    primary_key: Vec<String>,
    unique_columns: Vec<String>,
    foreign_keys: Vec<RawForeignKey>,
) -> Result<TableMetadata> {
    if columns.is_empty() {
        return Err(Error::Introspection(format!(
            "table {name} has zero columns"
        )));
    }

    let foreign_keys = foreign_keys
        .into_iter()
        .filter_map(|fk| map_foreign_key(&name, fk))
        .collect();

    Ok(TableMetadata {
        name,
        columns: columns.into_iter().map(map_column).collect(),
        primary_key,
        unique_columns: unique_columns.into_iter().collect::<BTreeSet<_>>(),
        foreign_keys,
    })
}

/// Composite foreign keys have no single parent column to round-robin over;
/// they are skipped with a warning and the column is filled as a plain value.
fn map_foreign_key(table: &str, raw: RawForeignKey) -> Option<ForeignKeyRef> {
    if raw.columns.len() != 1 || raw.referenced_columns.len() != 1 {
        warn!(
            table = %table,
            constraint = %raw.name,
            "composite foreign key is not wired, columns filled independently"
        );
        return None;
    }
    Some(ForeignKeyRef {
        column: raw.columns.into_iter().next()?,
        referenced_table: raw.referenced_table,
        referenced_column: raw.referenced_columns.into_iter().next()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, udt: &str) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            udt_name: udt.to_string(),
            is_nullable: true,
            is_identity: false,
            has_sequence_default: false,
            character_max_length: None,
        }
    }

    #[test]
    fn integer_family_maps_to_integer() {
        for udt in ["int2", "int4", "int8"] {
            assert_eq!(normalize_kind(udt), Some(ColumnKind::Integer));
        }
    }

    #[test]
    fn unknown_type_falls_back_to_bounded_text() {
        let column = map_column(raw("payload", "jsonb"));
        assert_eq!(column.kind, ColumnKind::Text);
        assert_eq!(column.max_length, Some(255));
        assert!(!column.is_free_text);
    }

    #[test]
    fn unbounded_text_is_flagged_free_text() {
        let column = map_column(raw("bio", "text"));
        assert_eq!(column.kind, ColumnKind::Text);
        assert!(column.is_free_text);

        let mut bounded = raw("code", "varchar");
        bounded.character_max_length = Some(16);
        assert!(!map_column(bounded).is_free_text);
    }

    #[test]
    fn serial_default_counts_as_identity() {
        let mut column = raw("id", "int4");
        column.has_sequence_default = true;
        assert!(map_column(column).is_identity);
    }

    #[test]
    fn composite_foreign_keys_are_skipped() {
        let table = map_table(
            "grant".to_string(),
            vec![raw("user_id", "int4"), raw("role_id", "int4")],
            vec![],
            vec![],
            vec![RawForeignKey {
                name: "grant_pair_fk".to_string(),
                columns: vec!["user_id".to_string(), "role_id".to_string()],
                referenced_table: "membership".to_string(),
                referenced_columns: vec!["user_id".to_string(), "role_id".to_string()],
            }],
        )
        .unwrap();
        assert!(table.foreign_keys.is_empty());
    }

    #[test]
    fn zero_column_table_is_an_introspection_error() {
        let result = map_table("ghost".to_string(), vec![], vec![], vec![], vec![]);
        assert!(matches!(result, Err(Error::Introspection(_))));
    }
}
