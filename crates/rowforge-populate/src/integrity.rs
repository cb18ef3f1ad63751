use serde::{Deserialize, Serialize};
use tracing::warn;

use rowforge_core::{
    CellValue, ColumnKind, ColumnMetadata, Destination, GeneratedRow, Result, TableMetadata,
};

use crate::report::TableOutcome;

/// Lifecycle of one table inside the integrity resolver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TablePhase {
    Draft,
    Inserted,
    Repaired,
}

/// Two-pass loader that keeps foreign keys valid without deferred-constraint
/// support from the destination store.
///
/// Pass one inserts rows with deferred foreign keys nulled (non-nullable ones
/// get a live parent key round-robin, or a typed placeholder when the parent
/// is still empty). Pass two re-fetches parent keys and back-fills the
/// deferred columns row by row. In `deferred` mode (cyclic dependency graph)
/// every foreign key is treated as deferred regardless of nullability; the
/// orchestrator has already widened those columns to nullable.
pub struct IntegrityResolver<'a, D: Destination + ?Sized> {
    destination: &'a D,
}

impl<'a, D: Destination + ?Sized> IntegrityResolver<'a, D> {
    pub fn new(destination: &'a D) -> Self {
        Self { destination }
    }

    /// Run both passes back to back for one table. Correct whenever the
    /// referenced tables are already populated; the orchestrator instead runs
    /// the passes in two separate loops so cyclic pairs repair cleanly.
    pub async fn populate(
        &self,
        table: &TableMetadata,
        rows: Vec<GeneratedRow>,
        deferred: bool,
        outcome: &mut TableOutcome,
    ) -> Result<Vec<GeneratedRow>> {
        let mut inserted = self.insert_pass(table, rows, deferred, outcome).await?;
        self.repair_pass(table, &mut inserted, deferred, outcome).await?;
        Ok(inserted)
    }

    /// Draft -> Inserted.
    pub async fn insert_pass(
        &self,
        table: &TableMetadata,
        mut rows: Vec<GeneratedRow>,
        deferred: bool,
        outcome: &mut TableOutcome,
    ) -> Result<Vec<GeneratedRow>> {
        for fk in &table.foreign_keys {
            let Some(column) = table.column(&fk.column) else {
                continue;
            };

            if deferred || column.is_nullable {
                for row in rows.iter_mut() {
                    row.set(&fk.column, CellValue::Null);
                }
                continue;
            }

            // Non-nullable in ordered mode: parents are already populated,
            // wire them now so pass one satisfies the constraint. A parent
            // excluded from the run (table filter) has no destination table;
            // that is recoverable, placeholders stand in.
            let parents = match self
                .destination
                .key_values(&fk.referenced_table, &fk.referenced_column, column.kind)
                .await
            {
                Ok(parents) => {
                    if parents.is_empty() {
                        warn!(
                            table = %table.name,
                            column = %fk.column,
                            parent = %fk.referenced_table,
                            "referenced table is empty, using synthesized placeholder keys"
                        );
                    }
                    parents
                }
                Err(err) => {
                    warn!(
                        table = %table.name,
                        column = %fk.column,
                        parent = %fk.referenced_table,
                        error = %err,
                        "parent keys unavailable, using synthesized placeholder keys"
                    );
                    Vec::new()
                }
            };
            for (index, row) in rows.iter_mut().enumerate() {
                let value = match parents.is_empty() {
                    true => placeholder_key(table, column, index),
                    false => parents[index % parents.len()]
                        .coerce_to(column.kind)
                        .unwrap_or_else(|| placeholder_key(table, column, index)),
                };
                row.set(&fk.column, value);
            }
        }

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            match self.destination.insert_row(table, &row).await {
                Ok(()) => {
                    outcome.rows_inserted += 1;
                    inserted.push(row);
                }
                Err(err) => {
                    warn!(table = %table.name, error = %err, "row insert failed");
                    outcome.insert_failures += 1;
                }
            }
        }

        outcome.phase = TablePhase::Inserted;
        Ok(inserted)
    }

    /// Inserted -> Repaired. Back-fills deferred foreign keys from a fresh
    /// parent key snapshot; deterministic round-robin by insertion index, so
    /// repeating the pass with the same snapshot yields the same assignment.
    pub async fn repair_pass(
        &self,
        table: &TableMetadata,
        rows: &mut [GeneratedRow],
        deferred: bool,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        for fk in &table.foreign_keys {
            let Some(column) = table.column(&fk.column) else {
                continue;
            };
            // Non-nullable keys were wired in pass one and are never
            // revisited here.
            if !(deferred || column.is_nullable) {
                continue;
            }

            let parents = match self
                .destination
                .key_values(&fk.referenced_table, &fk.referenced_column, column.kind)
                .await
            {
                Ok(parents) => parents,
                Err(err) => {
                    warn!(
                        table = %table.name,
                        column = %fk.column,
                        parent = %fk.referenced_table,
                        error = %err,
                        "parent keys unavailable, leaving nulls"
                    );
                    continue;
                }
            };
            if parents.is_empty() {
                warn!(
                    table = %table.name,
                    column = %fk.column,
                    parent = %fk.referenced_table,
                    "no parent keys to back-fill, leaving nulls"
                );
                continue;
            }

            let keys = self.row_keys(table, rows).await?;
            for (index, row) in rows.iter_mut().enumerate() {
                let Some(key) = keys.get(index).and_then(|key| key.as_ref()) else {
                    outcome.backfill_failures += 1;
                    continue;
                };
                let Some(value) = parents[index % parents.len()].coerce_to(column.kind) else {
                    warn!(
                        table = %table.name,
                        column = %fk.column,
                        "parent key cannot be cast to foreign key kind"
                    );
                    outcome.backfill_failures += 1;
                    continue;
                };
                match self
                    .destination
                    .update_foreign_key(table, &fk.column, key, &value)
                    .await
                {
                    Ok(()) => row.set(&fk.column, value),
                    Err(err) => {
                        warn!(table = %table.name, column = %fk.column, error = %err, "back-fill update failed");
                        outcome.backfill_failures += 1;
                    }
                }
            }
        }

        outcome.phase = TablePhase::Repaired;
        Ok(())
    }

    /// Primary-key predicate per row, in insertion order.
    ///
    /// When the key was generated it comes straight from the row buffer.
    /// Identity keys were assigned by the store, so the single-column case is
    /// re-read in insertion order and aligned by index; a composite identity
    /// key cannot be matched back and yields `None`.
    async fn row_keys(
        &self,
        table: &TableMetadata,
        rows: &[GeneratedRow],
    ) -> Result<Vec<Option<Vec<(String, CellValue)>>>> {
        if table.primary_key.is_empty() {
            warn!(table = %table.name, "table has no primary key, cannot back-fill");
            return Ok(vec![None; rows.len()]);
        }

        let has_identity_key = table
            .primary_key
            .iter()
            .any(|name| table.column(name).is_some_and(|column| column.is_identity));

        if !has_identity_key {
            return Ok(rows
                .iter()
                .map(|row| {
                    table
                        .primary_key
                        .iter()
                        .map(|name| row.get(name).cloned().map(|value| (name.clone(), value)))
                        .collect::<Option<Vec<_>>>()
                })
                .collect());
        }

        if table.primary_key.len() > 1 {
            warn!(table = %table.name, "composite identity key, cannot back-fill");
            return Ok(vec![None; rows.len()]);
        }

        let name = &table.primary_key[0];
        let kind = table.column(name).map_or(ColumnKind::Integer, |c| c.kind);
        let assigned = self.destination.key_values(&table.name, name, kind).await?;
        // The just-inserted batch occupies the tail of the key column.
        let offset = assigned.len().saturating_sub(rows.len());
        Ok((0..rows.len())
            .map(|index| {
                assigned
                    .get(offset + index)
                    .map(|value| vec![(name.clone(), value.clone())])
            })
            .collect())
    }
}

/// Typed placeholder used when a non-nullable foreign key must be written
/// before its parent table has any rows.
fn placeholder_key(table: &TableMetadata, column: &ColumnMetadata, index: usize) -> CellValue {
    match column.kind {
        ColumnKind::Integer => CellValue::Int(1_000_000 + index as i64),
        ColumnKind::Uuid => CellValue::Uuid(uuid::Uuid::new_v4().to_string()),
        _ => {
            let mut value = format!("{}_{}_{}", table.name, column.name, index);
            crate::synth::truncate_to(&mut value, column.max_length);
            CellValue::Text(value)
        }
    }
}
