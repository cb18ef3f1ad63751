#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use rowforge_core::{
    CellValue, ColumnKind, ColumnMetadata, Destination, Error, ForeignKeyRef, GeneratedRow, Result,
    SchemaSource, TableMetadata,
};

pub fn column(name: &str, kind: ColumnKind, nullable: bool) -> ColumnMetadata {
    ColumnMetadata {
        name: name.to_string(),
        kind,
        max_length: None,
        is_nullable: nullable,
        is_identity: false,
        is_free_text: false,
    }
}

pub fn fk(column: &str, table: &str, referenced: &str) -> ForeignKeyRef {
    ForeignKeyRef {
        column: column.to_string(),
        referenced_table: table.to_string(),
        referenced_column: referenced.to_string(),
    }
}

pub fn table(
    name: &str,
    columns: Vec<ColumnMetadata>,
    primary_key: &[&str],
    foreign_keys: Vec<ForeignKeyRef>,
) -> TableMetadata {
    TableMetadata {
        name: name.to_string(),
        columns,
        primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
        unique_columns: BTreeSet::new(),
        foreign_keys,
    }
}

/// In-memory schema source returning a fixed catalog.
pub struct MemorySource {
    pub tables: Vec<TableMetadata>,
}

#[async_trait]
impl SchemaSource for MemorySource {
    async fn fetch_tables(&self) -> Result<Vec<TableMetadata>> {
        Ok(self.tables.clone())
    }
}

#[derive(Default)]
struct StoredTable {
    meta: Option<TableMetadata>,
    rows: Vec<BTreeMap<String, CellValue>>,
    widened: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, StoredTable>,
    alter_log: Vec<(String, String, bool)>,
    fail_next_inserts: usize,
}

/// In-memory destination store enforcing NOT NULL the way a live database
/// would, with an alter log for constraint relax/restore assertions.
#[derive(Default)]
pub struct MemoryDestination {
    state: Mutex<State>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load rows, as if from a previous run.
    pub fn seed_rows(&self, table: &str, rows: Vec<BTreeMap<String, CellValue>>) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(table.to_string()).or_default().rows = rows;
    }

    pub fn fail_next_inserts(&self, count: usize) {
        self.state.lock().unwrap().fail_next_inserts = count;
    }

    pub fn rows(&self, table: &str) -> Vec<BTreeMap<String, CellValue>> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(table)
            .map(|stored| stored.rows.clone())
            .unwrap_or_default()
    }

    pub fn alter_log(&self) -> Vec<(String, String, bool)> {
        self.state.lock().unwrap().alter_log.clone()
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn create_table(&self, table: &TableMetadata) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state.tables.entry(table.name.clone()).or_default();
        stored.meta = Some(table.clone());
        Ok(())
    }

    async fn insert_row(&self, table: &TableMetadata, row: &GeneratedRow) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_inserts > 0 {
            state.fail_next_inserts -= 1;
            return Err(Error::Destination("simulated insert failure".to_string()));
        }

        let stored = state
            .tables
            .get(&table.name)
            .ok_or_else(|| Error::Destination(format!("no such table {}", table.name)))?;

        let mut values: BTreeMap<String, CellValue> = BTreeMap::new();
        for column in &table.columns {
            if column.is_identity {
                // The store assigns identity keys itself.
                let next = stored
                    .rows
                    .iter()
                    .filter_map(|r| r.get(&column.name).and_then(CellValue::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                values.insert(column.name.clone(), CellValue::Int(next));
                continue;
            }
            let value = row.get(&column.name).cloned().unwrap_or(CellValue::Null);
            if value.is_null() && !column.is_nullable && !stored.widened.contains(&column.name) {
                return Err(Error::Destination(format!(
                    "NOT NULL violation on {}.{}",
                    table.name, column.name
                )));
            }
            values.insert(column.name.clone(), value);
        }

        let stored = state.tables.get_mut(&table.name).expect("checked above");
        stored.rows.push(values);
        Ok(())
    }

    async fn update_foreign_key(
        &self,
        table: &TableMetadata,
        fk_column: &str,
        key: &[(String, CellValue)],
        value: &CellValue,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .tables
            .get_mut(&table.name)
            .ok_or_else(|| Error::Destination(format!("no such table {}", table.name)))?;
        let row = stored
            .rows
            .iter_mut()
            .find(|row| {
                key.iter()
                    .all(|(column, expected)| row.get(column) == Some(expected))
            })
            .ok_or_else(|| {
                Error::Destination(format!("no row matching key in {}", table.name))
            })?;
        row.insert(fk_column.to_string(), value.clone());
        Ok(())
    }

    async fn alter_column_nullability(
        &self,
        table: &str,
        column: &str,
        nullable: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .alter_log
            .push((table.to_string(), column.to_string(), nullable));
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::Destination(format!("no such table {table}")))?;
        if nullable {
            stored.widened.insert(column.to_string());
        } else {
            stored.widened.remove(column);
        }
        Ok(())
    }

    async fn key_values(
        &self,
        table: &str,
        column: &str,
        _kind: ColumnKind,
    ) -> Result<Vec<CellValue>> {
        let state = self.state.lock().unwrap();
        let stored = state
            .tables
            .get(table)
            .ok_or_else(|| Error::Destination(format!("no such table {table}")))?;
        Ok(stored
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|value| !value.is_null())
            .cloned()
            .collect())
    }

    async fn max_integer(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let state = self.state.lock().unwrap();
        let Some(stored) = state.tables.get(table) else {
            return Ok(None);
        };
        Ok(stored
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(CellValue::as_i64))
            .max())
    }
}
