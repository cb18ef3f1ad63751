use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Utc};
use fake::Fake;
use fake::faker::lorem::en::{Sentence, Word};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use rowforge_core::{CellValue, ColumnKind, ColumnMetadata, GeneratedRow, Result, TableMetadata};

use crate::ledger::UniquenessLedger;

const KEY_SUFFIX_RETRIES: u32 = 16;

/// Column-by-column value synthesis for one run.
///
/// Policy per column, in priority order: identity columns are skipped,
/// primary/unique keys are drawn through the uniqueness ledger, foreign keys
/// get a NULL placeholder for the integrity resolver, everything else is
/// dispatched on its categorical kind. Free-text columns receive a heuristic
/// phrase here; the orchestrator may later overwrite it with a produced text.
pub struct SynthesisEngine {
    rng: ChaCha8Rng,
    ledger: UniquenessLedger,
    base: NaiveDateTime,
}

impl SynthesisEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ledger: UniquenessLedger::new(),
            base: Utc::now().naive_utc(),
        }
    }

    /// Seed the integer key counter for a column from the destination's
    /// current maximum.
    pub fn seed_key_counter(&mut self, table: &str, column: &str, existing_max: Option<i64>) {
        self.ledger.seed_counter(table, column, existing_max);
    }

    /// Synthesize one row for `table`.
    ///
    /// Never fails for a single column: fallback values are substituted and
    /// synthesis continues. The returned row has passed checked construction
    /// against the table metadata.
    pub fn generate(&mut self, table: &TableMetadata, row_index: u64) -> Result<GeneratedRow> {
        let mut values = BTreeMap::new();

        for column in &table.columns {
            if column.is_identity {
                continue;
            }

            let value = if table.foreign_key_for(&column.name).is_some() {
                CellValue::Null
            } else if table.is_key_column(&column.name) {
                self.key_value(table, column, row_index)
            } else {
                self.plain_value(column)
            };

            values.insert(column.name.clone(), value);
        }

        GeneratedRow::build(table, values)
    }

    fn key_value(
        &mut self,
        table: &TableMetadata,
        column: &ColumnMetadata,
        row_index: u64,
    ) -> CellValue {
        match column.kind {
            ColumnKind::Integer => {
                // Composite keys spread the row index across components with
                // a per-position offset so the tuple stays unique even when a
                // single component repeats.
                if let Some(position) = composite_position(table, &column.name) {
                    CellValue::Int(row_index as i64 + 1 + position as i64 * 10_000)
                } else {
                    CellValue::Int(self.ledger.next_integer(&table.name, &column.name))
                }
            }
            ColumnKind::Uuid => CellValue::Uuid(uuid::Uuid::new_v4().to_string()),
            ColumnKind::Text => {
                CellValue::Text(self.templated_key(table, column, row_index))
            }
            ColumnKind::Decimal => {
                CellValue::Float(self.ledger.next_integer(&table.name, &column.name) as f64)
            }
            ColumnKind::Timestamp => {
                CellValue::Timestamp(self.base + Duration::seconds(row_index as i64))
            }
            ColumnKind::Boolean => CellValue::Bool(row_index % 2 == 1),
        }
    }

    /// `{table}_{column}_{row_index}_{suffix}` with a random suffix to avoid
    /// collisions across runs, truncated to the declared maximum length.
    fn templated_key(
        &mut self,
        table: &TableMetadata,
        column: &ColumnMetadata,
        row_index: u64,
    ) -> String {
        for _ in 0..KEY_SUFFIX_RETRIES {
            let suffix: u32 = self.rng.random_range(1000..=9999);
            let mut value = format!("{}_{}_{}_{}", table.name, column.name, row_index, suffix);
            truncate_to(&mut value, column.max_length);
            if self.ledger.record(&table.name, &column.name, &value) {
                return value;
            }
        }
        // Short columns can exhaust the suffix space; fall back to the row
        // index alone, which is unique within the run.
        let mut value = format!("{}_{}", column.name, row_index);
        truncate_to(&mut value, column.max_length);
        self.ledger.record(&table.name, &column.name, &value);
        value
    }

    fn plain_value(&mut self, column: &ColumnMetadata) -> CellValue {
        match column.kind {
            ColumnKind::Integer => CellValue::Int(self.rng.random_range(1..=1000)),
            ColumnKind::Decimal => {
                let raw: f64 = self.rng.random_range(1.0..=1000.0);
                CellValue::Float((raw * 100.0).round() / 100.0)
            }
            ColumnKind::Boolean => CellValue::Bool(self.rng.random_bool(0.5)),
            ColumnKind::Timestamp => {
                let days: i64 = self.rng.random_range(0..365);
                let seconds: i64 = self.rng.random_range(0..86_400);
                CellValue::Timestamp(self.base - Duration::days(days) - Duration::seconds(seconds))
            }
            ColumnKind::Uuid => CellValue::Uuid(uuid::Uuid::new_v4().to_string()),
            ColumnKind::Text => {
                let mut value: String = if column.is_free_text {
                    Sentence(3..8).fake_with_rng(&mut self.rng)
                } else {
                    Word().fake_with_rng(&mut self.rng)
                };
                truncate_to(&mut value, column.max_length);
                CellValue::Text(value)
            }
        }
    }
}

/// Position of a column within a composite primary key; `None` for
/// single-column keys or non-PK columns.
fn composite_position(table: &TableMetadata, column: &str) -> Option<usize> {
    if table.primary_key.len() < 2 {
        return None;
    }
    table.primary_key.iter().position(|name| name == column)
}

/// Truncate a string to a declared maximum length, on a char boundary.
pub fn truncate_to(value: &mut String, max_length: Option<i32>) {
    if let Some(max) = max_length {
        let max = max.max(0) as usize;
        if value.chars().count() > max {
            *value = value.chars().take(max).collect();
        }
    }
}

/// Derive a per-table seed from the run seed so each table gets a
/// deterministic yet decorrelated RNG stream.
pub fn hash_seed(run_seed: u64, salt: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(run_seed.to_le_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use rowforge_core::ForeignKeyRef;

    fn column(name: &str, kind: ColumnKind) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            kind,
            max_length: None,
            is_nullable: true,
            is_identity: false,
            is_free_text: false,
        }
    }

    #[test]
    fn integer_keys_strictly_increase_from_seeded_max() {
        let table = TableMetadata {
            name: "emp".to_string(),
            columns: vec![column("id", ColumnKind::Integer)],
            primary_key: vec!["id".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys: Vec::new(),
        };
        let mut engine = SynthesisEngine::new(7);
        engine.seed_key_counter("emp", "id", Some(100));

        let mut previous = 100;
        for index in 0..5 {
            let row = engine.generate(&table, index).unwrap();
            let id = row.get("id").and_then(CellValue::as_i64).unwrap();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn composite_key_tuples_are_unique() {
        let table = TableMetadata {
            name: "grant".to_string(),
            columns: vec![
                column("user_id", ColumnKind::Integer),
                column("role_id", ColumnKind::Integer),
            ],
            primary_key: vec!["user_id".to_string(), "role_id".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys: Vec::new(),
        };
        let mut engine = SynthesisEngine::new(7);

        let mut seen = BTreeSet::new();
        for index in 0..50 {
            let row = engine.generate(&table, index).unwrap();
            let tuple = (
                row.get("user_id").and_then(CellValue::as_i64).unwrap(),
                row.get("role_id").and_then(CellValue::as_i64).unwrap(),
            );
            assert!(seen.insert(tuple), "duplicate key tuple {tuple:?}");
        }
    }

    #[test]
    fn foreign_keys_get_null_placeholder() {
        let table = TableMetadata {
            name: "emp".to_string(),
            columns: vec![column("id", ColumnKind::Integer), column("org_id", ColumnKind::Integer)],
            primary_key: vec!["id".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys: vec![ForeignKeyRef {
                column: "org_id".to_string(),
                referenced_table: "org".to_string(),
                referenced_column: "id".to_string(),
            }],
        };
        let mut engine = SynthesisEngine::new(7);
        let row = engine.generate(&table, 0).unwrap();
        assert!(row.get("org_id").unwrap().is_null());
    }

    #[test]
    fn text_values_truncated_to_max_length() {
        let mut code = column("code", ColumnKind::Text);
        code.max_length = Some(8);
        let table = TableMetadata {
            name: "t".to_string(),
            columns: vec![column("id", ColumnKind::Integer), code],
            primary_key: vec!["id".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys: Vec::new(),
        };
        let mut engine = SynthesisEngine::new(7);
        for index in 0..10 {
            let row = engine.generate(&table, index).unwrap();
            let value = row.get("code").and_then(CellValue::as_str).unwrap();
            assert!(value.chars().count() <= 8);
        }
    }

    #[test]
    fn templated_text_keys_stay_unique() {
        let table = TableMetadata {
            name: "t".to_string(),
            columns: vec![column("code", ColumnKind::Text)],
            primary_key: vec!["code".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys: Vec::new(),
        };
        let mut engine = SynthesisEngine::new(7);
        let mut seen = BTreeSet::new();
        for index in 0..40 {
            let row = engine.generate(&table, index).unwrap();
            let value = row.get("code").and_then(CellValue::as_str).unwrap().to_string();
            assert!(seen.insert(value));
        }
    }

    #[test]
    fn hash_seed_differs_per_table() {
        assert_ne!(hash_seed(1, "org"), hash_seed(1, "emp"));
        assert_eq!(hash_seed(1, "org"), hash_seed(1, "org"));
    }
}
