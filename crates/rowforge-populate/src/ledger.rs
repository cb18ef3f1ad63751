use std::collections::{BTreeMap, BTreeSet};

/// Uniqueness bookkeeping for one synthesis run.
///
/// Integer key columns get a monotonically increasing counter seeded from the
/// destination's current maximum; text and uuid keys record issued values so
/// the engine can detect an accidental repeat. The ledger is owned by the
/// synthesis engine and dropped with it at the end of the run, so no state
/// leaks across runs.
#[derive(Debug, Default)]
pub struct UniquenessLedger {
    counters: BTreeMap<(String, String), i64>,
    issued: BTreeMap<(String, String), BTreeSet<String>>,
}

impl UniquenessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the counter for an integer key column from the destination's
    /// current maximum (`max + 1`, or 1 when the table is empty).
    pub fn seed_counter(&mut self, table: &str, column: &str, existing_max: Option<i64>) {
        let start = existing_max.map_or(1, |max| max + 1);
        self.counters
            .insert((table.to_string(), column.to_string()), start);
    }

    /// Issue the next integer key for a column. Unseeded columns start at 1.
    pub fn next_integer(&mut self, table: &str, column: &str) -> i64 {
        let counter = self
            .counters
            .entry((table.to_string(), column.to_string()))
            .or_insert(1);
        let value = *counter;
        *counter += 1;
        value
    }

    /// Record an issued text/uuid key; returns false when the value was
    /// already issued in this run.
    pub fn record(&mut self, table: &str, column: &str, value: &str) -> bool {
        self.issued
            .entry((table.to_string(), column.to_string()))
            .or_default()
            .insert(value.to_string())
    }
}
