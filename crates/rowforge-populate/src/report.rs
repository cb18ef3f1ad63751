use serde::{Deserialize, Serialize};

use crate::integrity::TablePhase;

/// Per-table outcome of a population run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub rows_requested: u64,
    pub rows_inserted: u64,
    pub insert_failures: u64,
    pub backfill_failures: u64,
    /// Free-text columns that kept their heuristic fallback because the
    /// producer failed or timed out.
    pub text_fallbacks: u64,
    pub phase: TablePhase,
}

impl TableOutcome {
    pub fn new(table: &str, rows_requested: u64) -> Self {
        Self {
            table: table.to_string(),
            rows_requested,
            rows_inserted: 0,
            insert_failures: 0,
            backfill_failures: 0,
            text_fallbacks: 0,
            phase: TablePhase::Draft,
        }
    }
}

/// Report for a full population run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub seed: u64,
    /// True when a foreign-key cycle forced declaration-order population with
    /// every foreign key deferred.
    pub deferred_order: bool,
    pub tables: Vec<TableOutcome>,
    /// Foreign-key columns whose NOT NULL constraint could not be relaxed;
    /// left in their current state.
    pub relax_warnings: Vec<String>,
    /// Foreign-key columns whose NOT NULL constraint could not be restored.
    pub restore_warnings: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(run_id: String, seed: u64) -> Self {
        Self {
            run_id,
            seed,
            deferred_order: false,
            tables: Vec::new(),
            relax_warnings: Vec::new(),
            restore_warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn rows_inserted_total(&self) -> u64 {
        self.tables.iter().map(|outcome| outcome.rows_inserted).sum()
    }
}
