use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use rowforge_core::{
    CellValue, ColumnKind, Destination, Error, GeneratedRow, Result, SchemaSource, TableMetadata,
    population_order, validate_tables,
};

use crate::integrity::IntegrityResolver;
use crate::report::{RunReport, TableOutcome};
use crate::synth::{SynthesisEngine, hash_seed, truncate_to};
use crate::text::{TextProducer, TextPrompt, TextRequest, TextResolver};

/// Options for a population run.
#[derive(Debug, Clone)]
pub struct PopulateOptions {
    /// Rows to synthesize per table.
    pub rows_per_table: u64,
    /// Run seed; per-table RNG streams are derived from it.
    pub seed: u64,
    /// Only populate the named tables (parents included implicitly by the
    /// catalog; validation still covers the whole schema).
    pub tables: Option<Vec<String>>,
    /// Bounded worker pool for the text producer.
    pub text_workers: usize,
    /// Per-call timeout for the text producer.
    pub text_timeout: Duration,
    /// Token budget hint passed to the text producer.
    pub text_max_tokens: u32,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            rows_per_table: 10,
            seed: 0,
            tables: None,
            text_workers: 4,
            text_timeout: Duration::from_secs(20),
            text_max_tokens: 64,
        }
    }
}

/// Sequences a full population run: relax foreign-key constraints, order
/// tables, synthesize and load each one, then restore the constraints.
pub struct Orchestrator<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    options: PopulateOptions,
    producer: Option<Arc<dyn TextProducer>>,
}

impl<'a, S: SchemaSource + ?Sized, D: Destination + ?Sized> Orchestrator<'a, S, D> {
    pub fn new(source: &'a S, destination: &'a D, options: PopulateOptions) -> Self {
        Self {
            source,
            destination,
            options,
            producer: None,
        }
    }

    /// Attach a natural-language value producer for free-text columns.
    pub fn with_text_producer(mut self, producer: Arc<dyn TextProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub async fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = RunReport::new(run_id.clone(), self.options.seed);

        // Schema fetch failures are fatal; nothing can proceed without
        // metadata.
        let mut tables = self.source.fetch_tables().await?;
        validate_tables(&tables)?;
        if let Some(selected) = &self.options.tables {
            tables.retain(|table| selected.iter().any(|name| name == &table.name));
        }

        let order = population_order(&tables);
        if order.is_deferred() {
            warn!("cyclic foreign-key dependency detected, falling back to declaration order with all foreign keys deferred");
            report.deferred_order = true;
        }

        info!(
            run_id = %run_id,
            tables = tables.len(),
            rows_per_table = self.options.rows_per_table,
            deferred = order.is_deferred(),
            seed = self.options.seed,
            "population started"
        );

        // Destination schema creation is fatal per table: later tables
        // reference the missing parent.
        for name in order.tables() {
            let table = lookup(&tables, name)?;
            self.destination.create_table(table).await?;
        }

        let relaxed = self.relax_foreign_keys(&tables, &mut report).await;

        let resolver = IntegrityResolver::new(self.destination);
        let text_resolver = self.producer.as_ref().map(|producer| {
            TextResolver::new(
                Arc::clone(producer),
                self.options.text_workers,
                self.options.text_timeout,
            )
        });

        // First pass over all tables: synthesize and insert with deferred
        // foreign keys nulled. Buffers are kept until the repair pass so a
        // cyclic pair can be wired once both sides exist.
        let mut batches: Vec<(String, Vec<GeneratedRow>, TableOutcome)> = Vec::new();
        for name in order.tables() {
            let table = lookup(&tables, name)?;
            let mut outcome = TableOutcome::new(name, self.options.rows_per_table);

            // Per-table RNG stream: reordering or filtering other tables does
            // not shift this table's values.
            let mut engine = SynthesisEngine::new(hash_seed(self.options.seed, name));
            self.seed_key_counters(table, &mut engine).await?;

            let mut rows = Vec::with_capacity(self.options.rows_per_table as usize);
            for index in 0..self.options.rows_per_table {
                rows.push(engine.generate(table, index)?);
            }

            if let Some(text_resolver) = &text_resolver {
                self.produce_free_text(table, &mut rows, text_resolver, &mut outcome)
                    .await;
            }

            let inserted = resolver
                .insert_pass(table, rows, order.is_deferred(), &mut outcome)
                .await?;
            info!(
                table = %name,
                rows_inserted = outcome.rows_inserted,
                insert_failures = outcome.insert_failures,
                "table inserted"
            );
            batches.push((name.clone(), inserted, outcome));
        }

        // Second pass: every parent table is populated now, back-fill the
        // deferred foreign keys.
        for (name, mut inserted, mut outcome) in batches {
            let table = lookup(&tables, &name)?;
            resolver
                .repair_pass(table, &mut inserted, order.is_deferred(), &mut outcome)
                .await?;
            info!(
                table = %name,
                backfill_failures = outcome.backfill_failures,
                "foreign keys repaired"
            );
            report.tables.push(outcome);
        }

        self.restore_foreign_keys(&relaxed, &mut report).await;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            rows_inserted = report.rows_inserted_total(),
            duration_ms = report.duration_ms,
            "population finished"
        );
        Ok(report)
    }

    /// Widen every foreign-key column to nullable so the two-pass loader can
    /// insert nulls first. Returns the columns that were originally NOT NULL
    /// and must be re-tightened after the run.
    async fn relax_foreign_keys(
        &self,
        tables: &[TableMetadata],
        report: &mut RunReport,
    ) -> Vec<(String, String)> {
        let mut relaxed = Vec::new();
        for table in tables {
            for fk in &table.foreign_keys {
                let Some(column) = table.column(&fk.column) else {
                    continue;
                };
                if column.is_nullable {
                    continue;
                }
                match self
                    .destination
                    .alter_column_nullability(&table.name, &fk.column, true)
                    .await
                {
                    Ok(()) => relaxed.push((table.name.clone(), fk.column.clone())),
                    Err(err) => {
                        warn!(table = %table.name, column = %fk.column, error = %err, "could not relax NOT NULL constraint");
                        report
                            .relax_warnings
                            .push(format!("{}.{}: {err}", table.name, fk.column));
                    }
                }
            }
        }
        relaxed
    }

    async fn restore_foreign_keys(&self, relaxed: &[(String, String)], report: &mut RunReport) {
        for (table, column) in relaxed {
            if let Err(err) = self
                .destination
                .alter_column_nullability(table, column, false)
                .await
            {
                warn!(table = %table, column = %column, error = %err, "could not restore NOT NULL constraint");
                report
                    .restore_warnings
                    .push(format!("{table}.{column}: {err}"));
            }
        }
    }

    /// Seed integer key counters from the destination's current maxima so
    /// generated keys stay disjoint from pre-existing rows.
    async fn seed_key_counters(
        &self,
        table: &TableMetadata,
        engine: &mut SynthesisEngine,
    ) -> Result<()> {
        for column in &table.columns {
            if column.is_identity || column.kind != ColumnKind::Integer {
                continue;
            }
            if !table.is_key_column(&column.name) {
                continue;
            }
            // Composite key components use index-derived offsets instead.
            if table.primary_key.len() > 1 && table.primary_key.contains(&column.name) {
                continue;
            }
            let max = self
                .destination
                .max_integer(&table.name, &column.name)
                .await?;
            engine.seed_key_counter(&table.name, &column.name, max);
        }
        Ok(())
    }

    /// Replace heuristic fallback values on free-text columns with produced
    /// text where the producer succeeds; failures keep the fallback.
    async fn produce_free_text(
        &self,
        table: &TableMetadata,
        rows: &mut [GeneratedRow],
        resolver: &TextResolver,
        outcome: &mut TableOutcome,
    ) {
        let mut requests = Vec::new();
        let mut slots = Vec::new();
        for column in &table.columns {
            let eligible = column.is_free_text
                && column.kind == ColumnKind::Text
                && !column.is_identity
                && !table.is_key_column(&column.name)
                && table.foreign_key_for(&column.name).is_none();
            if !eligible {
                continue;
            }
            for row_index in 0..rows.len() {
                requests.push(TextRequest {
                    row_index,
                    prompt: TextPrompt {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        max_length: column.max_length,
                        max_tokens: self.options.text_max_tokens,
                    },
                });
                slots.push((row_index, column.name.clone(), column.max_length));
            }
        }
        if requests.is_empty() {
            return;
        }

        let resolved = resolver.resolve(&requests).await;
        for ((row_index, column, max_length), value) in slots.into_iter().zip(resolved) {
            match value {
                Some(mut text) => {
                    truncate_to(&mut text, max_length);
                    rows[row_index].set(&column, CellValue::Text(text));
                }
                None => outcome.text_fallbacks += 1,
            }
        }
    }
}

fn lookup<'a>(tables: &'a [TableMetadata], name: &str) -> Result<&'a TableMetadata> {
    tables
        .iter()
        .find(|table| table.name == name)
        .ok_or_else(|| Error::InvalidSchema(format!("table {name} missing from catalog")))
}
