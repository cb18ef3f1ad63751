//! Synthetic population pipeline for Rowforge.
//!
//! This crate turns an introspected catalog into rows in a destination
//! store: the value synthesis engine builds type- and key-conforming rows,
//! the integrity resolver wires foreign keys with a two-pass insert/repair,
//! and the orchestrator sequences tables in dependency order while relaxing
//! and restoring NOT NULL constraints on foreign-key columns.

pub mod engine;
pub mod integrity;
pub mod ledger;
pub mod report;
pub mod synth;
pub mod text;

pub use engine::{Orchestrator, PopulateOptions};
pub use integrity::{IntegrityResolver, TablePhase};
pub use ledger::UniquenessLedger;
pub use report::{RunReport, TableOutcome};
pub use synth::SynthesisEngine;
pub use text::{TextError, TextProducer, TextPrompt, TextResolver};
