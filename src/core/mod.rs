//! Core corpus processing.
//!
//! This module contains:
//! - Features: differential feature probing against a validator
//! - Enricher: per-artifact metadata from external tools
//! - Filter: ordered, auditable removal steps
//! - Stats and Summary: reports over an index and its path listing

pub mod enricher;
pub mod features;
pub mod filter;
pub mod stats;
pub mod summary;

// Re-export commonly used types
pub use enricher::{EnrichError, EnrichStats, Enricher, RecordOutcome};
pub use features::{FeatureProber, ProbeError, ProbeResult};
pub use filter::{
    FilterError, FilterPipeline, FilterReport, FilterStep, StepMode, StepOutcome, Totals,
    DEFAULT_STEPS,
};
pub use stats::{method_key, CollectionStats, MethodCounts};
pub use summary::{summarize_paths, PathSummarizer};
