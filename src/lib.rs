//! wasm-corpus - Content-addressed WebAssembly corpus index
//!
//! Builds a deduplicated index of WebAssembly binaries collected from several
//! kinds of sources, annotates each unique binary with metadata from external
//! tools, and filters the index down to a curated subset.
//!
//! # Architecture
//!
//! ```text
//! sources → scanner → index (merge) → enricher → all.json
//!                                                   ↓
//!                                      filter pipeline → filtered.json
//! ```
//!
//! # Modules
//!
//! - `domain`: Data structures (Occurrence, UniqueArtifactRecord, Feature)
//! - `corpus`: Content identity, the index and its persistence
//! - `ingest`: Provenance scanner and sibling annotation
//! - `adapters`: External tool interfaces (WABT, parse-producers)
//! - `core`: Feature prober, enricher, filter pipeline, reports
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Scan, deduplicate and enrich
//! wasm-corpus index
//!
//! # Filter the full index
//! wasm-corpus filter
//!
//! # Probe a single binary
//! wasm-corpus probe module.wasm
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod corpus;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use core::{Enricher, FeatureProber, FilterPipeline, FilterStep};
pub use corpus::{ContentIdentity, CorpusIndex, CorpusStore};
pub use domain::{Feature, FeatureStatus, OccurrenceDescriptor, SourceKind, UniqueArtifactRecord, Validity};
pub use ingest::{ProvenanceScanner, SourceLayout, SourceSpec};
