//! Artifact ingestion from declared source roots.
//!
//! ```text
//! source roots → ProvenanceScanner → (identity, occurrence) → CorpusIndex
//!                                                                ↓
//!                                                       annotate_siblings
//! ```

pub mod scanner;
pub mod siblings;

pub use scanner::{
    extract_attributes, ProvenanceScan, ProvenanceScanner, ScanError, ScanStats, SourceLayout,
    SourceSpec,
};
pub use siblings::{annotate_siblings, sibling_extensions};
