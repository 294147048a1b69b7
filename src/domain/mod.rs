//! Domain types for the corpus index.
//!
//! This module contains the core data structures:
//! - Occurrence: one observed location of an artifact
//! - Artifact: the deduplicated record for one content identity
//! - Feature: optional binary-format features known to the validator

pub mod artifact;
pub mod feature;
pub mod occurrence;

// Re-export commonly used types
pub use artifact::{FeatureStatus, Producers, UniqueArtifactRecord, Validity};
pub use feature::{Feature, FeatureConfig, DEFAULT_DISABLED, DEFAULT_ENABLED};
pub use occurrence::{OccurrenceDescriptor, ProvenanceAttributes, SourceKind};
