//! Content-addressed corpus index and its persistence.
//!
//! Artifacts are deduplicated by the SHA256 of their bytes; every observed
//! occurrence is kept on the record for that identity.

pub mod identity;
pub mod index;
pub mod store;

pub use identity::ContentIdentity;
pub use index::{CorpusIndex, Removal};
pub use store::{file_listing, CorpusStore, StoreLock};
