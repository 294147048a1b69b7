//! Canonical output layout.
//!
//! Single source of truth - import this instead of hardcoding file names.
//!
//! ```text
//! <output_dir>/
//! ├── .lock                   # Advisory lock held during a run
//! ├── all.json                # Full enriched index (compact)
//! ├── all.pretty.json         # Full enriched index (indented)
//! ├── all.files.txt           # Absolute paths of all occurrences
//! ├── all/<sha256>.wasm       # One copy per unique artifact
//! ├── filtered.json
//! ├── filtered.pretty.json
//! ├── filtered.files.txt
//! ├── filtered.trie.txt       # Hierarchical path summary
//! ├── filtered.report.json    # Per-step filter outcomes
//! └── filtered/<sha256>.wasm
//! ```

use std::path::{Path, PathBuf};

/// Name of the full (pre-filter) index
pub const ALL: &str = "all";

/// Name of the filtered index
pub const FILTERED: &str = "filtered";

/// Suffix of materialized artifacts
pub const ARTIFACT_SUFFIX: &str = "wasm";

/// Compact JSON serialization of an index
pub fn compact_index(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.json", name))
}

/// Indented JSON serialization of an index
pub fn pretty_index(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.pretty.json", name))
}

/// Flat listing of occurrence paths
pub fn file_listing(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.files.txt", name))
}

/// Hierarchical summary of the listing
pub fn path_summary(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{}.trie.txt", name))
}

/// Filter step report
pub fn filter_report(root: &Path) -> PathBuf {
    root.join(format!("{}.report.json", FILTERED))
}

/// Directory of materialized artifacts for an index
pub fn artifact_dir(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Lock file guarding the output directory
pub fn lock_file(root: &Path) -> PathBuf {
    root.join(".lock")
}
