//! Sibling-extension annotation.
//!
//! For an artifact `dir/foo.wasm`, the siblings are the other regular files in
//! `dir` with the same stem (`foo.js`, `foo.html`, ...). Their extensions hint
//! at how the binary was produced and loaded.

use std::io;
use std::path::Path;

use crate::corpus::CorpusIndex;

/// Extensions of same-stem sibling files, sorted
pub fn sibling_extensions(path: &Path) -> io::Result<Vec<String>> {
    let (Some(parent), Some(stem)) = (path.parent(), path.file_stem()) else {
        return Ok(Vec::new());
    };
    let stem = stem.to_string_lossy();
    let own = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let mut extensions = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let sibling = entry?.path();
        if !sibling.is_file() {
            continue;
        }
        if std::fs::canonicalize(&sibling).is_ok_and(|p| p == own) {
            continue;
        }
        if sibling.file_stem() != path.file_stem() {
            continue;
        }

        let name = sibling
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = name.get(stem.len()..).unwrap_or_default().trim_matches('.');
        extensions.push(extension.to_string());
    }

    extensions.sort();
    Ok(extensions)
}

/// Record sibling extensions on every occurrence in the index.
///
/// Occurrences whose directory cannot be listed are left unannotated; the
/// number of such failures is returned.
pub fn annotate_siblings(index: &mut CorpusIndex) -> usize {
    let mut failures = 0;
    for occurrence in index.occurrences_mut() {
        match sibling_extensions(Path::new(&occurrence.absolute_path)) {
            Ok(extensions) => occurrence.sibling_extensions = Some(extensions),
            Err(e) => {
                tracing::warn!(
                    "Cannot list siblings of {}: {}",
                    occurrence.absolute_path,
                    e
                );
                failures += 1;
            }
        }
    }
    failures
}
