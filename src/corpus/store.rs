//! Persistence for corpus indexes and materialized artifacts.
//!
//! Each index is written in two equivalent JSON forms (compact and indented)
//! plus a flat listing of occurrence paths. Unique artifacts are copied under
//! their content identity.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tokio::fs;

use super::identity::ContentIdentity;
use super::index::CorpusIndex;
use crate::config::paths;

/// File-based store rooted at the output directory
#[derive(Debug, Clone)]
pub struct CorpusStore {
    root: PathBuf,
}

/// Exclusive lock on the output directory, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl CorpusStore {
    /// Open a store, creating the output directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create output directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take the exclusive run lock; fails if another run holds it
    pub fn lock(&self) -> Result<StoreLock> {
        let path = paths::lock_file(&self.root);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "Output directory {} is locked by another run",
                self.root.display()
            )
        })?;

        Ok(StoreLock { file })
    }

    /// Whether a compact serialization of the named index exists
    pub fn has_index(&self, name: &str) -> bool {
        paths::compact_index(&self.root, name).exists()
    }

    /// Write the compact form, the indented form and the path listing
    pub async fn save_index(&self, name: &str, index: &CorpusIndex) -> Result<()> {
        let compact = serde_json::to_string(index).context("Failed to serialize index")?;
        let pretty = serde_json::to_string_pretty(index).context("Failed to serialize index")?;

        for (path, content) in [
            (paths::compact_index(&self.root, name), compact),
            (paths::pretty_index(&self.root, name), pretty),
            (paths::file_listing(&self.root, name), file_listing(index)),
        ] {
            fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        tracing::info!(
            name,
            unique = index.len(),
            total = index.total_occurrences(),
            "Index written"
        );
        Ok(())
    }

    /// Load the compact form of the named index
    pub async fn load_index(&self, name: &str) -> Result<CorpusIndex> {
        let path = paths::compact_index(&self.root, name);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read index: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse index JSON: {}", path.display()))
    }

    /// Path a materialized artifact has (or will have) in the named collection
    pub fn artifact_path(&self, name: &str, id: &ContentIdentity) -> PathBuf {
        paths::artifact_dir(&self.root, name)
            .join(format!("{}.{}", id.as_str(), paths::ARTIFACT_SUFFIX))
    }

    /// Copy `source` into the named collection under its identity.
    ///
    /// An existing copy is kept only if its bytes hash to `id`; anything else
    /// (such as a copy cut short by an interrupted run) is replaced. The copy
    /// goes to a temporary name first and is renamed into place.
    pub async fn materialize(
        &self,
        name: &str,
        id: &ContentIdentity,
        source: &Path,
    ) -> Result<PathBuf> {
        let dest = self.artifact_path(name, id);
        if is_intact(&dest, id).await {
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension(format!("{}.{}", paths::ARTIFACT_SUFFIX, PARTIAL_SUFFIX));
        fs::copy(source, &partial).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                partial.display()
            )
        })?;
        fs::rename(&partial, &dest)
            .await
            .with_context(|| format!("Failed to move {} into place", dest.display()))?;

        Ok(dest)
    }

    /// Make collection `to` hold exactly the records of `index`, copied from `from`.
    ///
    /// Artifacts in `to` whose identity is not in `index` are deleted.
    pub async fn copy_collection(&self, from: &str, to: &str, index: &CorpusIndex) -> Result<usize> {
        let removed = self.prune(to, index).await?;
        if removed > 0 {
            tracing::info!(collection = to, removed, "Removed artifacts no longer retained");
        }

        let mut copied = 0;
        for (id, _) in index.iter() {
            let source = self.artifact_path(from, id);
            self.materialize(to, id, &source).await?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Delete files in the named collection that do not belong to a record of `index`
    async fn prune(&self, name: &str, index: &CorpusIndex) -> Result<usize> {
        let dir = paths::artifact_dir(&self.root, name);
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let retained = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(&format!(".{}", paths::ARTIFACT_SUFFIX)))
                .and_then(|hex| ContentIdentity::from_hex(hex).ok())
                .is_some_and(|id| index.contains(&id));
            if retained || !entry.file_type().await?.is_file() {
                continue;
            }

            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Write an auxiliary text file into the output directory
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Suffix appended to an artifact name while it is being copied
const PARTIAL_SUFFIX: &str = "partial";

/// Whether `path` exists and its bytes hash to `id`
async fn is_intact(path: &Path, id: &ContentIdentity) -> bool {
    match fs::read(path).await {
        Ok(bytes) => ContentIdentity::of_bytes(&bytes) == *id,
        Err(_) => false,
    }
}

/// Absolute paths of all occurrences, one per line, in record order
pub fn file_listing(index: &CorpusIndex) -> String {
    let mut listing = String::new();
    for occurrence in index.occurrences() {
        listing.push_str(&occurrence.absolute_path);
        listing.push('\n');
    }
    listing
}
