//! Provenance scanner.
//!
//! Walks a source root, selects artifact files by name, hashes each one and
//! builds an occurrence descriptor using the source's path-segment layout.
//! The scan is lazy and restartable: the same root yields the same pairs in
//! the same order as long as the filesystem is unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::corpus::ContentIdentity;
use crate::domain::{OccurrenceDescriptor, ProvenanceAttributes, SourceKind};

/// Errors that abort a scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Source root does not exist or is not a directory: {0}")]
    RootNotFound(PathBuf),

    #[error("Invalid artifact glob '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to load popularity data {path}: {message}")]
    Popularity { path: PathBuf, message: String },

    #[error("Cannot derive provenance for {path}: {reason}")]
    Provenance { path: PathBuf, reason: String },
}

/// How source-specific attributes are read from a source-relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLayout {
    /// `<owner>/<name>/...` → repository `owner/name`
    Repository,

    /// `<name>/...` or `@<scope>/<name>/...` → package
    Scoped,

    /// `<namespace>/<name>@<version>/...` → package `namespace/name`
    Versioned,

    /// `<domain>/...` → domain
    Flat,

    /// `<seed_list>/<wasm_detection>/<domain>/...`
    Seeded,

    /// `<extension id>/...` → extension
    Bundle,

    /// No attributes
    Plain,
}

impl SourceLayout {
    /// Layout used when a source does not name one
    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::SourceControl => SourceLayout::Repository,
            SourceKind::Registry => SourceLayout::Scoped,
            SourceKind::WebCrawl => SourceLayout::Flat,
            SourceKind::ExtensionBundle => SourceLayout::Bundle,
            SourceKind::Manual => SourceLayout::Plain,
        }
    }

    /// Whether this layout makes sense for a source kind
    pub fn applies_to(&self, kind: SourceKind) -> bool {
        match self {
            SourceLayout::Plain => true,
            SourceLayout::Repository => kind == SourceKind::SourceControl,
            SourceLayout::Scoped | SourceLayout::Versioned => kind == SourceKind::Registry,
            SourceLayout::Flat | SourceLayout::Seeded => kind == SourceKind::WebCrawl,
            SourceLayout::Bundle => kind == SourceKind::ExtensionBundle,
        }
    }
}

/// One declared source root
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    /// Collection method label recorded on each occurrence
    pub label: String,
    pub root: PathBuf,
    pub layout: SourceLayout,
    /// JSON map of repository URL to popularity score
    pub popularity: Option<PathBuf>,
}

impl SourceSpec {
    pub fn new(kind: SourceKind, label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            label: label.into(),
            root: root.into(),
            layout: SourceLayout::default_for(kind),
            popularity: None,
        }
    }

    pub fn with_layout(mut self, layout: SourceLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_popularity(mut self, path: impl Into<PathBuf>) -> Self {
        self.popularity = Some(path.into());
        self
    }
}

/// Counters for one scan
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Files matched and hashed
    pub matched: usize,

    /// Matching files or directories that could not be read
    pub skipped: usize,
}

/// Scanner configured with the artifact file-name pattern
#[derive(Debug, Clone)]
pub struct ProvenanceScanner {
    pattern: Pattern,
}

impl ProvenanceScanner {
    pub fn new(artifact_glob: &str) -> Result<Self, ScanError> {
        let pattern = Pattern::new(artifact_glob).map_err(|source| ScanError::Pattern {
            pattern: artifact_glob.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    /// Start a lazy scan of one source
    pub fn scan<'a>(&'a self, source: &'a SourceSpec) -> Result<ProvenanceScan<'a>, ScanError> {
        if !source.root.is_dir() {
            return Err(ScanError::RootNotFound(source.root.clone()));
        }

        let popularity = match &source.popularity {
            Some(path) => Some(load_popularity(path)?),
            None => None,
        };

        let walker = WalkDir::new(&source.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(ProvenanceScan {
            source,
            pattern: &self.pattern,
            walker,
            popularity,
            stats: ScanStats::default(),
        })
    }
}

/// Lazy sequence of (identity, occurrence) pairs for one source
pub struct ProvenanceScan<'a> {
    source: &'a SourceSpec,
    pattern: &'a Pattern,
    walker: walkdir::IntoIter,
    popularity: Option<HashMap<String, u64>>,
    stats: ScanStats,
}

impl ProvenanceScan<'_> {
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    fn describe(&self, path: &Path) -> Result<OccurrenceDescriptor, ScanError> {
        let relative = path.strip_prefix(&self.source.root).unwrap_or(path);
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let attributes = extract_attributes(
            self.source.layout,
            &segments,
            self.popularity.as_ref(),
        )
        .map_err(|reason| ScanError::Provenance {
            path: path.to_path_buf(),
            reason,
        })?;

        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        Ok(OccurrenceDescriptor::new(
            absolute.to_string_lossy(),
            self.source.kind,
            self.source.label.clone(),
        )
        .with_relative_path(segments.join("/"))
        .with_attributes(attributes))
    }
}

impl Iterator for ProvenanceScan<'_> {
    type Item = Result<(ContentIdentity, OccurrenceDescriptor), ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", self.source.root.display(), e);
                    self.stats.skipped += 1;
                    continue;
                }
            };

            let path = entry.path();
            let name_matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.pattern.matches(name));
            if entry.file_type().is_dir() || !name_matches {
                continue;
            }
            // Symlinks count when they resolve to a regular file
            if entry.path_is_symlink() && !path.exists() {
                tracing::warn!("Skipping dangling link {}", path.display());
                self.stats.skipped += 1;
                continue;
            }
            if !path.is_file() {
                continue;
            }

            let (identity, _) = match ContentIdentity::of_file(path) {
                Ok(hashed) => hashed,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
                    self.stats.skipped += 1;
                    continue;
                }
            };

            self.stats.matched += 1;
            return Some(self.describe(path).map(|descriptor| (identity, descriptor)));
        }
    }
}

/// Load a popularity map (`{"https://github.com/owner/name.git": stars}`)
fn load_popularity(path: &Path) -> Result<HashMap<String, u64>, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|e| ScanError::Popularity {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| ScanError::Popularity {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn popularity_of(popularity: &HashMap<String, u64>, repository: &str) -> Option<u64> {
    popularity
        .get(&format!("https://github.com/{}.git", repository))
        .or_else(|| popularity.get(repository))
        .copied()
}

/// Derive source-specific attributes from source-relative path segments
/// (the last segment is the file name).
pub fn extract_attributes(
    layout: SourceLayout,
    segments: &[String],
    popularity: Option<&HashMap<String, u64>>,
) -> Result<ProvenanceAttributes, String> {
    let need = |n: usize| -> Result<(), String> {
        if segments.len() < n {
            Err(format!(
                "{:?} layout needs at least {} path segments, found {}",
                layout,
                n,
                segments.len()
            ))
        } else {
            Ok(())
        }
    };

    let mut attributes = ProvenanceAttributes::default();
    match layout {
        SourceLayout::Plain => {}
        SourceLayout::Repository => {
            need(2)?;
            let repository = format!("{}/{}", segments[0], segments[1]);
            if let Some(popularity) = popularity {
                let stars = popularity_of(popularity, &repository)
                    .ok_or_else(|| format!("no popularity entry for repository {}", repository))?;
                attributes.stars = Some(stars);
            }
            attributes.repository = Some(repository);
        }
        SourceLayout::Scoped => {
            need(1)?;
            let package = if segments[0].starts_with('@') {
                need(2)?;
                format!("{}/{}", segments[0], segments[1])
            } else {
                segments[0].clone()
            };
            attributes.package = Some(package);
        }
        SourceLayout::Versioned => {
            need(1)?;
            let joined = segments[..segments.len().min(2)].join("/");
            let package = joined.split('@').next().unwrap_or_default().to_string();
            attributes.package = Some(package);
        }
        SourceLayout::Flat => {
            need(1)?;
            attributes.domain = Some(segments[0].clone());
        }
        SourceLayout::Seeded => {
            need(3)?;
            attributes.seed_list = Some(segments[0].clone());
            attributes.wasm_detection = Some(segments[1].clone());
            attributes.domain = Some(segments[2].clone());
        }
        SourceLayout::Bundle => {
            need(1)?;
            attributes.extension = Some(segments[0].clone());
        }
    }

    Ok(attributes)
}
