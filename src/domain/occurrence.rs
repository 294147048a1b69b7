//! Occurrences: one observed location of an artifact in one source.
//!
//! An occurrence is created by the provenance scanner and is immutable
//! afterwards, except for the sibling-extension annotation which is attached
//! once per file before enrichment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of source an occurrence was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Cloned source-control repositories (e.g., GitHub)
    SourceControl,

    /// Installed package registry contents (npm, wapm)
    Registry,

    /// Binaries harvested from web traffic
    WebCrawl,

    /// Manually collected binaries
    Manual,

    /// Unpacked browser extension bundles
    ExtensionBundle,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SourceControl => "source-control",
            SourceKind::Registry => "registry",
            SourceKind::WebCrawl => "web-crawl",
            SourceKind::Manual => "manual",
            SourceKind::ExtensionBundle => "extension-bundle",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "source-control" | "github" | "git" => Ok(SourceKind::SourceControl),
            "registry" | "npm" | "wapm" => Ok(SourceKind::Registry),
            "web-crawl" | "web" => Ok(SourceKind::WebCrawl),
            "manual" | "survey" => Ok(SourceKind::Manual),
            "extension-bundle" | "extension" => Ok(SourceKind::ExtensionBundle),
            _ => anyhow::bail!("Unknown source kind: {}", s),
        }
    }
}

/// Source-specific attributes extracted from the source-relative path.
///
/// Only the keys relevant to the occurrence's source kind are set; unset keys
/// are omitted from the persisted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceAttributes {
    /// `owner/name` of a source-control repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Popularity score of the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,

    /// Registry package name (`@scope/name` or `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Browser extension identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Web domain the binary was served from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Crawl seed list the domain came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_list: Option<String>,

    /// How the crawler detected the binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm_detection: Option<String>,
}

/// One observed location of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceDescriptor {
    /// Resolved absolute path of the file
    pub absolute_path: String,

    /// File name (last path component)
    pub filename: String,

    /// Path below the source root, as scanned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,

    /// Kind of the originating source
    pub source_kind: SourceKind,

    /// Configured label of the originating source (e.g. `npm/top`)
    pub collection_method: String,

    /// Source-specific attributes
    #[serde(flatten)]
    pub attributes: ProvenanceAttributes,

    /// Suffixes of sibling files sharing this file's stem.
    ///
    /// `None` until annotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_extensions: Option<Vec<String>>,
}

impl OccurrenceDescriptor {
    /// Create a descriptor without source-specific attributes
    pub fn new(
        absolute_path: impl Into<String>,
        source_kind: SourceKind,
        collection_method: impl Into<String>,
    ) -> Self {
        let absolute_path = absolute_path.into();
        let filename = absolute_path
            .rsplit('/')
            .next()
            .unwrap_or(absolute_path.as_str())
            .to_string();

        Self {
            absolute_path,
            filename,
            relative_path: None,
            source_kind,
            collection_method: collection_method.into(),
            attributes: ProvenanceAttributes::default(),
            sibling_extensions: None,
        }
    }

    /// Attach source-specific attributes
    pub fn with_attributes(mut self, attributes: ProvenanceAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    /// Lowercased absolute path, used by case-insensitive path heuristics
    pub fn path_lowercase(&self) -> String {
        self.absolute_path.to_lowercase()
    }
}
