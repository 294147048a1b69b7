//! Unique artifact records: the canonical, deduplicated unit of the corpus.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::feature::Feature;
use super::occurrence::OccurrenceDescriptor;

/// Outcome of running the validator on an artifact.
///
/// Persisted as `true` when valid, otherwise as the validator's error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

impl Serialize for Validity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Validity::Valid => serializer.serialize_bool(true),
            Validity::Invalid(report) => serializer.serialize_str(report),
        }
    }
}

impl<'de> Deserialize<'de> for Validity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Report(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Validity::Valid),
            Raw::Flag(false) => Err(serde::de::Error::custom(
                "validity must be `true` or an error report",
            )),
            Raw::Report(report) => Ok(Validity::Invalid(report)),
        }
    }
}

/// Producer metadata embedded in the `producers` custom section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producers {
    /// Source languages and their versions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub language: BTreeMap<String, String>,

    /// Tools that processed the binary and their versions
    #[serde(
        rename = "processed-by",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub processed_by: BTreeMap<String, String>,

    /// SDKs used to build the binary
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sdk: BTreeMap<String, String>,
}

/// Resolved meaning of a record's feature set.
///
/// The persisted `wasm_extensions` field is `null` in several situations;
/// this disambiguates them using the validity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureStatus<'a> {
    /// Enrichment has not run (or failed before validation finished)
    NotComputed,

    /// The artifact is invalid, so no feature set exists
    Invalid,

    /// Valid without any optional feature
    NoneRequired,

    /// Valid, and requires exactly these optional features
    Required(&'a [Feature]),
}

/// Canonical record for one content identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueArtifactRecord {
    /// Every observed occurrence, in scan order
    pub files: Vec<OccurrenceDescriptor>,

    /// Size of the artifact in bytes
    #[serde(default)]
    pub size_bytes: u64,

    /// Validity with every optional feature enabled
    #[serde(default)]
    pub wasm_validate: Option<Validity>,

    /// Validity with every optional feature disabled
    #[serde(default)]
    pub wasm_validate_no_extensions: Option<Validity>,

    /// Optional features the artifact requires (see [`FeatureStatus`])
    #[serde(default)]
    pub wasm_extensions: Option<Vec<Feature>>,

    /// Names of embedded custom sections
    #[serde(default)]
    pub custom_sections: Option<Vec<String>>,

    /// Parsed `producers` section
    #[serde(default)]
    pub producers: Option<Producers>,

    /// Total instruction count (null when the counter could not produce one)
    #[serde(default)]
    pub instruction_count: Option<u64>,

    /// Reason enrichment was abandoned for this record, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
}

impl Default for UniqueArtifactRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueArtifactRecord {
    /// Create an empty, unenriched record
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            size_bytes: 0,
            wasm_validate: None,
            wasm_validate_no_extensions: None,
            wasm_extensions: None,
            custom_sections: None,
            producers: None,
            instruction_count: None,
            enrichment_error: None,
        }
    }

    /// Whether enrichment has populated the validity field
    pub fn is_enriched(&self) -> bool {
        self.wasm_validate.is_some()
    }

    /// Whether the artifact passed full validation
    pub fn is_valid(&self) -> bool {
        self.wasm_validate.as_ref().is_some_and(Validity::is_valid)
    }

    /// Disambiguated view of the feature set
    pub fn feature_status(&self) -> FeatureStatus<'_> {
        match (&self.wasm_validate, &self.wasm_extensions) {
            (None, _) => FeatureStatus::NotComputed,
            (Some(Validity::Invalid(_)), _) => FeatureStatus::Invalid,
            (Some(Validity::Valid), Some(features)) => FeatureStatus::Required(features),
            (Some(Validity::Valid), None) => match self.wasm_validate_no_extensions {
                Some(_) => FeatureStatus::NoneRequired,
                None => FeatureStatus::NotComputed,
            },
        }
    }

    /// First occurrence, used as the copy source for materialization
    pub fn primary(&self) -> Option<&OccurrenceDescriptor> {
        self.files.first()
    }
}
