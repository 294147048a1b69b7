//! Feature prober: differential detection of required optional features.
//!
//! The validator only reports pass/fail, never which feature caused a
//! rejection. Each catalog feature is therefore disabled on its own against an
//! otherwise maximal configuration; if validation then fails, the artifact
//! depends on that feature.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::adapters::{ToolError, Validator};
use crate::domain::{Feature, FeatureConfig, Validity};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Validator failed while probing {identity}: {source}")]
    Tool {
        identity: String,
        #[source]
        source: ToolError,
    },

    /// The default configuration rejects the artifact, yet no single catalog
    /// feature is required. Points at a catalog or correction-table defect.
    #[error("Artifact {identity} needs a non-default feature but no catalog feature is required")]
    EmptyFeatureSet { identity: String },
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Tool { source, .. } if source.is_timeout())
    }
}

/// Outcome of a full probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Validity with every feature enabled
    pub validity: Validity,

    /// Validity under the validator's default configuration (unset when invalid)
    pub default_validity: Option<Validity>,

    /// Required features; `None` when invalid or when the defaults suffice
    pub features: Option<Vec<Feature>>,
}

/// Differential prober over a validator
#[derive(Clone)]
pub struct FeatureProber {
    validator: Arc<dyn Validator>,
    catalog: Vec<Feature>,
}

impl FeatureProber {
    pub fn new(validator: Arc<dyn Validator>) -> Self {
        Self {
            validator,
            catalog: Feature::all().collect(),
        }
    }

    /// Probe candidates in a different order
    pub fn with_catalog(mut self, catalog: Vec<Feature>) -> Self {
        self.catalog = catalog;
        self
    }

    async fn validate(
        &self,
        artifact: &Path,
        identity: &str,
        features: &FeatureConfig,
    ) -> Result<Validity, ProbeError> {
        self.validator
            .validate(artifact, features)
            .await
            .map_err(|source| ProbeError::Tool {
                identity: identity.to_string(),
                source,
            })
    }

    /// Full probe: validate with everything enabled, then with the defaults,
    /// then (only if the defaults reject) find the required features.
    pub async fn probe(&self, artifact: &Path, identity: &str) -> Result<ProbeResult, ProbeError> {
        let validity = self.validate(artifact, identity, &FeatureConfig::All).await?;
        if !validity.is_valid() {
            return Ok(ProbeResult {
                validity,
                default_validity: None,
                features: None,
            });
        }

        let default_validity = self
            .validate(artifact, identity, &FeatureConfig::defaults())
            .await?;
        let features = if default_validity.is_valid() {
            None
        } else {
            Some(self.required_features(artifact, identity).await?)
        };

        Ok(ProbeResult {
            validity,
            default_validity: Some(default_validity),
            features,
        })
    }

    /// Trial-validate once per catalog feature and collect the ones whose
    /// absence makes validation fail. Result is sorted and never empty.
    ///
    /// Only call this for an artifact that is valid with every feature
    /// enabled but rejected under some reduced configuration.
    pub async fn required_features(
        &self,
        artifact: &Path,
        identity: &str,
    ) -> Result<Vec<Feature>, ProbeError> {
        let mut required = Vec::new();
        for &candidate in &self.catalog {
            let trial = FeatureConfig::without(candidate);
            let outcome = self.validate(artifact, identity, &trial).await?;
            debug!(%candidate, valid = outcome.is_valid(), "Trial validation");
            if !outcome.is_valid() {
                required.push(candidate);
            }
        }

        if required.is_empty() {
            return Err(ProbeError::EmptyFeatureSet {
                identity: identity.to_string(),
            });
        }

        required.sort();
        required.dedup();
        Ok(required)
    }
}
