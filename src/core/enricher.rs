//! Metadata enricher.
//!
//! Runs the external tools once per unique artifact and attaches their results
//! to the owning record. Occurrence descriptors are never touched here.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::features::{FeatureProber, ProbeError};
use crate::adapters::producers::PRODUCERS_SECTION;
use crate::adapters::{ToolError, Toolchain};
use crate::corpus::{ContentIdentity, CorpusIndex};
use crate::domain::{Feature, FeatureConfig, Producers, UniqueArtifactRecord, Validity};

/// Records between progress log lines
const PROGRESS_EVERY: usize = 100;

/// Fatal enrichment failures; these abort the run
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Cannot read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Enrichment of {identity} failed: {source}")]
    Tool {
        identity: String,
        #[source]
        source: ToolError,
    },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Already enriched by an earlier run
    Skipped,
    Valid,
    Invalid,
    /// A tool timed out; `enrichment_error` is set
    Failed,
}

/// Counters for one enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Valid artifacts the instruction counter rejected
    pub uncounted: usize,
}

impl EnrichStats {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Valid => self.valid += 1,
            RecordOutcome::Invalid => self.invalid += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

/// Derived fields computed for one artifact, applied to the record at once
#[derive(Debug, Default)]
struct Enrichment {
    validity: Option<Validity>,
    no_extensions: Option<Validity>,
    features: Option<Vec<Feature>>,
    custom_sections: Option<Vec<String>>,
    producers: Option<Producers>,
    instruction_count: Option<u64>,
    uncounted: bool,
}

pub struct Enricher {
    tools: Toolchain,
    prober: FeatureProber,
}

impl Enricher {
    pub fn new(tools: Toolchain) -> Self {
        let prober = FeatureProber::new(tools.validator.clone());
        Self { tools, prober }
    }

    pub fn with_prober(mut self, prober: FeatureProber) -> Self {
        self.prober = prober;
        self
    }

    /// Enrich every record not yet enriched.
    ///
    /// `artifact_path` maps an identity to the file the tools should read.
    pub async fn enrich_index<F>(
        &self,
        index: &mut CorpusIndex,
        artifact_path: F,
    ) -> Result<EnrichStats, EnrichError>
    where
        F: Fn(&ContentIdentity) -> PathBuf,
    {
        let total = index.len();
        let mut stats = EnrichStats::default();

        for (done, (identity, record)) in index.iter_mut().enumerate() {
            let path = artifact_path(identity);
            let (outcome, uncounted) = self.enrich_record(identity, &path, record).await?;
            stats.record(outcome);
            if uncounted {
                stats.uncounted += 1;
            }

            if (done + 1) % PROGRESS_EVERY == 0 {
                info!("Enriched {}/{} unique artifacts", done + 1, total);
            }
        }

        info!(
            valid = stats.valid,
            invalid = stats.invalid,
            skipped = stats.skipped,
            failed = stats.failed,
            "Enrichment complete"
        );
        Ok(stats)
    }

    /// Enrich one record from the artifact at `artifact`.
    ///
    /// Returns the outcome and whether the instruction count was left unknown
    /// because the counter rejected a valid artifact.
    #[instrument(skip(self, identity, artifact, record), fields(identity = %identity.short()))]
    pub async fn enrich_record(
        &self,
        identity: &ContentIdentity,
        artifact: &Path,
        record: &mut UniqueArtifactRecord,
    ) -> Result<(RecordOutcome, bool), EnrichError> {
        if record.is_enriched() {
            return Ok((RecordOutcome::Skipped, false));
        }

        let metadata = tokio::fs::metadata(artifact)
            .await
            .map_err(|source| EnrichError::Io {
                path: artifact.to_path_buf(),
                source,
            })?;
        record.size_bytes = metadata.len();

        let enrichment = match self.collect(identity, artifact).await {
            Ok(enrichment) => enrichment,
            Err(EnrichError::Tool { source, .. }) if source.is_timeout() => {
                return Ok((abandon(record, source.to_string()), false));
            }
            Err(EnrichError::Probe(e)) if e.is_timeout() => {
                return Ok((abandon(record, e.to_string()), false));
            }
            Err(e) => return Err(e),
        };

        let uncounted = enrichment.uncounted;
        let outcome = match &enrichment.validity {
            Some(Validity::Valid) => RecordOutcome::Valid,
            _ => RecordOutcome::Invalid,
        };

        record.wasm_validate = enrichment.validity;
        record.wasm_validate_no_extensions = enrichment.no_extensions;
        record.wasm_extensions = enrichment.features;
        record.custom_sections = enrichment.custom_sections;
        record.producers = enrichment.producers;
        record.instruction_count = enrichment.instruction_count;
        record.enrichment_error = None;

        Ok((outcome, uncounted))
    }

    async fn collect(
        &self,
        identity: &ContentIdentity,
        artifact: &Path,
    ) -> Result<Enrichment, EnrichError> {
        let tool_error = |source: ToolError| EnrichError::Tool {
            identity: identity.to_string(),
            source,
        };

        let validity = self
            .tools
            .validator
            .validate(artifact, &FeatureConfig::All)
            .await
            .map_err(tool_error)?;
        if !validity.is_valid() {
            return Ok(Enrichment {
                validity: Some(validity),
                ..Default::default()
            });
        }

        let no_extensions = self
            .tools
            .validator
            .validate(artifact, &FeatureConfig::reduced())
            .await
            .map_err(tool_error)?;
        let features = if no_extensions.is_valid() {
            None
        } else {
            Some(
                self.prober
                    .required_features(artifact, identity.as_str())
                    .await?,
            )
        };

        let custom_sections = self
            .tools
            .sections
            .custom_sections(artifact)
            .await
            .map_err(tool_error)?;

        let producers = if custom_sections.iter().any(|s| s == PRODUCERS_SECTION) {
            Some(
                self.tools
                    .producers
                    .producers(artifact)
                    .await
                    .map_err(tool_error)?,
            )
        } else {
            None
        };

        // The counter can reject a valid artifact over custom-section problems
        // the validator ignores; the count is then unknown.
        let (instruction_count, uncounted) =
            match self.tools.counter.count_instructions(artifact).await {
                Ok(count) => (Some(count), false),
                Err(ToolError::Rejected { code, stderr, .. }) => {
                    warn!(code, "Instruction counter rejected a valid artifact: {}", stderr);
                    (None, true)
                }
                Err(e) => return Err(tool_error(e)),
            };

        Ok(Enrichment {
            validity: Some(validity),
            no_extensions: Some(no_extensions),
            features,
            custom_sections: Some(custom_sections),
            producers,
            instruction_count,
            uncounted,
        })
    }
}

/// Clear derived fields and record why enrichment stopped
fn abandon(record: &mut UniqueArtifactRecord, reason: String) -> RecordOutcome {
    warn!("Enrichment abandoned: {}", reason);
    record.wasm_validate = None;
    record.wasm_validate_no_extensions = None;
    record.wasm_extensions = None;
    record.custom_sections = None;
    record.producers = None;
    record.instruction_count = None;
    record.enrichment_error = Some(reason);
    RecordOutcome::Failed
}
