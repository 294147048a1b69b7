//! Filter pipeline.
//!
//! An ordered list of named steps applied to one mutable working index. Each
//! step removes either single occurrences or whole records and reports exactly
//! what it removed; later steps only see what earlier steps left behind.

use std::fmt;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::FilterSettings;
use crate::corpus::{ContentIdentity, CorpusIndex, Removal};
use crate::domain::{OccurrenceDescriptor, UniqueArtifactRecord};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid pattern in filter step '{step}': {source}")]
    Pattern {
        step: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown filter step '{0}'")]
    UnknownStep(String),
}

type OccurrencePredicate = Box<dyn Fn(&OccurrenceDescriptor) -> bool + Send + Sync>;
type RecordPredicate = Box<dyn Fn(&UniqueArtifactRecord) -> bool + Send + Sync>;

/// How a step removes entries
pub enum StepMode {
    /// Remove matching occurrences; records left empty go with them
    Occurrences(OccurrencePredicate),

    /// Remove a record when any of its occurrences matches
    AnyOccurrence(OccurrencePredicate),

    /// Remove a record when all of its occurrences match
    AllOccurrences(OccurrencePredicate),

    /// Remove a record matching a predicate over the whole record
    Record(RecordPredicate),
}

impl StepMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepMode::Occurrences(_) => "occurrences",
            StepMode::AnyOccurrence(_) => "record-any-occurrence",
            StepMode::AllOccurrences(_) => "record-all-occurrences",
            StepMode::Record(_) => "record",
        }
    }
}

impl fmt::Debug for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named removal operation
#[derive(Debug)]
pub struct FilterStep {
    pub name: String,
    pub description: String,
    pub mode: StepMode,
}

/// Exact effect of one step
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: String,
    pub description: String,
    pub mode: String,
    pub occurrences_before: usize,
    pub records_before: usize,
    pub occurrences_removed: usize,
    pub records_removed: usize,
    pub removed_identities: Vec<ContentIdentity>,
}

impl FilterStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>, mode: StepMode) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mode,
        }
    }

    pub fn occurrences<F>(name: &str, description: &str, predicate: F) -> Self
    where
        F: Fn(&OccurrenceDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::new(name, description, StepMode::Occurrences(Box::new(predicate)))
    }

    pub fn any_occurrence<F>(name: &str, description: &str, predicate: F) -> Self
    where
        F: Fn(&OccurrenceDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::new(name, description, StepMode::AnyOccurrence(Box::new(predicate)))
    }

    pub fn all_occurrences<F>(name: &str, description: &str, predicate: F) -> Self
    where
        F: Fn(&OccurrenceDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::new(name, description, StepMode::AllOccurrences(Box::new(predicate)))
    }

    pub fn records<F>(name: &str, description: &str, predicate: F) -> Self
    where
        F: Fn(&UniqueArtifactRecord) -> bool + Send + Sync + 'static,
    {
        Self::new(name, description, StepMode::Record(Box::new(predicate)))
    }

    /// Apply this step to the working index
    pub fn apply(&self, index: &mut CorpusIndex) -> StepOutcome {
        let occurrences_before = index.total_occurrences();
        let records_before = index.len();

        let removal: Removal = match &self.mode {
            StepMode::Occurrences(predicate) => index.remove_occurrences(|occ| predicate(occ)),
            StepMode::AnyOccurrence(predicate) => index.remove_records_any(|occ| predicate(occ)),
            StepMode::AllOccurrences(predicate) => {
                index.remove_records(|_, record| record.files.iter().all(|occ| predicate(occ)))
            }
            StepMode::Record(predicate) => index.remove_records(|_, record| predicate(record)),
        };

        StepOutcome {
            step: self.name.clone(),
            description: self.description.clone(),
            mode: self.mode.as_str().to_string(),
            occurrences_before,
            records_before,
            occurrences_removed: removal.occurrences_removed(),
            records_removed: removal.records_removed(),
            removed_identities: removal.removed_identities().cloned().collect(),
        }
    }
}

/// Occurrence and record totals of an index
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub occurrences: usize,
    pub records: usize,
}

impl Totals {
    pub fn of(index: &CorpusIndex) -> Self {
        Self {
            occurrences: index.total_occurrences(),
            records: index.len(),
        }
    }
}

/// Auditable result of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub generated_at: DateTime<Utc>,
    pub before: Totals,
    pub after: Totals,
    pub steps: Vec<StepOutcome>,
}

/// Ordered filter steps
#[derive(Debug, Default)]
pub struct FilterPipeline {
    steps: Vec<FilterStep>,
}

/// Names of the default steps, in order
pub const DEFAULT_STEPS: &[&str] = &[
    "generated-variants",
    "superoptimizer-outputs",
    "fuzzer-outputs",
    "invalid",
    "hello-world",
    "unit-tests",
    "spec-testsuite",
    "wasm2lua-testsuite",
    "binaryen-testsuite",
    "tiny-programs",
];

fn regex(step: &str, pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::Pattern {
        step: step.to_string(),
        source,
    })
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: FilterStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    /// The curated default steps, minus any disabled in `settings`
    pub fn default_steps(settings: &FilterSettings) -> Result<Self, FilterError> {
        if let Some(unknown) = settings
            .disabled_steps
            .iter()
            .find(|name| !DEFAULT_STEPS.contains(&name.as_str()))
        {
            return Err(FilterError::UnknownStep(unknown.clone()));
        }

        let superoptimizer = regex("superoptimizer-outputs", r"(souper|superoptimizer)(.*)\.opt")?;
        let hello_world = regex("hello-world", r"(hello[\-_ ]?((world)|(wasm)))|(wasm_hello)")?;
        let unit_tests = regex("unit-tests", r"(test_?wasm)|(wasm_?test)|(wasm_add_bg)")?;
        let spec_file = regex("spec-testsuite", r"wast\.\d+\.wasm")?;
        let min_instructions = settings.min_instructions;

        const SPEC_MARKERS: &[&str] = &[
            "spec_tests",
            "spectest",
            "SpecTestData",
            "wasm-core-testsuite",
            "exec/testdata/",
            "ssvm_unittest",
        ];

        let all = vec![
            FilterStep::occurrences(
                "generated-variants",
                "Generated program variants: '[' in file name",
                |occ| occ.filename.contains('['),
            ),
            FilterStep::occurrences(
                "superoptimizer-outputs",
                "Superoptimizer outputs",
                move |occ| superoptimizer.is_match(&occ.absolute_path),
            ),
            FilterStep::any_occurrence(
                "fuzzer-outputs",
                "Fuzzer outputs: afl_out in path",
                |occ| occ.absolute_path.contains("afl_out"),
            ),
            FilterStep::records("invalid", "Artifacts failing validation", |record| {
                !record.is_valid()
            }),
            FilterStep::occurrences(
                "hello-world",
                "Hello-world programs",
                move |occ| hello_world.is_match(&occ.path_lowercase()),
            ),
            FilterStep::occurrences(
                "unit-tests",
                "Small test projects",
                move |occ| unit_tests.is_match(&occ.path_lowercase()),
            ),
            FilterStep::any_occurrence(
                "spec-testsuite",
                "WebAssembly core test suite",
                move |occ| {
                    let path = &occ.absolute_path;
                    spec_file.is_match(path) || SPEC_MARKERS.iter().any(|m| path.contains(m))
                },
            ),
            FilterStep::any_occurrence(
                "wasm2lua-testsuite",
                "wasm2lua test suite",
                |occ| {
                    occ.absolute_path.contains("resources/tests/c-testsuite/")
                        || occ.absolute_path.contains("resources/tests/assemblyscript/")
                },
            ),
            FilterStep::any_occurrence(
                "binaryen-testsuite",
                "Binaryen test suite",
                |occ| {
                    occ.absolute_path.contains("resources/tests/c-testsuite/")
                        || occ.absolute_path.contains("binaryen/test/")
                },
            ),
            FilterStep::records(
                "tiny-programs",
                &format!("Programs with fewer than {} instructions", min_instructions),
                move |record| record.instruction_count.is_some_and(|n| n < min_instructions),
            ),
        ];

        let steps = all
            .into_iter()
            .filter(|step| !settings.disabled_steps.contains(&step.name))
            .collect();
        Ok(Self { steps })
    }

    /// Apply every step in order to `index`
    pub fn run(&self, index: &mut CorpusIndex) -> FilterReport {
        let before = Totals::of(index);
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let outcome = step.apply(index);
            info!(
                step = %step.name,
                occurrences = outcome.occurrences_removed,
                records = outcome.records_removed,
                "Filter step applied"
            );
            outcomes.push(outcome);
        }

        FilterReport {
            generated_at: Utc::now(),
            before,
            after: Totals::of(index),
            steps: outcomes,
        }
    }
}
