//! Fake tool implementations shared by the integration tests.
//!
//! Fake artifacts are plain files: a valid one starts with the wasm magic and
//! lists the features it needs as text (`\0asm features=simd,gc`).
//! Anything else is rejected by the fake validator.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wasm_corpus::adapters::{
    InstructionCounter, ProducersParser, SectionLister, ToolError, Toolchain, Validator,
};
use wasm_corpus::domain::{Feature, FeatureConfig, Producers, Validity};

const MAGIC: &[u8] = b"\0asm";

/// Bytes of a fake valid module requiring `features`
pub fn module(features: &[Feature]) -> Vec<u8> {
    let names: Vec<_> = features.iter().map(|f| f.as_str()).collect();
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(format!(" features={}", names.join(",")).as_bytes());
    bytes
}

/// Bytes of a fake valid module with a producers section
pub fn module_with_producers() -> Vec<u8> {
    let mut bytes = module(&[]);
    bytes.extend_from_slice(b" producers");
    bytes
}

/// Bytes of a fake valid module the counter rejects
pub fn module_uncountable() -> Vec<u8> {
    let mut bytes = module(&[]);
    bytes.extend_from_slice(b" nocount");
    bytes
}

/// Features the validator effectively enables for a configuration.
/// Exceptions implies reference-types, which implies bulk-memory.
pub fn effective(config: &FeatureConfig) -> BTreeSet<Feature> {
    let mut enabled: BTreeSet<Feature> = Feature::all().filter(|f| config.is_enabled(*f)).collect();
    if enabled.contains(&Feature::Exceptions) {
        enabled.insert(Feature::ReferenceTypes);
    }
    if enabled.contains(&Feature::ReferenceTypes) {
        enabled.insert(Feature::BulkMemory);
    }
    enabled
}

fn required_features(bytes: &[u8]) -> Option<BTreeSet<Feature>> {
    if !bytes.starts_with(MAGIC) {
        return None;
    }
    let text = String::from_utf8_lossy(&bytes[MAGIC.len()..]).into_owned();
    let list = text
        .split_whitespace()
        .find_map(|word| word.strip_prefix("features="))
        .unwrap_or_default();
    Some(
        list.split(',')
            .filter(|name| !name.is_empty())
            .map(|name| name.parse().unwrap())
            .collect(),
    )
}

fn read(artifact: &Path) -> Result<Vec<u8>, ToolError> {
    std::fs::read(artifact).map_err(|source| ToolError::Spawn {
        program: "fake".to_string(),
        source,
    })
}

/// Validator modelling feature requirements from the file content
pub struct ContentValidator;

#[async_trait]
impl Validator for ContentValidator {
    async fn validate(
        &self,
        artifact: &Path,
        features: &FeatureConfig,
    ) -> Result<Validity, ToolError> {
        let bytes = read(artifact)?;
        match required_features(&bytes) {
            None => Ok(Validity::Invalid("0000000: error: bad magic value".to_string())),
            Some(required) if required.is_subset(&effective(features)) => Ok(Validity::Valid),
            Some(_) => Ok(Validity::Invalid("error: feature not enabled".to_string())),
        }
    }
}

/// Validator modelling a fixed requirement set, ignoring the file
pub struct ModelValidator {
    pub required: BTreeSet<Feature>,
}

impl ModelValidator {
    pub fn requiring(features: &[Feature]) -> Arc<Self> {
        Arc::new(Self {
            required: features.iter().copied().collect(),
        })
    }
}

#[async_trait]
impl Validator for ModelValidator {
    async fn validate(
        &self,
        _artifact: &Path,
        features: &FeatureConfig,
    ) -> Result<Validity, ToolError> {
        if self.required.is_subset(&effective(features)) {
            Ok(Validity::Valid)
        } else {
            Ok(Validity::Invalid("error: feature not enabled".to_string()))
        }
    }
}

/// Validator whose every call times out
pub struct HangingValidator;

#[async_trait]
impl Validator for HangingValidator {
    async fn validate(
        &self,
        _artifact: &Path,
        _features: &FeatureConfig,
    ) -> Result<Validity, ToolError> {
        Err(ToolError::Timeout {
            program: "wasm-validate".to_string(),
            timeout: Duration::from_secs(1),
        })
    }
}

pub struct ContentSections;

#[async_trait]
impl SectionLister for ContentSections {
    async fn custom_sections(&self, artifact: &Path) -> Result<Vec<String>, ToolError> {
        let text = String::from_utf8_lossy(&read(artifact)?).into_owned();
        let mut sections = vec!["name".to_string()];
        if text.contains("producers") {
            sections.push("producers".to_string());
        }
        Ok(sections)
    }
}

pub struct FixedProducers;

#[async_trait]
impl ProducersParser for FixedProducers {
    async fn producers(&self, _artifact: &Path) -> Result<Producers, ToolError> {
        let mut producers = Producers::default();
        producers
            .language
            .insert("Rust".to_string(), String::new());
        producers
            .processed_by
            .insert("rustc".to_string(), "1.47.0".to_string());
        Ok(producers)
    }
}

/// Counts one instruction per byte; rejects modules marked `nocount`
pub struct ContentCounter;

#[async_trait]
impl InstructionCounter for ContentCounter {
    async fn count_instructions(&self, artifact: &Path) -> Result<u64, ToolError> {
        let bytes = read(artifact)?;
        if String::from_utf8_lossy(&bytes).contains("nocount") {
            return Err(ToolError::Rejected {
                program: "wasm-opcodecnt".to_string(),
                code: 1,
                stderr: "error: unable to read custom section".to_string(),
            });
        }
        Ok(bytes.len() as u64)
    }
}

pub fn fake_toolchain() -> Toolchain {
    Toolchain {
        validator: Arc::new(ContentValidator),
        sections: Arc::new(ContentSections),
        producers: Arc::new(FixedProducers),
        counter: Arc::new(ContentCounter),
    }
}
