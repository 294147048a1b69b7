//! Feature prober tests against a modelled validator.

mod common;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use common::ModelValidator;
use wasm_corpus::adapters::{ToolError, Validator};
use wasm_corpus::core::{FeatureProber, ProbeError};
use wasm_corpus::domain::{Feature, FeatureConfig, Validity};

const ARTIFACT: &str = "module.wasm";

fn catalog_orders() -> Vec<Vec<Feature>> {
    let forward: Vec<Feature> = Feature::all().collect();
    let reversed: Vec<Feature> = forward.iter().rev().copied().collect();
    let mut rotated = forward.clone();
    rotated.rotate_left(5);
    vec![forward, reversed, rotated]
}

#[tokio::test]
async fn test_exact_pair_regardless_of_catalog_order() {
    for (a, b) in [
        (Feature::Simd, Feature::Threads),
        (Feature::MultiValue, Feature::Memory64),
        (Feature::BulkMemory, Feature::TailCall),
        (Feature::ReferenceTypes, Feature::SignExtension),
    ] {
        for catalog in catalog_orders() {
            let prober = FeatureProber::new(ModelValidator::requiring(&[a, b])).with_catalog(catalog);
            let result = prober.probe(Path::new(ARTIFACT), "m").await.unwrap();

            let mut expected = vec![a, b];
            expected.sort();
            assert_eq!(result.validity, Validity::Valid);
            assert_eq!(result.features, Some(expected));
        }
    }
}

#[tokio::test]
async fn test_implied_features_need_corrections() {
    // Without the corrections, enabling exceptions would mask both of these
    for required in [Feature::ReferenceTypes, Feature::BulkMemory] {
        let prober = FeatureProber::new(ModelValidator::requiring(&[required]));
        let features = prober
            .required_features(Path::new(ARTIFACT), "m")
            .await
            .unwrap();
        assert_eq!(features, vec![required]);
    }
}

/// Rejects everything except full mode
struct InvalidValidator;

#[async_trait]
impl Validator for InvalidValidator {
    async fn validate(&self, _: &Path, _: &FeatureConfig) -> Result<Validity, ToolError> {
        Ok(Validity::Invalid("0000008: error: bad section".to_string()))
    }
}

#[tokio::test]
async fn test_invalid_artifact_has_no_feature_set() {
    let prober = FeatureProber::new(Arc::new(InvalidValidator));
    let result = prober.probe(Path::new(ARTIFACT), "m").await.unwrap();

    assert!(!result.validity.is_valid());
    assert_eq!(result.default_validity, None);
    assert_eq!(result.features, None);
}

#[tokio::test]
async fn test_default_valid_artifact_has_no_feature_set() {
    let prober = FeatureProber::new(ModelValidator::requiring(&[Feature::SignExtension]));
    let result = prober.probe(Path::new(ARTIFACT), "m").await.unwrap();

    assert_eq!(result.validity, Validity::Valid);
    assert_eq!(result.default_validity, Some(Validity::Valid));
    assert_eq!(result.features, None);
}

/// Rejects the default configuration but accepts every single-feature trial
struct InconsistentValidator;

#[async_trait]
impl Validator for InconsistentValidator {
    async fn validate(&self, _: &Path, features: &FeatureConfig) -> Result<Validity, ToolError> {
        let enabled = Feature::all().filter(|f| features.is_enabled(*f)).count();
        if enabled >= 10 {
            Ok(Validity::Valid)
        } else {
            Ok(Validity::Invalid("rejected".to_string()))
        }
    }
}

#[tokio::test]
async fn test_empty_feature_set_is_fatal() {
    let prober = FeatureProber::new(Arc::new(InconsistentValidator));
    let err = prober.probe(Path::new(ARTIFACT), "deadbeef").await.unwrap_err();

    match err {
        ProbeError::EmptyFeatureSet { identity } => assert_eq!(identity, "deadbeef"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_validator_errors_propagate() {
    let prober = FeatureProber::new(Arc::new(common::HangingValidator));
    let err = prober.probe(Path::new(ARTIFACT), "m").await.unwrap_err();
    assert!(err.is_timeout());
}
