//! Scan, merge, enrich and filter over temporary source trees with fake tools.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::{fake_toolchain, module, module_uncountable, module_with_producers, HangingValidator};
use wasm_corpus::adapters::Toolchain;
use wasm_corpus::config::{paths, FilterSettings};
use wasm_corpus::core::{Enricher, FilterPipeline, RecordOutcome};
use wasm_corpus::corpus::{ContentIdentity, CorpusIndex, CorpusStore};
use wasm_corpus::domain::{Feature, FeatureStatus, SourceKind};
use wasm_corpus::ingest::{annotate_siblings, ProvenanceScanner, SourceSpec};

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn scan_all(sources: &[SourceSpec]) -> CorpusIndex {
    let scanner = ProvenanceScanner::new("*.wasm").unwrap();
    let mut index = CorpusIndex::new();
    for source in sources {
        for pair in scanner.scan(source).unwrap() {
            let (identity, occurrence) = pair.unwrap();
            index.insert(identity, occurrence);
        }
    }
    index
}

async fn materialize_and_enrich(store: &CorpusStore, index: &mut CorpusIndex, tools: Toolchain) {
    for (identity, record) in index.iter() {
        let primary = record.primary().unwrap();
        store
            .materialize(paths::ALL, identity, Path::new(&primary.absolute_path))
            .await
            .unwrap();
    }
    Enricher::new(tools)
        .enrich_index(index, |identity| store.artifact_path(paths::ALL, identity))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_three_sources_one_invalid_binary() {
    let github = TempDir::new().unwrap();
    let npm = TempDir::new().unwrap();
    let web = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let bytes = b"not a module";
    write(github.path(), "owner/repo/x.wasm", bytes);
    write(npm.path(), "pkg/x.wasm", bytes);
    write(web.path(), "example.com/x.wasm", bytes);

    let mut index = scan_all(&[
        SourceSpec::new(SourceKind::SourceControl, "github", github.path()),
        SourceSpec::new(SourceKind::Registry, "npm", npm.path()),
        SourceSpec::new(SourceKind::WebCrawl, "web", web.path()),
    ]);

    assert_eq!(index.len(), 1);
    assert_eq!(index.total_occurrences(), 3);
    let id = ContentIdentity::of_bytes(bytes);
    let record = index.get(&id).unwrap();
    assert_eq!(record.files[0].attributes.repository.as_deref(), Some("owner/repo"));
    assert_eq!(record.files[1].attributes.package.as_deref(), Some("pkg"));
    assert_eq!(record.files[2].attributes.domain.as_deref(), Some("example.com"));

    let store = CorpusStore::open(out.path()).await.unwrap();
    materialize_and_enrich(&store, &mut index, fake_toolchain()).await;

    let record = index.get(&id).unwrap();
    assert_eq!(record.size_bytes, bytes.len() as u64);
    assert!(!record.is_valid());
    assert_eq!(record.feature_status(), FeatureStatus::Invalid);
    assert!(record.custom_sections.is_none());
    assert!(record.instruction_count.is_none());

    let pipeline = FilterPipeline::default_steps(&FilterSettings::default()).unwrap();
    let report = pipeline.run(&mut index);
    let invalid = report.steps.iter().find(|s| s.step == "invalid").unwrap();
    assert_eq!(invalid.occurrences_removed, 3);
    assert_eq!(invalid.records_removed, 1);
    assert_eq!(report.after.occurrences, 0);
    assert!(index.is_empty());
}

#[tokio::test]
async fn test_enrichment_fields() {
    let github = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let plain = module(&[]);
    let featured = module(&[Feature::MutableGlobals, Feature::Simd]);
    let with_producers = module_with_producers();
    let uncountable = module_uncountable();
    write(github.path(), "a/plain/p.wasm", &plain);
    write(github.path(), "a/featured/f.wasm", &featured);
    write(github.path(), "a/producers/r.wasm", &with_producers);
    write(github.path(), "a/uncountable/u.wasm", &uncountable);

    let mut index = scan_all(&[SourceSpec::new(
        SourceKind::SourceControl,
        "github",
        github.path(),
    )]);
    assert_eq!(index.len(), 4);

    let store = CorpusStore::open(out.path()).await.unwrap();
    materialize_and_enrich(&store, &mut index, fake_toolchain()).await;

    let record = index.get(&ContentIdentity::of_bytes(&plain)).unwrap();
    assert!(record.is_valid());
    assert_eq!(record.feature_status(), FeatureStatus::NoneRequired);
    assert_eq!(record.custom_sections, Some(vec!["name".to_string()]));
    assert!(record.producers.is_none());
    assert_eq!(record.instruction_count, Some(plain.len() as u64));

    let record = index.get(&ContentIdentity::of_bytes(&featured)).unwrap();
    assert_eq!(
        record.feature_status(),
        FeatureStatus::Required(&[Feature::MutableGlobals, Feature::Simd])
    );

    let record = index.get(&ContentIdentity::of_bytes(&with_producers)).unwrap();
    let producers = record.producers.as_ref().unwrap();
    assert!(producers.language.contains_key("Rust"));
    assert_eq!(producers.processed_by.get("rustc").map(String::as_str), Some("1.47.0"));

    let record = index.get(&ContentIdentity::of_bytes(&uncountable)).unwrap();
    assert!(record.is_valid());
    assert_eq!(record.instruction_count, None);

    // Unknown counts are not tiny programs
    let pipeline = FilterPipeline::default_steps(&FilterSettings::default()).unwrap();
    pipeline.run(&mut index);
    assert!(index.contains(&ContentIdentity::of_bytes(&uncountable)));
}

#[tokio::test]
async fn test_fuzzer_outputs_remove_whole_record() {
    let github = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let bytes = module(&[]);
    write(github.path(), "fuzz/afl_out/queue/id0.wasm", &bytes);
    write(github.path(), "real/app/app.wasm", &bytes);
    let other = module(&[Feature::Simd]);
    write(github.path(), "real/app/other.wasm", &other);

    let mut index = scan_all(&[SourceSpec::new(
        SourceKind::SourceControl,
        "github",
        github.path(),
    )]);
    let store = CorpusStore::open(out.path()).await.unwrap();
    materialize_and_enrich(&store, &mut index, fake_toolchain()).await;

    let pipeline = FilterPipeline::default_steps(&FilterSettings::default()).unwrap();
    let report = pipeline.run(&mut index);
    let fuzz = report.steps.iter().find(|s| s.step == "fuzzer-outputs").unwrap();
    assert_eq!(fuzz.occurrences_removed, 2);
    assert_eq!(fuzz.records_removed, 1);
    assert_eq!(fuzz.removed_identities, vec![ContentIdentity::of_bytes(&bytes)]);
    assert!(index.contains(&ContentIdentity::of_bytes(&other)));
}

#[tokio::test]
async fn test_timeout_marks_record_and_resume_retries() {
    let github = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let bytes = module(&[]);
    write(github.path(), "owner/repo/x.wasm", &bytes);
    let mut index = scan_all(&[SourceSpec::new(
        SourceKind::SourceControl,
        "github",
        github.path(),
    )]);
    let id = ContentIdentity::of_bytes(&bytes);

    let store = CorpusStore::open(out.path()).await.unwrap();
    let mut hanging = fake_toolchain();
    hanging.validator = Arc::new(HangingValidator);
    materialize_and_enrich(&store, &mut index, hanging).await;

    let record = index.get(&id).unwrap();
    assert!(record.enrichment_error.is_some());
    assert!(!record.is_enriched());
    assert_eq!(record.feature_status(), FeatureStatus::NotComputed);

    // A resumed run retries the record
    store.save_index(paths::ALL, &index).await.unwrap();
    let mut resumed = store.load_index(paths::ALL).await.unwrap();
    let enricher = Enricher::new(fake_toolchain());
    let path = store.artifact_path(paths::ALL, &id);
    let (outcome, _) = enricher
        .enrich_record(&id, &path, resumed.get_mut(&id).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Valid);
    assert!(resumed.get(&id).unwrap().enrichment_error.is_none());

    // Left as timed out, the invalid step drops it
    let pipeline = FilterPipeline::default_steps(&FilterSettings::default()).unwrap();
    pipeline.run(&mut index);
    assert!(index.is_empty());
}

#[tokio::test]
async fn test_enriched_records_are_skipped() {
    let github = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let bytes = module(&[]);
    write(github.path(), "owner/repo/x.wasm", &bytes);
    let mut index = scan_all(&[SourceSpec::new(
        SourceKind::SourceControl,
        "github",
        github.path(),
    )]);
    let store = CorpusStore::open(out.path()).await.unwrap();
    materialize_and_enrich(&store, &mut index, fake_toolchain()).await;

    let mut hanging = fake_toolchain();
    hanging.validator = Arc::new(HangingValidator);
    let stats = Enricher::new(hanging)
        .enrich_index(&mut index, |identity| store.artifact_path(paths::ALL, identity))
        .await
        .unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
    assert!(index.iter().all(|(_, record)| record.is_valid()));
}

#[tokio::test]
async fn test_sibling_extensions_and_filtered_copy() {
    let github = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let bytes = module(&[]);
    write(github.path(), "owner/repo/pkg/app.wasm", &bytes);
    write(github.path(), "owner/repo/pkg/app.js", b"");
    write(github.path(), "owner/repo/pkg/app.html", b"");
    write(github.path(), "owner/repo/pkg/other.js", b"");

    let mut index = scan_all(&[SourceSpec::new(
        SourceKind::SourceControl,
        "github",
        github.path(),
    )]);
    assert_eq!(annotate_siblings(&mut index), 0);
    let occurrence = index.occurrences().next().unwrap();
    assert_eq!(
        occurrence.sibling_extensions,
        Some(vec!["html".to_string(), "js".to_string()])
    );

    let store = CorpusStore::open(out.path()).await.unwrap();
    materialize_and_enrich(&store, &mut index, fake_toolchain()).await;
    store
        .copy_collection(paths::ALL, paths::FILTERED, &index)
        .await
        .unwrap();

    let id = ContentIdentity::of_bytes(&bytes);
    let copied = fs::read(store.artifact_path(paths::FILTERED, &id)).unwrap();
    assert_eq!(ContentIdentity::of_bytes(&copied), id);
}
