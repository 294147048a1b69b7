//! Merge-on-insert and persistence round-trip tests.

use wasm_corpus::config::paths;
use wasm_corpus::corpus::{ContentIdentity, CorpusIndex, CorpusStore};
use wasm_corpus::domain::{
    Feature, FeatureStatus, OccurrenceDescriptor, Producers, ProvenanceAttributes, SourceKind,
    Validity,
};

use tempfile::TempDir;

fn github(path: &str, repository: &str, stars: u64) -> OccurrenceDescriptor {
    OccurrenceDescriptor::new(path, SourceKind::SourceControl, "github").with_attributes(
        ProvenanceAttributes {
            repository: Some(repository.to_string()),
            stars: Some(stars),
            ..Default::default()
        },
    )
}

fn npm(path: &str, package: &str) -> OccurrenceDescriptor {
    OccurrenceDescriptor::new(path, SourceKind::Registry, "npm/top").with_attributes(
        ProvenanceAttributes {
            package: Some(package.to_string()),
            ..Default::default()
        },
    )
}

#[test]
fn test_duplicate_pairs_are_kept() {
    let id = ContentIdentity::of_bytes(b"module");
    let occurrence = npm("/npm/pkg/a.wasm", "pkg");

    let mut index = CorpusIndex::new();
    index.insert(id.clone(), occurrence.clone());
    index.insert(id.clone(), occurrence.clone());

    let record = index.get(&id).unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(record.files, vec![occurrence.clone(), occurrence]);
}

#[test]
fn test_merge_completeness_across_sources() {
    let id = ContentIdentity::of_bytes(b"shared");
    let inserted = vec![
        github("/gh/owner/repo/a.wasm", "owner/repo", 10),
        npm("/npm/pkg/a.wasm", "pkg"),
        OccurrenceDescriptor::new("/web/example.com/a.wasm", SourceKind::WebCrawl, "web"),
        OccurrenceDescriptor::new("/manual/a.wasm", SourceKind::Manual, "manual"),
    ];

    let mut index = CorpusIndex::new();
    index.insert(ContentIdentity::of_bytes(b"other"), npm("/npm/other/b.wasm", "other"));
    for occurrence in &inserted {
        index.insert(id.clone(), occurrence.clone());
    }

    let record = index.get(&id).unwrap();
    assert_eq!(record.files, inserted);
    assert_eq!(index.total_occurrences(), 5);
    assert_eq!(record.feature_status(), FeatureStatus::NotComputed);
}

#[test]
fn test_record_json_shape() {
    let id = ContentIdentity::of_bytes(b"module");
    let mut index = CorpusIndex::new();
    index.insert(id.clone(), github("/gh/o/r/a.wasm", "o/r", 3));

    let record = index.get_mut(&id).unwrap();
    record.size_bytes = 6;
    record.wasm_validate = Some(Validity::Valid);
    record.wasm_validate_no_extensions = Some(Validity::Invalid("error".to_string()));
    record.wasm_extensions = Some(vec![Feature::BulkMemory, Feature::Simd]);
    record.custom_sections = Some(vec!["name".to_string()]);
    record.instruction_count = Some(123);

    let json: serde_json::Value = serde_json::to_value(&index).unwrap();
    let record = &json[id.as_str()];
    assert_eq!(record["wasm_validate"], serde_json::json!(true));
    assert_eq!(record["wasm_validate_no_extensions"], serde_json::json!("error"));
    assert_eq!(record["wasm_extensions"], serde_json::json!(["bulk-memory", "simd"]));
    assert_eq!(record["producers"], serde_json::Value::Null);
    assert_eq!(record["files"][0]["repository"], serde_json::json!("o/r"));
    assert_eq!(record["files"][0]["stars"], serde_json::json!(3));
    assert_eq!(record["files"][0]["filename"], serde_json::json!("a.wasm"));
}

#[tokio::test]
async fn test_round_trip_through_store() {
    let temp = TempDir::new().unwrap();
    let store = CorpusStore::open(temp.path()).await.unwrap();

    let mut index = CorpusIndex::new();
    let a = ContentIdentity::of_bytes(b"a");
    let b = ContentIdentity::of_bytes(b"b");
    index.insert(b.clone(), npm("/npm/pkg/b.wasm", "pkg"));
    index.insert(a.clone(), github("/gh/o/r/a.wasm", "o/r", 1));
    index.insert(b.clone(), github("/gh/o/r/b.wasm", "o/r", 1));

    let mut with_siblings = npm("/npm/pkg/c.wasm", "pkg");
    with_siblings.sibling_extensions = Some(vec!["d.ts".to_string(), "js".to_string()]);
    index.insert(a.clone(), with_siblings);

    let record = index.get_mut(&a).unwrap();
    record.wasm_validate = Some(Validity::Valid);
    record.wasm_validate_no_extensions = Some(Validity::Valid);
    record.custom_sections = Some(vec!["producers".to_string()]);
    let mut producers = Producers::default();
    producers.language.insert("Rust".to_string(), String::new());
    record.producers = Some(producers);
    record.instruction_count = Some(77);

    let record = index.get_mut(&b).unwrap();
    record.wasm_validate = Some(Validity::Invalid("bad magic".to_string()));

    store.save_index(paths::ALL, &index).await.unwrap();
    let loaded = store.load_index(paths::ALL).await.unwrap();

    assert_eq!(loaded, index);
    let order: Vec<_> = loaded.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(order, vec![b.clone(), a.clone()]);
    assert_eq!(loaded.get(&a).unwrap().feature_status(), FeatureStatus::NoneRequired);
    assert_eq!(loaded.get(&b).unwrap().feature_status(), FeatureStatus::Invalid);

    let listing = std::fs::read_to_string(paths::file_listing(temp.path(), paths::ALL)).unwrap();
    assert_eq!(
        listing.lines().collect::<Vec<_>>(),
        vec!["/npm/pkg/b.wasm", "/gh/o/r/b.wasm", "/gh/o/r/a.wasm", "/npm/pkg/c.wasm"]
    );
}
