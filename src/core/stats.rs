//! Per-collection-method counts over an index.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::corpus::CorpusIndex;
use crate::domain::{OccurrenceDescriptor, SourceKind};

/// Counts for one collection method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MethodCounts {
    /// Occurrences collected by this method
    pub total: usize,

    /// Records with at least one occurrence from this method
    pub unique: usize,

    /// Records found by this method and no other
    pub exclusive: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub methods: BTreeMap<String, MethodCounts>,
    pub total_occurrences: usize,
    pub unique_records: usize,
}

/// Key an occurrence is counted under; crawled occurrences are split by seed list
pub fn method_key(occurrence: &OccurrenceDescriptor) -> String {
    match (&occurrence.source_kind, &occurrence.attributes.seed_list) {
        (SourceKind::WebCrawl, Some(seed_list)) => {
            format!("{}/{}", occurrence.collection_method, seed_list)
        }
        _ => occurrence.collection_method.clone(),
    }
}

impl CollectionStats {
    pub fn from_index(index: &CorpusIndex) -> Self {
        let mut stats = CollectionStats {
            unique_records: index.len(),
            ..Default::default()
        };

        for (_, record) in index.iter() {
            let mut seen = BTreeSet::new();
            for occurrence in &record.files {
                let key = method_key(occurrence);
                stats.methods.entry(key.clone()).or_default().total += 1;
                stats.total_occurrences += 1;
                seen.insert(key);
            }

            if seen.len() == 1 {
                if let Some(only) = seen.iter().next() {
                    stats.methods.entry(only.clone()).or_default().exclusive += 1;
                }
            }
            for key in seen {
                stats.methods.entry(key).or_default().unique += 1;
            }
        }

        stats
    }

    /// One line per method (`method total unique exclusive`), then `all total unique`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (method, counts) in &self.methods {
            let _ = writeln!(
                out,
                "{} {} {} {}",
                method, counts.total, counts.unique, counts.exclusive
            );
        }
        let _ = writeln!(out, "all {} {}", self.total_occurrences, self.unique_records);
        out
    }
}
