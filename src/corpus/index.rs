//! In-memory corpus index: content identity → unique artifact record.
//!
//! Records keep insertion order (scan order across sources), which is also the
//! order used for serialization and for the flat path listing.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::identity::ContentIdentity;
use crate::domain::{OccurrenceDescriptor, UniqueArtifactRecord};

/// What a single removal pass took out of the index
#[derive(Debug, Clone, Default)]
pub struct Removal {
    /// Every occurrence removed, including those of removed records
    pub occurrences: Vec<OccurrenceDescriptor>,

    /// Records deleted from the index, with their occurrence lists as they were
    pub records: Vec<(ContentIdentity, UniqueArtifactRecord)>,
}

impl Removal {
    pub fn occurrences_removed(&self) -> usize {
        self.occurrences.len()
    }

    pub fn records_removed(&self) -> usize {
        self.records.len()
    }

    pub fn removed_identities(&self) -> impl Iterator<Item = &ContentIdentity> {
        self.records.iter().map(|(id, _)| id)
    }
}

/// Deduplicated corpus index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusIndex {
    entries: Vec<(ContentIdentity, UniqueArtifactRecord)>,
    positions: HashMap<ContentIdentity, usize>,
}

impl CorpusIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one occurrence into the index.
    ///
    /// Creates the record on first observation of `identity`; otherwise appends
    /// to the existing occurrence list. Duplicate descriptors are kept.
    pub fn insert(&mut self, identity: ContentIdentity, descriptor: OccurrenceDescriptor) {
        let position = match self.positions.get(&identity) {
            Some(&position) => position,
            None => {
                let position = self.entries.len();
                self.entries
                    .push((identity.clone(), UniqueArtifactRecord::new()));
                self.positions.insert(identity, position);
                position
            }
        };

        self.entries[position].1.files.push(descriptor);
    }

    /// Insert a complete record, e.g. when loading a persisted index.
    ///
    /// Fails if the identity is already present or the record has no occurrences.
    pub fn insert_record(
        &mut self,
        identity: ContentIdentity,
        record: UniqueArtifactRecord,
    ) -> anyhow::Result<()> {
        if record.files.is_empty() {
            anyhow::bail!("Record {} has no occurrences", identity);
        }
        if self.positions.contains_key(&identity) {
            anyhow::bail!("Duplicate record for {}", identity);
        }

        self.positions.insert(identity.clone(), self.entries.len());
        self.entries.push((identity, record));
        Ok(())
    }

    /// Get a record by identity
    pub fn get(&self, identity: &ContentIdentity) -> Option<&UniqueArtifactRecord> {
        self.positions.get(identity).map(|&i| &self.entries[i].1)
    }

    /// Get a mutable record by identity
    pub fn get_mut(&mut self, identity: &ContentIdentity) -> Option<&mut UniqueArtifactRecord> {
        match self.positions.get(identity) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains(&self, identity: &ContentIdentity) -> bool {
        self.positions.contains_key(identity)
    }

    /// Iterate records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ContentIdentity, &UniqueArtifactRecord)> {
        self.entries.iter().map(|(id, record)| (id, record))
    }

    /// Iterate records mutably in insertion order
    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ContentIdentity, &mut UniqueArtifactRecord)> {
        self.entries.iter_mut().map(|(id, record)| (&*id, record))
    }

    /// Iterate every occurrence of every record, in order
    pub fn occurrences(&self) -> impl Iterator<Item = &OccurrenceDescriptor> {
        self.entries.iter().flat_map(|(_, record)| record.files.iter())
    }

    /// Mutable access to every occurrence, for annotation passes
    pub fn occurrences_mut(&mut self) -> impl Iterator<Item = &mut OccurrenceDescriptor> {
        self.entries
            .iter_mut()
            .flat_map(|(_, record)| record.files.iter_mut())
    }

    /// Number of unique records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of occurrences across all records
    pub fn total_occurrences(&self) -> usize {
        self.entries.iter().map(|(_, r)| r.files.len()).sum()
    }

    /// Remove every occurrence matching `predicate`.
    ///
    /// Records left without occurrences are deleted in the same pass; they are
    /// reported with their full occurrence list.
    pub fn remove_occurrences<F>(&mut self, mut predicate: F) -> Removal
    where
        F: FnMut(&OccurrenceDescriptor) -> bool,
    {
        let mut removal = Removal::default();
        let mut emptied = Vec::new();

        for (index, (_, record)) in self.entries.iter_mut().enumerate() {
            let (removed, kept): (Vec<_>, Vec<_>) =
                record.files.drain(..).partition(|occ| predicate(occ));

            if kept.is_empty() {
                record.files = removed.clone();
                emptied.push(index);
            } else {
                record.files = kept;
            }
            removal.occurrences.extend(removed);
        }

        removal.records = self.take_positions(&emptied);
        removal
    }

    /// Remove every record matching `predicate`, with all its occurrences
    pub fn remove_records<F>(&mut self, mut predicate: F) -> Removal
    where
        F: FnMut(&ContentIdentity, &UniqueArtifactRecord) -> bool,
    {
        let matching: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (id, record))| predicate(id, record))
            .map(|(index, _)| index)
            .collect();

        let records = self.take_positions(&matching);
        let occurrences = records
            .iter()
            .flat_map(|(_, record)| record.files.iter().cloned())
            .collect();

        Removal {
            occurrences,
            records,
        }
    }

    /// Remove every record where at least one occurrence matches `predicate`
    pub fn remove_records_any<F>(&mut self, mut predicate: F) -> Removal
    where
        F: FnMut(&OccurrenceDescriptor) -> bool,
    {
        self.remove_records(|_, record| record.files.iter().any(&mut predicate))
    }

    /// Delete the entries at the given (ascending) positions and reindex
    fn take_positions(&mut self, indices: &[usize]) -> Vec<(ContentIdentity, UniqueArtifactRecord)> {
        if indices.is_empty() {
            return Vec::new();
        }

        let mut taken = Vec::with_capacity(indices.len());
        let mut kept = Vec::with_capacity(self.entries.len() - indices.len());
        let mut next = indices.iter().peekable();

        for (index, entry) in self.entries.drain(..).enumerate() {
            if next.peek() == Some(&&index) {
                next.next();
                taken.push(entry);
            } else {
                kept.push(entry);
            }
        }

        self.entries = kept;
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();

        taken
    }
}

impl Serialize for CorpusIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, record) in &self.entries {
            map.serialize_entry(id, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CorpusIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IndexVisitor;

        impl<'de> Visitor<'de> for IndexVisitor {
            type Value = CorpusIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from content identity to artifact record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut index = CorpusIndex::new();
                while let Some((id, record)) =
                    access.next_entry::<ContentIdentity, UniqueArtifactRecord>()?
                {
                    index
                        .insert_record(id, record)
                        .map_err(<A::Error as serde::de::Error>::custom)?;
                }
                Ok(index)
            }
        }

        deserializer.deserialize_map(IndexVisitor)
    }
}
