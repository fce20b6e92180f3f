//! Evidence aggregation across the claims of a backstory
//!
//! Aggregation is plain concatenation keyed by story. Repeated chunks are kept:
//! a chunk retrieved for two claims counts as two signals.

use std::collections::BTreeMap;

use crate::records::EvidenceRecord;

/// All evidence gathered for one story
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSet {
    story_id: String,
    records: Vec<EvidenceRecord>,
}

impl EvidenceSet {
    pub fn new(story_id: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            records: Vec::new(),
        }
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn push(&mut self, record: EvidenceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EvidenceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Extend<EvidenceRecord> for EvidenceSet {
    fn extend<I: IntoIterator<Item = EvidenceRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl<'a> IntoIterator for &'a EvidenceSet {
    type Item = &'a EvidenceRecord;
    type IntoIter = std::slice::Iter<'a, EvidenceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Evidence sets keyed by story id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSets {
    sets: BTreeMap<String, EvidenceSet>,
}

impl EvidenceSets {
    pub fn get(&self, story_id: &str) -> Option<&EvidenceSet> {
        self.sets.get(story_id)
    }

    /// Remove and return a story's set, empty when the story has no evidence
    pub fn take(&mut self, story_id: &str) -> EvidenceSet {
        self.sets
            .remove(story_id)
            .unwrap_or_else(|| EvidenceSet::new(story_id))
    }

    /// Story ids in sorted order
    pub fn stories(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl IntoIterator for EvidenceSets {
    type Item = EvidenceSet;
    type IntoIter = std::collections::btree_map::IntoValues<String, EvidenceSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.into_values()
    }
}

/// Group evidence records by story, keeping every record
pub fn aggregate<I>(records: I) -> EvidenceSets
where
    I: IntoIterator<Item = EvidenceRecord>,
{
    let mut sets: BTreeMap<String, EvidenceSet> = BTreeMap::new();
    for record in records {
        sets.entry(record.story_id.clone())
            .or_insert_with(|| EvidenceSet::new(record.story_id.clone()))
            .push(record);
    }
    EvidenceSets { sets }
}
