//! Index-addressed arena holding the working set of the record graph.
//!
//! Relations between records are [`RecordId`] handles into this arena, so a cyclic payload
//! (comment -> post -> subreddit -> comment) never produces owning cycles. Slots are not
//! reused after deletion; a stale handle simply resolves to nothing.

use crate::error::{SyncError, SyncResult};
use crate::records::{Fullname, PostMetadata, Record, RecordId, RecordKind, SyncObject};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct RecordStore {
    slots: Vec<Option<Record>>,
    index: HashMap<(RecordKind, String), RecordId>,
    metadata: BTreeMap<String, PostMetadata>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn record(&self, id: RecordId) -> SyncResult<&Record> {
        self.get(id).ok_or(SyncError::RecordNotFound)
    }

    pub fn record_mut(&mut self, id: RecordId) -> SyncResult<&mut Record> {
        self.get_mut(id).ok_or(SyncError::RecordNotFound)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Point lookup by identity.
    pub fn find(&self, kind: RecordKind, identifier: &str) -> Option<RecordId> {
        self.index.get(&(kind, identifier.to_string())).copied()
    }

    /// Lookup by `"{prefix}_{identifier}"`.
    pub fn find_fullname(&self, fullname: &str) -> SyncResult<Option<RecordId>> {
        let parsed = Fullname::parse(fullname)?;
        Ok(self.find(parsed.record_kind(), &parsed.identifier))
    }

    /// Adds a record under its identity. An existing record with the same identity is
    /// returned untouched instead; identity is never duplicated.
    pub(crate) fn insert(&mut self, record: Record) -> RecordId {
        let key = (record.kind(), record.identifier().to_string());
        if let Some(existing) = self.index.get(&key) {
            return *existing;
        }
        let id = RecordId(self.slots.len());
        self.slots.push(Some(record));
        self.index.insert(key, id);
        id
    }

    /// Removes the given records and scrubs every reference to them from the survivors.
    pub fn delete(&mut self, ids: &HashSet<RecordId>) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some(record) = self.slots.get_mut(id.0).and_then(Option::take) {
                self.index
                    .remove(&(record.kind(), record.identifier().to_string()));
                removed += 1;
            }
        }
        if removed > 0 {
            for record in self.slots.iter_mut().flatten() {
                for gone in ids {
                    record.forget(*gone);
                }
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|record| (RecordId(index), record)))
    }

    /// Predicate-based lookup over the live records, in insertion order.
    pub fn select<F>(&self, predicate: F) -> Vec<RecordId>
    where
        F: Fn(&Record) -> bool,
    {
        self.iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn of_kind(&self, kind: RecordKind) -> Vec<RecordId> {
        self.select(|record| record.kind() == kind)
    }

    pub fn fullname(&self, id: RecordId) -> Option<String> {
        self.get(id).map(Record::fullname)
    }

    /// The post a comment belongs to, following the back-reference.
    pub fn post_of(&self, id: RecordId) -> Option<RecordId> {
        self.get(id)?.as_comment()?.post
    }

    pub fn post_metadata(&self, post_identifier: &str) -> Option<&PostMetadata> {
        self.metadata.get(post_identifier)
    }

    pub fn post_metadata_mut(&mut self, post_identifier: &str) -> &mut PostMetadata {
        self.metadata
            .entry(post_identifier.to_string())
            .or_default()
    }

    pub fn post_metadata_entries(&self) -> impl Iterator<Item = (&String, &PostMetadata)> + '_ {
        self.metadata.iter()
    }

    pub fn retain_post_metadata<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str, &PostMetadata) -> bool,
    {
        let before = self.metadata.len();
        self.metadata.retain(|identifier, metadata| keep(identifier, metadata));
        before - self.metadata.len()
    }

    pub fn is_visited(&self, post_identifier: &str) -> bool {
        self.post_metadata(post_identifier)
            .map(|metadata| metadata.visited)
            .unwrap_or(false)
    }
}
