//! Maps `(kind, identifier)` to exactly one record handle.

use crate::error::{SyncError, SyncResult};
use crate::records::{Fullname, Record, RecordId, RecordKind, ThingType};
use crate::store::RecordStore;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Identity cache scoped to a single parse pass. Build a fresh one per pass and drop it
/// afterwards; it is not meant to be shared across passes or threads.
#[derive(Debug, Default)]
pub struct BatchCache {
    entries: HashMap<String, RecordId>,
    inserted: HashSet<RecordId>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: RecordKind, identifier: &str) -> String {
        format!("{kind}-{identifier}")
    }

    pub fn get(&self, kind: RecordKind, identifier: &str) -> Option<RecordId> {
        self.entries.get(&Self::key(kind, identifier)).copied()
    }

    fn register(&mut self, kind: RecordKind, identifier: &str, id: RecordId) {
        self.entries.insert(Self::key(kind, identifier), id);
    }

    /// Whether the record was created (rather than found) during this pass.
    pub fn was_inserted(&self, id: RecordId) -> bool {
        self.inserted.contains(&id)
    }

    /// Forgets a record that was removed from the store mid-pass, so a later lookup in the
    /// same pass inserts it afresh.
    pub(crate) fn evict(&mut self, id: RecordId) {
        self.entries.retain(|_, cached| *cached != id);
        self.inserted.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Three-tier lookup: the batch cache, then the store, then a fresh bare insert.
///
/// A newly inserted record carries only its identifier. Because it already has a stable
/// handle, the parser can follow relationships back to it without looping.
pub fn resolve(
    kind: RecordKind,
    identifier: &str,
    cache: &mut BatchCache,
    store: &mut RecordStore,
) -> SyncResult<RecordId> {
    if identifier.is_empty() {
        return Err(SyncError::InvalidIdentifier);
    }
    if let Some(id) = cache.get(kind, identifier) {
        return Ok(id);
    }
    if let Some(id) = store.find(kind, identifier) {
        cache.register(kind, identifier, id);
        return Ok(id);
    }
    let id = store.insert(Record::bare(kind, identifier));
    cache.register(kind, identifier, id);
    cache.inserted.insert(id);
    tracing::trace!(kind = %kind, identifier, "inserted bare record");
    Ok(id)
}

/// Resolves a `"{prefix}_{identifier}"` reference. Unknown prefixes resolve to a generic
/// record that remembers the prefix.
pub fn resolve_fullname(
    fullname: &str,
    cache: &mut BatchCache,
    store: &mut RecordStore,
) -> SyncResult<RecordId> {
    let parsed = Fullname::parse(fullname)?;
    let id = resolve(parsed.record_kind(), &parsed.identifier, cache, store)?;
    if let ThingType::Other(prefix) = &parsed.thing {
        if let Some(Record::Unknown(generic)) = store.get_mut(id) {
            generic.thing_prefix.get_or_insert_with(|| prefix.clone());
        }
    }
    Ok(id)
}

/// Identifier carried by a payload: `id` first, then the identifier half of a well-formed
/// `name`, then `name` verbatim (multireddits use bare names).
pub fn payload_identifier(data: &Map<String, Value>) -> SyncResult<String> {
    if let Some(id) = data.get("id").and_then(Value::as_str) {
        return Ok(id.to_string());
    }
    let name = data
        .get("name")
        .and_then(Value::as_str)
        .ok_or(SyncError::MalformedPayload)?;
    match Fullname::parse(name) {
        Ok(fullname) if fullname.thing.is_known() => Ok(fullname.identifier),
        _ => Ok(name.to_string()),
    }
}
