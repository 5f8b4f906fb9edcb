//! Incremental parser: merges reddit "Thing" payloads into the record graph.
//!
//! Every record is first given an identity through the resolver, then populated. Nested
//! records (replies, multireddit members) are resolved up front and queued on an explicit
//! worklist, so payload depth never turns into stack depth and cyclic references terminate
//! on the already-assigned handle.

mod comment;
pub(crate) mod fields;
mod post;
mod subreddit;

use crate::error::{SyncError, SyncResult};
use crate::expiration::ExpirationPolicy;
use crate::identity::{self, BatchCache};
use crate::records::{Record, RecordId, RecordKind, SyncObject, ThingType};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use fields::Data;
use serde_json::Value;
use std::collections::HashSet;

/// Records queued for population, each with the payload object it came from.
type Worklist<'v> = Vec<(RecordId, &'v Data)>;

/// The post and top-level comments of a comments response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsPage {
    pub post: Option<RecordId>,
    pub comments: Vec<RecordId>,
}

/// One parse pass. Owns the batch cache for the duration of the pass.
pub struct Parser<'s> {
    store: &'s mut RecordStore,
    policy: ExpirationPolicy,
    now: DateTime<Utc>,
    cache: BatchCache,
    skipped: usize,
}

impl<'s> Parser<'s> {
    pub fn new(store: &'s mut RecordStore, policy: ExpirationPolicy, now: DateTime<Utc>) -> Self {
        Self {
            store,
            policy,
            now,
            cache: BatchCache::new(),
            skipped: 0,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut *self.store
    }

    pub fn cache(&self) -> &BatchCache {
        &self.cache
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Records dropped from this pass because their payload was unusable.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Parses `{"kind": "t1", "data": {..}}`.
    pub fn parse_thing(&mut self, thing: &Value) -> SyncResult<RecordId> {
        let (thing_type, data) = split_thing(thing)?;
        self.parse_data(&thing_type, data)
    }

    /// Resolves and populates one record from its data object, along with everything nested
    /// in it.
    pub fn parse_data(&mut self, thing: &ThingType, data: &Data) -> SyncResult<RecordId> {
        let root = self.resolve_payload(thing, data)?;
        let mut work: Worklist<'_> = vec![(root, data)];
        while let Some((id, data)) = work.pop() {
            // Already discarded earlier in this pass.
            if !self.store.contains(id) {
                continue;
            }
            let Err(err) = self.populate(id, data, &mut work) else {
                continue;
            };
            if !err.is_record_local() {
                return Err(err);
            }
            self.discard(id);
            if id == root {
                return Err(err);
            }
            self.skip(&err);
        }
        Ok(root)
    }

    /// Parses a `Listing`. Children with unusable payloads are skipped; the rest keep their
    /// listing position as `order`.
    pub fn parse_listing(&mut self, listing: &Value) -> SyncResult<Vec<RecordId>> {
        let children = listing_children(listing).ok_or(SyncError::MalformedPayload)?;
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            match self.parse_thing(child) {
                Ok(id) => {
                    self.store.record_mut(id)?.header_mut().order = ids.len() as i64;
                    ids.push(id);
                }
                Err(err) if err.is_record_local() => self.skip(&err),
                Err(err) => return Err(err),
            }
        }
        Ok(ids)
    }

    /// Parses `{"json": {"data": {"things": [..]}}}`, the shape returned by reply
    /// submission and by the more-children endpoint.
    pub fn parse_things_response(&mut self, response: &Value) -> SyncResult<Vec<RecordId>> {
        let things = response
            .pointer("/json/data/things")
            .and_then(Value::as_array)
            .ok_or(SyncError::MalformedPayload)?;
        let mut ids = Vec::with_capacity(things.len());
        for thing in things {
            match self.parse_thing(thing) {
                Ok(id) => ids.push(id),
                Err(err) if err.is_record_local() => self.skip(&err),
                Err(err) => return Err(err),
            }
        }
        Ok(ids)
    }

    /// Parses `[post listing, comment listing]`. A bare comment listing is accepted as well.
    pub fn parse_comments_response(&mut self, response: &Value) -> SyncResult<CommentsPage> {
        let (post_listing, comment_listing) = match response {
            Value::Array(parts) if parts.len() > 1 => (parts.first(), parts.last()),
            Value::Array(parts) => (None, parts.first()),
            other => (None, Some(other)),
        };

        let mut page = CommentsPage::default();
        if let Some(listing) = post_listing {
            page.post = self.parse_listing(listing)?.into_iter().find(|id| {
                self.store
                    .get(*id)
                    .map(|record| record.kind() == RecordKind::Link)
                    .unwrap_or(false)
            });
        }
        if let Some(listing) = comment_listing {
            page.comments = self.parse_listing(listing)?;
        }

        if let Some(post) = page.post {
            for id in &page.comments {
                if let Some(comment) = self.store.get_mut(*id).and_then(Record::as_comment_mut) {
                    comment.post.get_or_insert(post);
                }
            }
        }
        Ok(page)
    }

    fn resolve_payload(&mut self, thing: &ThingType, data: &Data) -> SyncResult<RecordId> {
        let identifier = identity::payload_identifier(data)?;
        let id = self.resolve(thing.record_kind(), &identifier)?;
        if let (ThingType::Other(prefix), Some(Record::Unknown(generic))) =
            (thing, self.store.get_mut(id))
        {
            generic.thing_prefix.get_or_insert_with(|| prefix.clone());
        }
        Ok(id)
    }

    fn resolve(&mut self, kind: RecordKind, identifier: &str) -> SyncResult<RecordId> {
        identity::resolve(kind, identifier, &mut self.cache, self.store)
    }

    /// Base fields first, then the kind-specific layer.
    fn populate<'v>(
        &mut self,
        id: RecordId,
        data: &'v Data,
        work: &mut Worklist<'v>,
    ) -> SyncResult<()> {
        let kind = self.store.record(id)?.kind();
        match kind {
            RecordKind::Comment | RecordKind::More => self.populate_comment(id, data, work),
            RecordKind::Link => self.populate_post(id, data),
            RecordKind::Message => self.populate_message(id, data),
            RecordKind::Account => self.populate_account(id, data),
            RecordKind::Subreddit => self.populate_subreddit(id, data),
            RecordKind::Multireddit => self.populate_multireddit(id, data, work),
            RecordKind::Unknown => Ok(()),
        }?;
        let record = self.store.record_mut(id)?;
        self.policy.stamp(record.header_mut(), kind, self.now);
        Ok(())
    }

    /// Drops a record this pass created for a payload that was then rejected. Records that
    /// were already stored keep their previous fields and expiration.
    fn discard(&mut self, id: RecordId) {
        if self.cache.was_inserted(id) {
            self.store.delete(&HashSet::from([id]));
            self.cache.evict(id);
        }
    }

    /// Resolves the things of a nested listing and queues them for population.
    fn queue_children<'v>(
        &mut self,
        children: &'v [Value],
        work: &mut Worklist<'v>,
        accept: impl Fn(RecordKind) -> bool,
    ) -> SyncResult<Vec<RecordId>> {
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let (thing, data) = match split_thing(child) {
                Ok(parts) => parts,
                Err(err) => {
                    self.skip(&err);
                    continue;
                }
            };
            if !accept(thing.record_kind()) {
                continue;
            }
            match self.resolve_payload(&thing, data) {
                Ok(id) => {
                    ids.push(id);
                    work.push((id, data));
                }
                Err(err) if err.is_record_local() => self.skip(&err),
                Err(err) => return Err(err),
            }
        }
        Ok(ids)
    }

    fn skip(&mut self, err: &SyncError) {
        self.skipped += 1;
        tracing::warn!(error = %err, "skipping record in batch");
    }
}

fn split_thing(thing: &Value) -> SyncResult<(ThingType, &Data)> {
    let kind = thing
        .get("kind")
        .and_then(Value::as_str)
        .ok_or(SyncError::MalformedPayload)?;
    let data = thing
        .get("data")
        .and_then(Value::as_object)
        .ok_or(SyncError::MalformedPayload)?;
    Ok((ThingType::from_prefix(kind), data))
}

/// Accepts the `Listing` wrapper or its bare `data` object.
fn listing_children(listing: &Value) -> Option<&Vec<Value>> {
    let data = listing.get("data").unwrap_or(listing);
    data.get("children").and_then(Value::as_array)
}
