//! Per-kind time-to-live and the eviction sweep.

use crate::error::SyncResult;
use crate::records::{Record, RecordHeader, RecordId, RecordKind, SyncObject};
use crate::store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub content_ttl: Duration,
    pub subreddit_ttl: Duration,
    pub post_metadata_ttl: Duration,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            content_ttl: Duration::hours(1),
            subreddit_ttl: Duration::days(365),
            post_metadata_ttl: Duration::days(30),
        }
    }
}

impl ExpirationPolicy {
    pub fn ttl_for(&self, kind: RecordKind) -> Duration {
        match kind {
            RecordKind::Subreddit | RecordKind::Multireddit => self.subreddit_ttl,
            _ => self.content_ttl,
        }
    }

    /// Renews the expiration of a freshly parsed record. Reported records keep theirs.
    pub fn stamp(&self, header: &mut RecordHeader, kind: RecordKind, now: DateTime<Utc>) {
        if !header.is_reported {
            header.expires_at = Some(now + self.ttl_for(kind));
        }
        header.last_refreshed_at = Some(now);
    }
}

/// Flags a record as reported. It is never renewed or swept afterwards, and a reported
/// post is hidden.
pub fn mark_reported(store: &mut RecordStore, id: RecordId) -> SyncResult<()> {
    let record = store.record_mut(id)?;
    let header = record.header_mut();
    header.is_reported = true;
    header.expires_at = None;
    if let Some(post) = record.as_post_mut() {
        post.is_hidden = true;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub records_removed: usize,
    pub by_kind: BTreeMap<RecordKind, usize>,
    pub metadata_removed: usize,
}

/// Bookmarked records and subreddits the user has visited survive their expiration.
fn is_protected(record: &Record) -> bool {
    record.header().is_bookmarked
        || record
            .as_subreddit()
            .map(|subreddit| subreddit.last_visited_at.is_some())
            .unwrap_or(false)
}

fn is_expired(record: &Record, now: DateTime<Utc>) -> bool {
    record
        .header()
        .expires_at
        .map(|expires_at| expires_at < now)
        .unwrap_or(false)
}

/// Deletes every expired record together with what it owns (replies, multireddit members).
/// Back-references are not followed; dangling ones are cleared on the survivors.
pub fn sweep(store: &mut RecordStore, now: DateTime<Utc>) -> SweepReport {
    let mut stack: Vec<RecordId> =
        store.select(|record| is_expired(record, now) && !is_protected(record));
    let mut doomed = HashSet::new();
    while let Some(id) = stack.pop() {
        if !doomed.insert(id) {
            continue;
        }
        if let Some(record) = store.get(id) {
            stack.extend(
                record
                    .owned_children()
                    .into_iter()
                    .filter(|child| store.get(*child).map(|r| !is_protected(r)).unwrap_or(false)),
            );
        }
    }

    let mut report = SweepReport::default();
    for id in &doomed {
        if let Some(record) = store.get(*id) {
            *report.by_kind.entry(record.kind()).or_default() += 1;
        }
    }
    report.records_removed = store.delete(&doomed);
    report.metadata_removed = store.retain_post_metadata(|_, metadata| {
        metadata
            .expires_at
            .map(|expires_at| expires_at >= now)
            .unwrap_or(true)
    });

    if report.records_removed > 0 || report.metadata_removed > 0 {
        tracing::info!(
            records = report.records_removed,
            metadata = report.metadata_removed,
            "evicted expired records"
        );
    }
    report
}
