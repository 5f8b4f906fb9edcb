pub mod models;
pub mod repositories;

use crate::config::SyncPaths;
use crate::context::SyncContext;
use crate::records::{to_thing, PostMetadata, Record, RecordKind, SyncObject};
use crate::store::RecordStore;
use crate::utils::parse_rfc3339;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use models::{EdgeRow, PostMetadataRow, RecordRow};
use repositories::{EdgeRepository, PostMetadataRepository, RecordRepository};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS records (
        kind TEXT NOT NULL,
        identifier TEXT NOT NULL,
        payload TEXT NOT NULL,
        expires_at TEXT,
        last_refreshed_at TEXT,
        bookmarked INTEGER NOT NULL DEFAULT 0,
        reported INTEGER NOT NULL DEFAULT 0,
        sort_order INTEGER NOT NULL DEFAULT 0,
        last_visited_at TEXT,
        PRIMARY KEY (kind, identifier)
    );

    CREATE INDEX IF NOT EXISTS idx_records_expires_at ON records(expires_at);

    CREATE TABLE IF NOT EXISTS record_edges (
        owner_kind TEXT NOT NULL,
        owner_identifier TEXT NOT NULL,
        child_kind TEXT NOT NULL,
        child_identifier TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (owner_kind, owner_identifier, position),
        FOREIGN KEY (owner_kind, owner_identifier)
            REFERENCES records(kind, identifier) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS post_metadata (
        post_identifier TEXT PRIMARY KEY,
        visited INTEGER NOT NULL DEFAULT 0,
        expires_at TEXT
    );
"#;

/// Fixed-width UTC timestamps so the text columns sort chronologically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub records: usize,
    pub edges: usize,
    pub metadata: usize,
    /// Records that could not be written or read back (no thing prefix, bad payload).
    pub skipped: usize,
}

struct Snapshot {
    records: Vec<RecordRow>,
    edges: Vec<EdgeRow>,
    metadata: Vec<PostMetadataRow>,
    skipped: usize,
}

impl Snapshot {
    fn capture(store: &RecordStore) -> Self {
        let mut snapshot = Snapshot {
            records: Vec::with_capacity(store.len()),
            edges: Vec::new(),
            metadata: Vec::new(),
            skipped: 0,
        };
        for (id, record) in store.iter() {
            let Some(thing) = to_thing(store, id) else {
                snapshot.skipped += 1;
                continue;
            };
            let header = record.header();
            snapshot.records.push(RecordRow {
                kind: record.kind().as_str().to_string(),
                identifier: header.identifier.clone(),
                payload: thing.to_string(),
                expires_at: header.expires_at.map(timestamp),
                last_refreshed_at: header.last_refreshed_at.map(timestamp),
                bookmarked: header.is_bookmarked,
                reported: header.is_reported,
                sort_order: header.order,
                last_visited_at: record
                    .as_subreddit()
                    .and_then(|subreddit| subreddit.last_visited_at)
                    .map(timestamp),
            });
            let children = record
                .owned_children()
                .into_iter()
                .filter_map(|child| store.get(child));
            for (position, child) in children.enumerate() {
                snapshot.edges.push(EdgeRow {
                    owner_kind: record.kind().as_str().to_string(),
                    owner_identifier: header.identifier.clone(),
                    child_kind: child.kind().as_str().to_string(),
                    child_identifier: child.identifier().to_string(),
                    position: position as i64,
                });
            }
        }
        snapshot.metadata = store
            .post_metadata_entries()
            .map(|(identifier, metadata)| PostMetadataRow {
                post_identifier: identifier.clone(),
                visited: metadata.visited,
                expires_at: metadata.expires_at.map(timestamp),
            })
            .collect();
        snapshot
    }
}

fn find(store: &RecordStore, kind: &str, identifier: &str) -> Option<crate::records::RecordId> {
    RecordKind::from_name(kind).and_then(|kind| store.find(kind, identifier))
}

/// Puts back what a parse cannot reproduce: header columns, owned edges in their stored
/// order, subreddit visit times and post metadata.
fn apply_snapshot(
    store: &mut RecordStore,
    rows: &[RecordRow],
    edges: &[EdgeRow],
    metadata: &[PostMetadataRow],
) {
    for row in rows {
        let Some(id) = find(store, &row.kind, &row.identifier) else {
            continue;
        };
        let Some(record) = store.get_mut(id) else {
            continue;
        };
        let header = record.header_mut();
        header.expires_at = row.expires_at.as_deref().and_then(parse_rfc3339);
        header.last_refreshed_at = row.last_refreshed_at.as_deref().and_then(parse_rfc3339);
        header.is_bookmarked = row.bookmarked;
        header.is_reported = row.reported;
        header.order = row.sort_order;
        if let Some(subreddit) = record.as_subreddit_mut() {
            subreddit.last_visited_at = row.last_visited_at.as_deref().and_then(parse_rfc3339);
            subreddit.refresh_section_name();
        }
    }

    let mut owners: BTreeMap<(&str, &str), Vec<&EdgeRow>> = BTreeMap::new();
    for edge in edges {
        owners
            .entry((edge.owner_kind.as_str(), edge.owner_identifier.as_str()))
            .or_default()
            .push(edge);
    }
    for ((kind, identifier), mut children) in owners {
        let Some(owner) = find(store, kind, identifier) else {
            continue;
        };
        children.sort_by_key(|edge| edge.position);
        let children: Vec<_> = children
            .iter()
            .filter_map(|edge| find(store, &edge.child_kind, &edge.child_identifier))
            .collect();
        match store.get_mut(owner) {
            Some(Record::Multireddit(multi)) => multi.members = children.into_iter().collect(),
            Some(record) => {
                if let Some(comment) = record.as_comment_mut() {
                    comment.replies = children.clone();
                }
                for child in children {
                    if let Some(reply) = store.get_mut(child).and_then(Record::as_comment_mut) {
                        reply.parent = Some(owner);
                    }
                }
            }
            None => {}
        }
    }

    for row in metadata {
        *store.post_metadata_mut(&row.post_identifier) = PostMetadata {
            visited: row.visited,
            expires_at: row.expires_at.as_deref().and_then(parse_rfc3339),
        };
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &SyncPaths) -> Result<Self> {
        paths.ensure()?;
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Applies the schema. Returns whether the database file was created by this process.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)
                .context("failed to apply migrations")?;
            Ok(self.newly_created)
        })
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }

    /// Replaces the stored snapshot with the context's current graph, in one transaction.
    pub fn persist(&self, context: &SyncContext) -> Result<SnapshotReport> {
        let snapshot = context.perform(|store| Ok(Snapshot::capture(store)))?;
        let report = self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .context("failed to begin snapshot transaction")?;
            let repos = repositories::SqliteRepositories::new(&tx);
            repos.edges().clear()?;
            repos.records().clear()?;
            repos.post_metadata().clear()?;
            for row in &snapshot.records {
                repos.records().upsert(row)?;
            }
            for edge in &snapshot.edges {
                repos.edges().insert(edge)?;
            }
            for row in &snapshot.metadata {
                repos.post_metadata().upsert(row)?;
            }
            tx.commit().context("failed to commit snapshot")?;
            Ok(SnapshotReport {
                records: snapshot.records.len(),
                edges: snapshot.edges.len(),
                metadata: snapshot.metadata.len(),
                skipped: snapshot.skipped,
            })
        })?;
        tracing::info!(
            records = report.records,
            edges = report.edges,
            metadata = report.metadata,
            "persisted record graph"
        );
        Ok(report)
    }

    /// Loads the stored snapshot into the context. Records are re-created through the
    /// parser, so identity stays unique; expiration is restored as stored, not renewed.
    pub fn restore(&self, context: &SyncContext) -> Result<SnapshotReport> {
        let (rows, edges, metadata) = self.with_repositories(|repos| {
            Ok((
                repos.records().list_all()?,
                repos.edges().list_all()?,
                repos.post_metadata().list()?,
            ))
        })?;

        let mut skipped = 0;
        let mut things = Vec::with_capacity(rows.len());
        for row in &rows {
            match serde_json::from_str::<Value>(&row.payload) {
                Ok(thing) => things.push(thing),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        kind = %row.kind,
                        identifier = %row.identifier,
                        error = %err,
                        "stored payload is not valid JSON"
                    );
                }
            }
        }

        skipped += context.parse(|parser| {
            let mut rejected = 0;
            for thing in &things {
                match parser.parse_thing(thing) {
                    Ok(_) => {}
                    Err(err) if err.is_record_local() => rejected += 1,
                    Err(err) => return Err(err),
                }
            }
            Ok(rejected)
        })?;
        context.perform(|store| {
            apply_snapshot(store, &rows, &edges, &metadata);
            Ok(())
        })?;

        let report = SnapshotReport {
            records: rows.len() - skipped.min(rows.len()),
            edges: edges.len(),
            metadata: metadata.len(),
            skipped,
        };
        tracing::info!(records = report.records, skipped = report.skipped, "restored record graph");
        Ok(report)
    }

    /// Records whose stored expiration has passed.
    pub fn count_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_repositories(|repos| repos.records().count_expired(&timestamp(now)))
    }
}
