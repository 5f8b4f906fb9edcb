mod edges;
mod post_metadata;
mod records;

use super::models::{EdgeRow, PostMetadataRow, RecordRow};
use anyhow::Result;
use rusqlite::Connection;

/// Record rows keyed by `(kind, identifier)`. Timestamps are RFC 3339 in UTC, so string
/// comparison orders them.
pub trait RecordRepository {
    fn upsert(&self, record: &RecordRow) -> Result<()>;
    fn get(&self, kind: &str, identifier: &str) -> Result<Option<RecordRow>>;
    fn list_kind(&self, kind: &str) -> Result<Vec<RecordRow>>;
    fn list_all(&self) -> Result<Vec<RecordRow>>;
    fn count_expired(&self, now: &str) -> Result<usize>;
    fn clear(&self) -> Result<()>;
}

pub trait EdgeRepository {
    fn insert(&self, edge: &EdgeRow) -> Result<()>;
    fn children_of(&self, owner_kind: &str, owner_identifier: &str) -> Result<Vec<EdgeRow>>;
    fn list_all(&self) -> Result<Vec<EdgeRow>>;
    fn clear(&self) -> Result<()>;
}

pub trait PostMetadataRepository {
    fn upsert(&self, metadata: &PostMetadataRow) -> Result<()>;
    fn get(&self, post_identifier: &str) -> Result<Option<PostMetadataRow>>;
    fn list(&self) -> Result<Vec<PostMetadataRow>>;
    fn clear(&self) -> Result<()>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn records(&self) -> impl RecordRepository + '_ {
        records::SqliteRecordRepository { conn: self.conn }
    }

    pub fn edges(&self) -> impl EdgeRepository + '_ {
        edges::SqliteEdgeRepository { conn: self.conn }
    }

    pub fn post_metadata(&self) -> impl PostMetadataRepository + '_ {
        post_metadata::SqlitePostMetadataRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MIGRATIONS;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn row(kind: &str, identifier: &str, expires_at: Option<&str>) -> RecordRow {
        RecordRow {
            kind: kind.into(),
            identifier: identifier.into(),
            payload: "{}".into(),
            expires_at: expires_at.map(str::to_string),
            last_refreshed_at: None,
            bookmarked: false,
            reported: false,
            sort_order: 0,
            last_visited_at: None,
        }
    }

    #[test]
    fn record_upsert_replaces_by_identity() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let records = repos.records();

        records.upsert(&row("comment", "c1", None)).expect("insert");
        let mut updated = row("comment", "c1", None);
        updated.bookmarked = true;
        records.upsert(&updated).expect("update");
        records.upsert(&row("link", "c1", None)).expect("other kind");

        let fetched = records.get("comment", "c1").expect("get").expect("present");
        assert!(fetched.bookmarked);
        assert_eq!(records.list_kind("comment").expect("list").len(), 1);
        assert_eq!(records.list_all().expect("all").len(), 2);
        assert!(records.get("account", "c1").expect("get").is_none());
    }

    #[test]
    fn expired_rows_are_counted() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let records = repos.records();
        records
            .upsert(&row("comment", "old", Some("2020-01-01T00:00:00.000000Z")))
            .expect("old");
        records
            .upsert(&row("comment", "new", Some("2030-01-01T00:00:00.000000Z")))
            .expect("new");
        records.upsert(&row("comment", "kept", None)).expect("kept");
        assert_eq!(
            records
                .count_expired("2025-01-01T00:00:00.000000Z")
                .expect("count"),
            1
        );
    }

    #[test]
    fn edges_come_back_in_position_order() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let edges = repos.edges();
        for (position, child) in ["b", "a", "c"].iter().enumerate() {
            edges
                .insert(&EdgeRow {
                    owner_kind: "comment".into(),
                    owner_identifier: "root".into(),
                    child_kind: "comment".into(),
                    child_identifier: (*child).into(),
                    position: position as i64,
                })
                .expect("edge");
        }
        let children: Vec<String> = edges
            .children_of("comment", "root")
            .expect("children")
            .into_iter()
            .map(|edge| edge.child_identifier)
            .collect();
        assert_eq!(children, vec!["b", "a", "c"]);
        edges.clear().expect("clear");
        assert!(edges.list_all().expect("all").is_empty());
    }

    #[test]
    fn post_metadata_round_trip() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let metadata = repos.post_metadata();
        metadata
            .upsert(&PostMetadataRow {
                post_identifier: "p".into(),
                visited: true,
                expires_at: Some("2030-01-01T00:00:00.000000Z".into()),
            })
            .expect("upsert");
        let fetched = metadata.get("p").expect("get").expect("present");
        assert!(fetched.visited);
        assert_eq!(metadata.list().expect("list").len(), 1);
    }
}
