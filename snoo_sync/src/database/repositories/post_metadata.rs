use crate::database::models::PostMetadataRow;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqlitePostMetadataRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::PostMetadataRepository for SqlitePostMetadataRepository<'conn> {
    fn upsert(&self, metadata: &PostMetadataRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO post_metadata (post_identifier, visited, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(post_identifier) DO UPDATE SET
                visited = excluded.visited,
                expires_at = excluded.expires_at
            "#,
            params![
                metadata.post_identifier,
                if metadata.visited { 1 } else { 0 },
                metadata.expires_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, post_identifier: &str) -> Result<Option<PostMetadataRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT post_identifier, visited, expires_at FROM post_metadata WHERE post_identifier = ?1",
                params![post_identifier],
                |row| {
                    Ok(PostMetadataRow {
                        post_identifier: row.get(0)?,
                        visited: row.get::<_, i64>(1)? != 0,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn list(&self) -> Result<Vec<PostMetadataRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT post_identifier, visited, expires_at FROM post_metadata ORDER BY post_identifier",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PostMetadataRow {
                    post_identifier: row.get(0)?,
                    visited: row.get::<_, i64>(1)? != 0,
                    expires_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM post_metadata", [])?;
        Ok(())
    }
}
