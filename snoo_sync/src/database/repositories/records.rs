use crate::database::models::RecordRow;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteRecordRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "kind, identifier, payload, expires_at, last_refreshed_at, bookmarked, \
                       reported, sort_order, last_visited_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        kind: row.get(0)?,
        identifier: row.get(1)?,
        payload: row.get(2)?,
        expires_at: row.get(3)?,
        last_refreshed_at: row.get(4)?,
        bookmarked: row.get::<_, i64>(5)? != 0,
        reported: row.get::<_, i64>(6)? != 0,
        sort_order: row.get(7)?,
        last_visited_at: row.get(8)?,
    })
}

impl<'conn> super::RecordRepository for SqliteRecordRepository<'conn> {
    fn upsert(&self, record: &RecordRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO records (kind, identifier, payload, expires_at, last_refreshed_at,
                                 bookmarked, reported, sort_order, last_visited_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(kind, identifier) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at,
                last_refreshed_at = excluded.last_refreshed_at,
                bookmarked = excluded.bookmarked,
                reported = excluded.reported,
                sort_order = excluded.sort_order,
                last_visited_at = excluded.last_visited_at
            "#,
            params![
                record.kind,
                record.identifier,
                record.payload,
                record.expires_at,
                record.last_refreshed_at,
                if record.bookmarked { 1 } else { 0 },
                if record.reported { 1 } else { 0 },
                record.sort_order,
                record.last_visited_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, kind: &str, identifier: &str) -> Result<Option<RecordRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM records WHERE kind = ?1 AND identifier = ?2"),
                params![kind, identifier],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn list_kind(&self, kind: &str) -> Result<Vec<RecordRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM records WHERE kind = ?1 ORDER BY sort_order, rowid"
        ))?;
        let rows = stmt
            .query_map(params![kind], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_all(&self) -> Result<Vec<RecordRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM records ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_expired(&self, now: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}
