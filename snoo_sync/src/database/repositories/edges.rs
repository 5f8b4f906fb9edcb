use crate::database::models::EdgeRow;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteEdgeRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::EdgeRepository for SqliteEdgeRepository<'conn> {
    fn insert(&self, edge: &EdgeRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO record_edges
                (owner_kind, owner_identifier, child_kind, child_identifier, position)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                edge.owner_kind,
                edge.owner_identifier,
                edge.child_kind,
                edge.child_identifier,
                edge.position
            ],
        )?;
        Ok(())
    }

    fn children_of(&self, owner_kind: &str, owner_identifier: &str) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT owner_kind, owner_identifier, child_kind, child_identifier, position
            FROM record_edges
            WHERE owner_kind = ?1 AND owner_identifier = ?2
            ORDER BY position
            "#,
        )?;
        let rows = stmt.query_map(params![owner_kind, owner_identifier], |row| {
            Ok(EdgeRow {
                owner_kind: row.get(0)?,
                owner_identifier: row.get(1)?,
                child_kind: row.get(2)?,
                child_identifier: row.get(3)?,
                position: row.get(4)?,
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    fn list_all(&self) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT owner_kind, owner_identifier, child_kind, child_identifier, position
            FROM record_edges
            ORDER BY owner_kind, owner_identifier, position
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(EdgeRow {
                owner_kind: row.get(0)?,
                owner_identifier: row.get(1)?,
                child_kind: row.get(2)?,
                child_identifier: row.get(3)?,
                position: row.get(4)?,
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM record_edges", [])?;
        Ok(())
    }
}
