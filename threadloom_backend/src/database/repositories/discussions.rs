use crate::database::models::{DiscussionRecord, NewDiscussionRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteDiscussionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<DiscussionRecord> {
    Ok(DiscussionRecord {
        discussion_id: row.get(0)?,
        name: row.get(1)?,
        insert_user_id: row.get(2)?,
        date_inserted: row.get(3)?,
        count_comments: row.get(4)?,
    })
}

impl<'conn> super::DiscussionRepository for SqliteDiscussionRepository<'conn> {
    fn create(&self, record: &NewDiscussionRecord) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO discussions (name, insert_user_id, date_inserted)
            VALUES (?1, ?2, ?3)
            "#,
            params![record.name, record.insert_user_id, record.date_inserted],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<DiscussionRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT discussion_id, name, insert_user_id, date_inserted, count_comments
                FROM discussions
                WHERE discussion_id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<DiscussionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT discussion_id, name, insert_user_id, date_inserted, count_comments
            FROM discussions
            ORDER BY date_inserted DESC, discussion_id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        let mut discussions = Vec::new();
        for row in rows {
            discussions.push(row?);
        }
        Ok(discussions)
    }

    fn adjust_comment_count(&self, id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE discussions
            SET count_comments = count_comments + ?2
            WHERE discussion_id = ?1
            "#,
            params![id, delta],
        )?;
        Ok(())
    }
}
