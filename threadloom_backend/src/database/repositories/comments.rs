use crate::database::models::{CommentAggregates, CommentRecord, NewCommentRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COMMENT_COLUMNS: &str = "comment_id, discussion_id, parent_comment_id, insert_user_id, body, \
     date_inserted, date_updated, depth, score, score_child_comments, count_child_comments";

fn map_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        comment_id: row.get(0)?,
        discussion_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        insert_user_id: row.get(3)?,
        body: row.get(4)?,
        date_inserted: row.get(5)?,
        date_updated: row.get(6)?,
        depth: row.get(7)?,
        score: row.get(8)?,
        score_child_comments: row.get(9)?,
        count_child_comments: row.get(10)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &NewCommentRecord) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO comments (discussion_id, parent_comment_id, insert_user_id, body, date_inserted, depth)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.discussion_id,
                record.parent_comment_id,
                record.insert_user_id,
                record.body,
                record.date_inserted,
                record.depth,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<CommentRecord>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1");
        Ok(self.conn.query_row(&sql, params![id], map_row).optional()?)
    }

    fn list_for_discussion(&self, discussion_id: i64) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE discussion_id = ?1 ORDER BY comment_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![discussion_id], map_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn count_for_discussion(&self, discussion_id: i64) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE discussion_id = ?1",
            params![discussion_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn adjust_aggregates(
        &self,
        id: i64,
        score: i64,
        score_child_comments: i64,
        count_child_comments: i64,
    ) -> Result<CommentAggregates> {
        let aggregates = self.conn.query_row(
            r#"
            UPDATE comments
            SET score = score + ?2,
                score_child_comments = score_child_comments + ?3,
                count_child_comments = count_child_comments + ?4
            WHERE comment_id = ?1
            RETURNING score, score_child_comments, count_child_comments
            "#,
            params![id, score, score_child_comments, count_child_comments],
            |row| {
                Ok(CommentAggregates {
                    score: row.get(0)?,
                    score_child_comments: row.get(1)?,
                    count_child_comments: row.get(2)?,
                })
            },
        )?;
        Ok(aggregates)
    }

    fn set_aggregates(&self, id: i64, aggregates: CommentAggregates) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE comments
            SET score = ?2, score_child_comments = ?3, count_child_comments = ?4
            WHERE comment_id = ?1
            "#,
            params![
                id,
                aggregates.score,
                aggregates.score_child_comments,
                aggregates.count_child_comments
            ],
        )?;
        Ok(())
    }

    fn detach_children(&self, parent_comment_id: i64, depth_shift: u32) -> Result<usize> {
        // Depths first: the recursive walk needs the parent links intact.
        self.conn.execute(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT comment_id FROM comments WHERE parent_comment_id = ?1
                UNION ALL
                SELECT c.comment_id FROM comments c JOIN subtree s ON c.parent_comment_id = s.id
            )
            UPDATE comments
            SET depth = depth - ?2
            WHERE comment_id IN (SELECT id FROM subtree)
            "#,
            params![parent_comment_id, depth_shift],
        )?;
        let detached = self.conn.execute(
            "UPDATE comments SET parent_comment_id = NULL WHERE parent_comment_id = ?1",
            params![parent_comment_id],
        )?;
        Ok(detached)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM comments WHERE comment_id = ?1", params![id])?;
        Ok(())
    }
}
