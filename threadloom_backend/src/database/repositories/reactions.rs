use crate::database::models::ReactionRecord;
use anyhow::Result;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub(super) struct SqliteReactionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ReactionRepository for SqliteReactionRepository<'conn> {
    fn add(&self, record: &ReactionRecord) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO comment_reactions (comment_id, user_id, reaction_type, date_inserted)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.comment_id,
                record.user_id,
                record.reaction_type,
                record.date_inserted,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn remove(&self, comment_id: i64, user_id: i64, reaction_type: &str) -> Result<bool> {
        let removed = self.conn.execute(
            r#"
            DELETE FROM comment_reactions
            WHERE comment_id = ?1 AND user_id = ?2 AND reaction_type = ?3
            "#,
            params![comment_id, user_id, reaction_type],
        )?;
        Ok(removed == 1)
    }

    fn count_for_comment(&self, comment_id: i64) -> Result<HashMap<String, usize>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT reaction_type, COUNT(*) as count
            FROM comment_reactions
            WHERE comment_id = ?1
            GROUP BY reaction_type
            "#,
        )?;
        let rows = stmt.query_map(params![comment_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (reaction_type, count) = row?;
            counts.insert(reaction_type, count);
        }
        Ok(counts)
    }

    fn counts_for_discussion(
        &self,
        discussion_id: i64,
    ) -> Result<HashMap<i64, HashMap<String, usize>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.comment_id, r.reaction_type, COUNT(*) as count
            FROM comment_reactions r
            INNER JOIN comments c ON c.comment_id = r.comment_id
            WHERE c.discussion_id = ?1
            GROUP BY r.comment_id, r.reaction_type
            "#,
        )?;
        let rows = stmt.query_map(params![discussion_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? as usize,
            ))
        })?;

        let mut counts: HashMap<i64, HashMap<String, usize>> = HashMap::new();
        for row in rows {
            let (comment_id, reaction_type, count) = row?;
            counts
                .entry(comment_id)
                .or_default()
                .insert(reaction_type, count);
        }
        Ok(counts)
    }
}
