mod comments;
mod discussions;
mod reactions;
mod settings;

use super::models::{
    CommentAggregates, CommentRecord, DiscussionRecord, NewCommentRecord, NewDiscussionRecord,
    ReactionRecord,
};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

pub trait DiscussionRepository {
    fn create(&self, record: &NewDiscussionRecord) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<DiscussionRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<DiscussionRecord>>;
    fn adjust_comment_count(&self, id: i64, delta: i64) -> Result<()>;
}

pub trait CommentRepository {
    fn create(&self, record: &NewCommentRecord) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<CommentRecord>>;
    /// Every comment of a discussion in `comment_id` order.
    fn list_for_discussion(&self, discussion_id: i64) -> Result<Vec<CommentRecord>>;
    fn count_for_discussion(&self, discussion_id: i64) -> Result<i64>;
    /// Adds the deltas to the aggregate columns and returns the new values.
    fn adjust_aggregates(
        &self,
        id: i64,
        score: i64,
        score_child_comments: i64,
        count_child_comments: i64,
    ) -> Result<CommentAggregates>;
    fn set_aggregates(&self, id: i64, aggregates: CommentAggregates) -> Result<()>;
    /// Turns the direct children of `parent_comment_id` into top-level
    /// comments and lifts their whole subtrees by `depth_shift` levels.
    fn detach_children(&self, parent_comment_id: i64, depth_shift: u32) -> Result<usize>;
    fn delete(&self, id: i64) -> Result<()>;
}

pub trait ReactionRepository {
    /// Returns `false` when the user already had this reaction.
    fn add(&self, record: &ReactionRecord) -> Result<bool>;
    /// Returns `false` when there was nothing to remove.
    fn remove(&self, comment_id: i64, user_id: i64, reaction_type: &str) -> Result<bool>;
    /// Returns HashMap<reaction_type, count>
    fn count_for_comment(&self, comment_id: i64) -> Result<HashMap<String, usize>>;
    /// Counts for every comment of a discussion, keyed by comment id.
    fn counts_for_discussion(
        &self,
        discussion_id: i64,
    ) -> Result<HashMap<i64, HashMap<String, usize>>>;
}

pub trait SettingRepository {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn discussions(&self) -> impl DiscussionRepository + '_ {
        discussions::SqliteDiscussionRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn reactions(&self) -> impl ReactionRepository + '_ {
        reactions::SqliteReactionRepository { conn: self.conn }
    }

    pub fn settings(&self) -> impl SettingRepository + '_ {
        settings::SqliteSettingRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
