use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionRecord {
    pub discussion_id: i64,
    pub name: String,
    pub insert_user_id: i64,
    pub date_inserted: DateTime<Utc>,
    pub count_comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscussionRecord {
    pub name: String,
    pub insert_user_id: i64,
    pub date_inserted: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: i64,
    pub discussion_id: i64,
    pub parent_comment_id: Option<i64>,
    pub insert_user_id: i64,
    pub body: String,
    pub date_inserted: DateTime<Utc>,
    pub date_updated: Option<DateTime<Utc>>,
    pub depth: u32,
    pub score: i64,
    /// Sum of `score` over every descendant.
    pub score_child_comments: i64,
    /// Number of descendants.
    pub count_child_comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommentRecord {
    pub discussion_id: i64,
    pub parent_comment_id: Option<i64>,
    pub insert_user_id: i64,
    pub body: String,
    pub date_inserted: DateTime<Utc>,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub comment_id: i64,
    pub user_id: i64,
    pub reaction_type: String,
    pub date_inserted: DateTime<Utc>,
}

/// Aggregate columns after an in-place adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentAggregates {
    pub score: i64,
    pub score_child_comments: i64,
    pub count_child_comments: i64,
}
