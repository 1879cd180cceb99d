use crate::database::models::CommentRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable comment snapshot handed to the builder and returned in
/// `commentsByID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "commentID")]
    pub comment_id: i64,
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    #[serde(rename = "parentCommentID")]
    pub parent_comment_id: Option<i64>,
    #[serde(rename = "insertUserID")]
    pub insert_user_id: i64,
    pub depth: u32,
    pub date_inserted: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
    pub score: i64,
    pub score_child_comments: i64,
    pub count_child_comments: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<BTreeMap<String, usize>>,
}

impl Comment {
    pub fn from_record(record: CommentRecord) -> Self {
        Self {
            comment_id: record.comment_id,
            discussion_id: record.discussion_id,
            parent_comment_id: record.parent_comment_id,
            insert_user_id: record.insert_user_id,
            depth: record.depth,
            date_inserted: record.date_inserted,
            date_updated: record.date_updated,
            score: record.score,
            score_child_comments: record.score_child_comments,
            count_child_comments: record.count_child_comments,
            body: Some(record.body),
            reactions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ThreadNode {
    Comment(CommentNode),
    Hole(Hole),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(rename = "commentID")]
    pub comment_id: i64,
    #[serde(rename = "parentCommentID")]
    pub parent_comment_id: Option<i64>,
    pub depth: u32,
    pub children: Vec<ThreadNode>,
}

/// A contiguous run of siblings that was not expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hole {
    #[serde(rename = "parentCommentID")]
    pub parent_comment_id: Option<i64>,
    pub depth: u32,
    pub offset: usize,
    pub limit: usize,
    /// Omitted siblings.
    pub total: usize,
    /// Omitted siblings plus all of their descendants.
    pub count_all_comments: usize,
    pub count_all_insert_users: usize,
    #[serde(rename = "insertUserIDs")]
    pub insert_user_ids: Vec<i64>,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStructure {
    pub thread_structure: Vec<ThreadNode>,
    #[serde(rename = "commentsByID")]
    pub comments_by_id: BTreeMap<i64, Comment>,
}

impl ThreadStructure {
    /// Every node in depth-first pre-order.
    pub fn nodes(&self) -> Vec<&ThreadNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&ThreadNode> = self.thread_structure.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            if let ThreadNode::Comment(comment) = node {
                stack.extend(comment.children.iter().rev());
            }
        }
        out
    }

    pub fn holes(&self) -> Vec<&Hole> {
        self.nodes()
            .into_iter()
            .filter_map(|node| match node {
                ThreadNode::Hole(hole) => Some(hole),
                ThreadNode::Comment(_) => None,
            })
            .collect()
    }

    pub fn find_comment(&self, comment_id: i64) -> Option<&CommentNode> {
        self.nodes().into_iter().find_map(|node| match node {
            ThreadNode::Comment(comment) if comment.comment_id == comment_id => Some(comment),
            _ => None,
        })
    }
}
