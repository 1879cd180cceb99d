//! Incremental maintenance of the score and descendant-count roll-ups.

use super::structure::Comment;
use crate::database::models::{CommentAggregates, CommentRecord};
use crate::database::repositories::CommentRepository;
use crate::error::ThreadError;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn points(self) -> i64 {
        match self {
            ReactionKind::Like => 1,
            ReactionKind::Dislike => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = ThreadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(ThreadError::validation(format!(
                "Unknown reaction type: {other}"
            ))),
        }
    }
}

/// Applies roll-up deltas to a comment and its ancestors. Callers run it
/// inside the transaction that performs the triggering write.
pub struct AggregateScorer<R> {
    comments: R,
}

impl<R: CommentRepository> AggregateScorer<R> {
    pub fn new(comments: R) -> Self {
        Self { comments }
    }

    /// Parent first, root last.
    pub fn ancestors(&self, comment: &CommentRecord) -> Result<Vec<CommentRecord>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([comment.comment_id]);
        let mut next = comment.parent_comment_id;
        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                return Err(ThreadError::Consistency(format!(
                    "parent cycle through comment {parent_id}"
                ))
                .into());
            }
            let parent = self
                .comments
                .get(parent_id)?
                .ok_or_else(|| {
                    ThreadError::Consistency(format!(
                        "comment {} references missing parent {parent_id}",
                        comment.comment_id
                    ))
                })?;
            next = parent.parent_comment_id;
            chain.push(parent);
        }
        Ok(chain)
    }

    pub fn reaction_changed(&self, comment: &CommentRecord, points: i64) -> Result<()> {
        self.apply(comment.comment_id, points, 0, 0)?;
        for ancestor in self.ancestors(comment)? {
            self.apply(ancestor.comment_id, 0, points, 0)?;
        }
        Ok(())
    }

    pub fn comment_inserted(&self, comment: &CommentRecord) -> Result<()> {
        let (score, count) = contribution(comment);
        for ancestor in self.ancestors(comment)? {
            self.apply(ancestor.comment_id, 0, score, count)?;
        }
        Ok(())
    }

    /// Removes the whole subtree's contribution from every ancestor in one pass.
    pub fn comment_removed(&self, comment: &CommentRecord) -> Result<()> {
        let (score, count) = contribution(comment);
        for ancestor in self.ancestors(comment)? {
            self.apply(ancestor.comment_id, 0, -score, -count)?;
        }
        Ok(())
    }

    fn apply(
        &self,
        comment_id: i64,
        score: i64,
        score_child_comments: i64,
        count_child_comments: i64,
    ) -> Result<CommentAggregates> {
        let after = self.comments.adjust_aggregates(
            comment_id,
            score,
            score_child_comments,
            count_child_comments,
        )?;
        if after.count_child_comments < 0 {
            tracing::error!(
                comment_id,
                count_child_comments = after.count_child_comments,
                "descendant count went negative"
            );
            return Err(ThreadError::Consistency(format!(
                "comment {comment_id} has a negative descendant count"
            ))
            .into());
        }
        Ok(after)
    }
}

/// Score and comment count a subtree contributes to each of its ancestors.
fn contribution(comment: &CommentRecord) -> (i64, i64) {
    (
        comment.score + comment.score_child_comments,
        1 + comment.count_child_comments,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateViolation {
    pub comment_id: i64,
    pub expected: CommentAggregates,
    pub actual: CommentAggregates,
}

/// Aggregates derived from parent links and each comment's own score.
pub fn recompute(comments: &[Comment]) -> HashMap<i64, CommentAggregates> {
    let ids: HashSet<i64> = comments.iter().map(|c| c.comment_id).collect();
    let mut children: HashMap<i64, Vec<&Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in comments {
        match comment.parent_comment_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    let mut out: HashMap<i64, CommentAggregates> = comments
        .iter()
        .map(|c| {
            (
                c.comment_id,
                CommentAggregates {
                    score: c.score,
                    score_child_comments: 0,
                    count_child_comments: 0,
                },
            )
        })
        .collect();

    // Iterative post-order so deep threads cannot overflow the stack.
    let mut stack: Vec<(&Comment, bool)> = roots.into_iter().map(|c| (c, false)).collect();
    while let Some((comment, children_done)) = stack.pop() {
        let kids = children.get(&comment.comment_id);
        if !children_done {
            stack.push((comment, true));
            stack.extend(kids.into_iter().flatten().map(|&kid| (kid, false)));
            continue;
        }
        let (mut score, mut count) = (0, 0);
        for kid in kids.into_iter().flatten() {
            if let Some(agg) = out.get(&kid.comment_id) {
                score += agg.score + agg.score_child_comments;
                count += 1 + agg.count_child_comments;
            }
        }
        if let Some(agg) = out.get_mut(&comment.comment_id) {
            agg.score_child_comments = score;
            agg.count_child_comments = count;
        }
    }
    out
}

/// Every comment whose stored aggregates disagree with [`recompute`], in id
/// order.
pub fn verify(comments: &[Comment]) -> Vec<AggregateViolation> {
    let expected = recompute(comments);
    let mut violations: Vec<AggregateViolation> = comments
        .iter()
        .filter_map(|comment| {
            let actual = CommentAggregates {
                score: comment.score,
                score_child_comments: comment.score_child_comments,
                count_child_comments: comment.count_child_comments,
            };
            let expected = *expected.get(&comment.comment_id)?;
            (expected != actual).then_some(AggregateViolation {
                comment_id: comment.comment_id,
                expected,
                actual,
            })
        })
        .collect();
    violations.sort_by_key(|v| v.comment_id);
    violations
}
