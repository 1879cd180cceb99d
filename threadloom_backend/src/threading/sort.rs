//! Sibling ordering for thread groups and flat comment listings.

use super::structure::Comment;
use crate::error::ThreadError;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    DateInserted,
    Score,
    CommentId,
    Trending,
}

impl SortField {
    fn as_str(self) -> &'static str {
        match self {
            SortField::DateInserted => "dateInserted",
            SortField::Score => "score",
            SortField::CommentId => "commentID",
            SortField::Trending => "trending",
        }
    }
}

/// A sort as written in queries: a field name, optionally prefixed with `-`
/// for descending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentSort {
    pub field: SortField,
    pub descending: bool,
}

impl CommentSort {
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn descending(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

impl Default for CommentSort {
    fn default() -> Self {
        Self::ascending(SortField::DateInserted)
    }
}

impl fmt::Display for CommentSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(self.field.as_str())
    }
}

impl FromStr for CommentSort {
    type Err = ThreadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let field = match name {
            "dateInserted" => SortField::DateInserted,
            "score" => SortField::Score,
            "commentID" => SortField::CommentId,
            "trending" | "experimentalTrending" => SortField::Trending,
            _ => return Err(ThreadError::validation(format!("Unknown sort: {raw}"))),
        };
        Ok(Self { field, descending })
    }
}

/// Pluggable ranking for the trending sort. Higher ranks sort first under
/// `-trending`.
pub trait TrendingScore: Send + Sync {
    fn rank(&self, comment: &Comment, now: DateTime<Utc>) -> f64;
}

/// Engagement decayed by age:
/// `(points + 1) / (age_hours + 2) ^ gravity`, where points are the comment's
/// own score, its descendants' score and its descendant count.
#[derive(Debug, Clone, Copy)]
pub struct DecayedTrending {
    pub gravity: f64,
}

impl Default for DecayedTrending {
    fn default() -> Self {
        Self { gravity: 1.5 }
    }
}

impl TrendingScore for DecayedTrending {
    fn rank(&self, comment: &Comment, now: DateTime<Utc>) -> f64 {
        let points =
            (comment.score + comment.score_child_comments + comment.count_child_comments) as f64;
        let age_seconds = (now - comment.date_inserted).num_seconds().max(0);
        let age_hours = age_seconds as f64 / 3600.0;
        (points + 1.0) / (age_hours + 2.0).powf(self.gravity)
    }
}

/// Applies a [`CommentSort`]; ties always fall back to `commentID` ascending.
pub struct CommentOrdering<'a> {
    sort: CommentSort,
    trending: &'a dyn TrendingScore,
    now: DateTime<Utc>,
}

impl<'a> CommentOrdering<'a> {
    pub fn new(sort: CommentSort, trending: &'a dyn TrendingScore, now: DateTime<Utc>) -> Self {
        Self {
            sort,
            trending,
            now,
        }
    }

    pub fn sorted<'c, I>(&self, comments: I) -> Vec<&'c Comment>
    where
        I: IntoIterator<Item = &'c Comment>,
    {
        let mut keyed: Vec<(f64, &'c Comment)> = comments
            .into_iter()
            .map(|comment| (self.rank(comment), comment))
            .collect();
        keyed.sort_by(|(rank_a, a), (rank_b, b)| self.compare(a, *rank_a, b, *rank_b));
        keyed.into_iter().map(|(_, comment)| comment).collect()
    }

    fn rank(&self, comment: &Comment) -> f64 {
        match self.sort.field {
            SortField::Trending => self.trending.rank(comment, self.now),
            _ => 0.0,
        }
    }

    fn compare(&self, a: &Comment, rank_a: f64, b: &Comment, rank_b: f64) -> Ordering {
        let primary = match self.sort.field {
            SortField::DateInserted => a.date_inserted.cmp(&b.date_inserted),
            SortField::Score => a.score.cmp(&b.score),
            SortField::CommentId => a.comment_id.cmp(&b.comment_id),
            SortField::Trending => rank_a.total_cmp(&rank_b),
        };
        let primary = if self.sort.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.comment_id.cmp(&b.comment_id))
    }
}
