use super::sort::CommentSort;
use crate::config::ThreadingConfig;
use crate::error::ThreadError;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

pub const DEFAULT_EXPAND: [&str; 2] = ["insertUser", "body"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentRecordType {
    #[default]
    Discussion,
}

impl fmt::Display for ParentRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRecordType::Discussion => f.write_str("discussion"),
        }
    }
}

impl FromStr for ParentRecordType {
    type Err = ThreadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "discussion" => Ok(ParentRecordType::Discussion),
            other => Err(ThreadError::validation(format!(
                "Unsupported parentRecordType: {other}"
            ))),
        }
    }
}

/// A request for one page of a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadQuery {
    pub parent_record_type: ParentRecordType,
    pub parent_record_id: i64,
    pub parent_comment_id: Option<i64>,
    pub sort: CommentSort,
    pub page: usize,
    pub limit: usize,
    pub focus_comment_id: Option<i64>,
    /// Explicit overrides only; continuations carry them when set.
    pub collapse_child_limit: Option<usize>,
    pub collapse_child_depth: Option<usize>,
    pub expand: Vec<String>,
}

impl ThreadQuery {
    pub fn for_discussion(discussion_id: i64, config: &ThreadingConfig) -> Self {
        Self {
            parent_record_type: ParentRecordType::Discussion,
            parent_record_id: discussion_id,
            parent_comment_id: None,
            sort: CommentSort::default(),
            page: 1,
            limit: config.default_limit.clamp(1, config.max_limit.max(1)),
            focus_comment_id: None,
            collapse_child_limit: None,
            collapse_child_depth: None,
            expand: DEFAULT_EXPAND.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn expands(&self, token: &str) -> bool {
        self.expand.iter().any(|e| e == token || e == "all")
    }

    /// Parses the thread endpoint's query string. `expand`, `expand[]` and
    /// `expand[N]` keys are accepted, each optionally comma separated.
    pub fn from_query_string(raw: &str, config: &ThreadingConfig) -> Result<Self, ThreadError> {
        let mut parent_record_type = ParentRecordType::Discussion;
        let mut parent_record_id = None;
        let mut parent_comment_id = None;
        let mut sort = CommentSort::default();
        let mut page = 1;
        let mut limit = config.default_limit;
        let mut focus_comment_id = None;
        let mut collapse_child_limit = None;
        let mut collapse_child_depth = None;
        let mut expand = ExpandTokens::default();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim();
            match &*key {
                "parentRecordType" => parent_record_type = value.parse()?,
                "parentRecordID" => parent_record_id = Some(parse_number(&key, value)?),
                "parentCommentID" if !value.is_empty() => {
                    parent_comment_id = Some(parse_number(&key, value)?)
                }
                "sort" if !value.is_empty() => sort = value.parse()?,
                "page" => page = parse_number(&key, value)?,
                "limit" => limit = parse_number(&key, value)?,
                "focusCommentID" if !value.is_empty() => {
                    focus_comment_id = Some(parse_number(&key, value)?)
                }
                "collapseChildLimit" => collapse_child_limit = Some(parse_number(&key, value)?),
                "collapseChildDepth" => collapse_child_depth = Some(parse_number(&key, value)?),
                other => expand.accept(other, value),
            }
        }

        let parent_record_id = parent_record_id
            .ok_or_else(|| ThreadError::validation("parentRecordID is required."))?;
        if page == 0 {
            return Err(ThreadError::validation("page must be at least 1."));
        }
        if limit == 0 {
            return Err(ThreadError::validation("limit must be at least 1."));
        }
        let limit = limit.min(config.max_limit.max(1));

        Ok(Self {
            parent_record_type,
            parent_record_id,
            parent_comment_id,
            sort,
            page,
            limit,
            focus_comment_id,
            collapse_child_limit,
            collapse_child_depth,
            expand: expand.finish(&DEFAULT_EXPAND),
        })
    }
}

/// Query for the flat comment listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentListQuery {
    pub discussion_id: i64,
    pub sort: CommentSort,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub expand: Vec<String>,
}

impl CommentListQuery {
    pub fn for_discussion(discussion_id: i64) -> Self {
        Self {
            discussion_id,
            sort: CommentSort::default(),
            page: None,
            limit: None,
            expand: vec!["body".into()],
        }
    }

    /// Accepts the same `expand` spellings as [`ThreadQuery`].
    pub fn from_query_string(raw: &str) -> Result<Self, ThreadError> {
        let mut discussion_id = None;
        let mut sort = CommentSort::default();
        let mut page = None;
        let mut limit = None;
        let mut expand = ExpandTokens::default();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim();
            match &*key {
                "discussionID" => discussion_id = Some(parse_number(&key, value)?),
                "sort" if !value.is_empty() => sort = value.parse()?,
                "page" if !value.is_empty() => page = Some(parse_number(&key, value)?),
                "limit" if !value.is_empty() => limit = Some(parse_number(&key, value)?),
                other => expand.accept(other, value),
            }
        }

        let discussion_id =
            discussion_id.ok_or_else(|| ThreadError::validation("discussionID is required."))?;
        Ok(Self {
            discussion_id,
            sort,
            page,
            limit,
            expand: expand.finish(&["body"]),
        })
    }
}

/// Collects `expand`, `expand[]` and `expand[N]` values in index order.
#[derive(Default)]
struct ExpandTokens {
    entries: Vec<(usize, String)>,
    present: bool,
}

impl ExpandTokens {
    /// Ignores keys that are not expand keys.
    fn accept(&mut self, key: &str, value: &str) {
        let Some(position) = expand_position(key) else {
            return;
        };
        self.present = true;
        let position = position.unwrap_or(usize::MAX);
        self.entries.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| (position, token.to_string())),
        );
    }

    fn finish(mut self, default: &[&str]) -> Vec<String> {
        if !self.present {
            return default.iter().map(|s| s.to_string()).collect();
        }
        // Stable sort keeps the written order for repeated keys.
        self.entries.sort_by_key(|(position, _)| *position);
        let mut tokens: Vec<String> = Vec::new();
        for (_, token) in self.entries {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }
}

/// `Some(None)` for `expand` / `expand[]`, `Some(Some(n))` for `expand[n]`.
fn expand_position(key: &str) -> Option<Option<usize>> {
    let rest = key.strip_prefix("expand")?;
    if rest.is_empty() || rest == "[]" {
        return Some(None);
    }
    let index = rest.strip_prefix('[')?.strip_suffix(']')?;
    index.parse().ok().map(Some)
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ThreadError> {
    value
        .parse()
        .map_err(|_| ThreadError::validation(format!("{key} must be a number.")))
}
