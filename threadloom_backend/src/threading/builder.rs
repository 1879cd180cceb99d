//! Materializes a paginated, collapsed comment tree from a discussion snapshot.

use super::hole_url::HoleUrlBuilder;
use super::query::ThreadQuery;
use super::sort::{CommentOrdering, DecayedTrending, TrendingScore};
use super::structure::{Comment, CommentNode, Hole, ThreadNode, ThreadStructure};
use crate::config::ThreadingConfig;
use crate::error::ThreadError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const INSERT_USER_PREVIEW: usize = 5;

#[derive(Clone)]
pub struct BuildOptions {
    /// Reference time for the trending sort.
    pub now: DateTime<Utc>,
    pub trending: Arc<dyn TrendingScore>,
    pub collapse_child_limit: usize,
    pub collapse_child_depth: usize,
    /// Relative depth past which groups collapse unconditionally. Bounds the
    /// recursion here and in serialization regardless of stored depths.
    pub max_nesting: usize,
    pub hole_urls: HoleUrlBuilder,
}

impl BuildOptions {
    pub fn from_config(config: &ThreadingConfig, public_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            now,
            trending: Arc::new(DecayedTrending {
                gravity: config.trending_gravity,
            }),
            collapse_child_limit: config.collapse_child_limit,
            collapse_child_depth: config.collapse_child_depth,
            max_nesting: config.max_nesting.max(1),
            hole_urls: HoleUrlBuilder::new(public_url),
        }
    }
}

pub struct ThreadStructureBuilder<'a> {
    comments: &'a [Comment],
    options: &'a BuildOptions,
    by_id: HashMap<i64, usize>,
    children: HashMap<Option<i64>, Vec<usize>>,
}

struct Assembly<'q> {
    query: &'q ThreadQuery,
    ordering: CommentOrdering<'q>,
    collapse_child_limit: usize,
    collapse_child_depth: usize,
    max_nesting: usize,
    focus_path: HashSet<i64>,
    visited: HashSet<i64>,
    included: BTreeMap<i64, Comment>,
}

impl<'a> ThreadStructureBuilder<'a> {
    pub fn new(comments: &'a [Comment], options: &'a BuildOptions) -> Self {
        let mut by_id = HashMap::with_capacity(comments.len());
        let mut children: HashMap<Option<i64>, Vec<usize>> = HashMap::new();
        for (index, comment) in comments.iter().enumerate() {
            by_id.insert(comment.comment_id, index);
            children
                .entry(comment.parent_comment_id)
                .or_default()
                .push(index);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|&index| comments[index].comment_id);
        }
        Self {
            comments,
            options,
            by_id,
            children,
        }
    }

    pub fn build(&self, query: &ThreadQuery) -> Result<ThreadStructure, ThreadError> {
        self.check_snapshot(query.parent_record_id)?;

        let root_depth = match query.parent_comment_id {
            Some(parent_id) => {
                let parent = self
                    .get(parent_id)
                    .ok_or_else(|| ThreadError::comment_not_found(parent_id))?;
                parent.depth + 1
            }
            None => 1,
        };

        let mut assembly = Assembly {
            query,
            ordering: CommentOrdering::new(
                query.sort,
                self.options.trending.as_ref(),
                self.options.now,
            ),
            collapse_child_limit: query
                .collapse_child_limit
                .unwrap_or(self.options.collapse_child_limit),
            collapse_child_depth: query
                .collapse_child_depth
                .unwrap_or(self.options.collapse_child_depth),
            max_nesting: self.options.max_nesting.max(1),
            focus_path: self.focus_path(query),
            visited: HashSet::new(),
            included: BTreeMap::new(),
        };

        let thread_structure =
            self.build_group(&mut assembly, query.parent_comment_id, root_depth, 1)?;
        tracing::debug!(
            discussion_id = query.parent_record_id,
            included = assembly.included.len(),
            "built thread structure"
        );
        Ok(ThreadStructure {
            thread_structure,
            comments_by_id: assembly.included,
        })
    }

    fn get(&self, comment_id: i64) -> Option<&'a Comment> {
        self.by_id.get(&comment_id).map(|&index| &self.comments[index])
    }

    fn check_snapshot(&self, discussion_id: i64) -> Result<(), ThreadError> {
        for comment in self.comments {
            if comment.discussion_id != discussion_id {
                return Err(ThreadError::Consistency(format!(
                    "comment {} belongs to discussion {}, not {}",
                    comment.comment_id, comment.discussion_id, discussion_id
                )));
            }
            if let Some(parent_id) = comment.parent_comment_id {
                if !self.by_id.contains_key(&parent_id) {
                    return Err(ThreadError::Consistency(format!(
                        "comment {} references missing parent {}",
                        comment.comment_id, parent_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ids from the focus comment up to (not including) the scope root. Empty
    /// when there is no focus or it lies outside the scope.
    fn focus_path(&self, query: &ThreadQuery) -> HashSet<i64> {
        let mut path = HashSet::new();
        let Some(focus_id) = query.focus_comment_id else {
            return path;
        };
        let mut current = self.get(focus_id);
        while let Some(comment) = current {
            if !path.insert(comment.comment_id) {
                break;
            }
            if comment.parent_comment_id == query.parent_comment_id {
                return path;
            }
            current = comment.parent_comment_id.and_then(|id| self.get(id));
        }
        HashSet::new()
    }

    fn build_group(
        &self,
        assembly: &mut Assembly<'_>,
        parent_comment_id: Option<i64>,
        depth: u32,
        relative_depth: usize,
    ) -> Result<Vec<ThreadNode>, ThreadError> {
        let siblings = assembly.ordering.sorted(
            self.children
                .get(&parent_comment_id)
                .into_iter()
                .flatten()
                .map(|&index| &self.comments[index]),
        );
        let total = siblings.len();

        let too_deep = relative_depth > assembly.max_nesting;
        let (window_start, window_end) = if too_deep {
            (0, 0)
        } else if relative_depth == 1 {
            let start = (assembly.query.page - 1).saturating_mul(assembly.query.limit);
            (start, start.saturating_add(assembly.query.limit))
        } else if relative_depth < assembly.collapse_child_depth {
            (0, assembly.collapse_child_limit)
        } else {
            (0, 0)
        };
        let focused = siblings
            .iter()
            .position(|comment| assembly.focus_path.contains(&comment.comment_id))
            .filter(|_| !too_deep);
        let region_start = focused.map_or(window_start, |index| index.min(window_start));

        let mut nodes = Vec::new();
        let mut run_start: Option<usize> = None;
        for index in region_start..total {
            let expanded =
                (window_start..window_end).contains(&index) || focused == Some(index);
            if !expanded {
                run_start.get_or_insert(index);
                continue;
            }
            if let Some(start) = run_start.take() {
                nodes.push(self.hole(
                    assembly,
                    parent_comment_id,
                    depth,
                    start,
                    &siblings[start..index],
                )?);
            }

            let comment = siblings[index];
            if !assembly.visited.insert(comment.comment_id) {
                return Err(ThreadError::Consistency(format!(
                    "comment {} is reachable twice",
                    comment.comment_id
                )));
            }
            let children = self.build_group(
                assembly,
                Some(comment.comment_id),
                depth + 1,
                relative_depth + 1,
            )?;
            let mut included = comment.clone();
            if !assembly.query.expands("body") {
                included.body = None;
            }
            assembly.included.insert(comment.comment_id, included);
            nodes.push(ThreadNode::Comment(CommentNode {
                comment_id: comment.comment_id,
                parent_comment_id,
                depth,
                children,
            }));
        }
        if let Some(start) = run_start {
            nodes.push(self.hole(
                assembly,
                parent_comment_id,
                depth,
                start,
                &siblings[start..],
            )?);
        }
        Ok(nodes)
    }

    fn hole(
        &self,
        assembly: &Assembly<'_>,
        parent_comment_id: Option<i64>,
        depth: u32,
        offset: usize,
        run: &[&Comment],
    ) -> Result<ThreadNode, ThreadError> {
        let mut count_all_comments = 0;
        let mut users: Vec<i64> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut stack: Vec<&Comment> = run.iter().rev().copied().collect();
        while let Some(comment) = stack.pop() {
            if !seen.insert(comment.comment_id) {
                return Err(ThreadError::Consistency(format!(
                    "comment {} is reachable twice",
                    comment.comment_id
                )));
            }
            count_all_comments += 1;
            if !users.contains(&comment.insert_user_id) {
                users.push(comment.insert_user_id);
            }
            if let Some(children) = self.children.get(&Some(comment.comment_id)) {
                stack.extend(children.iter().rev().map(|&index| &self.comments[index]));
            }
        }

        let count_all_insert_users = users.len();
        users.truncate(INSERT_USER_PREVIEW);
        Ok(ThreadNode::Hole(Hole {
            parent_comment_id,
            depth,
            offset,
            limit: assembly.query.limit,
            total: run.len(),
            count_all_comments,
            count_all_insert_users,
            insert_user_ids: users,
            api_url: self
                .options
                .hole_urls
                .continuation(assembly.query, parent_comment_id, offset),
        }))
    }
}
