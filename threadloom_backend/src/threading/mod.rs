pub mod aggregates;
pub mod builder;
pub mod hole_url;
pub mod query;
pub mod sort;
pub mod structure;
pub mod validation;

use crate::config::{ThreadingConfig, ThreadloomConfig};
use crate::database::models::{
    CommentAggregates, CommentRecord, DiscussionRecord, NewCommentRecord, NewDiscussionRecord,
    ReactionRecord,
};
use crate::database::repositories::{
    CommentRepository, DiscussionRepository, ReactionRepository, SqliteRepositories,
};
use crate::database::Database;
use crate::error::ThreadError;
use crate::utils::now_utc;
use aggregates::{AggregateScorer, AggregateViolation, ReactionKind};
use builder::{BuildOptions, ThreadStructureBuilder};
use chrono::{DateTime, Utc};
use query::ThreadQuery;
use serde::{Deserialize, Serialize};
use sort::{CommentOrdering, DecayedTrending};
use std::collections::{BTreeMap, HashMap};
use structure::{Comment, ThreadStructure};
use validation::ThreadingPolicy;

pub use query::CommentListQuery;

pub type ServiceResult<T> = Result<T, ThreadError>;

/// Read and write paths for discussions and their comment threads.
#[derive(Clone)]
pub struct CommentService {
    database: Database,
    config: ThreadingConfig,
    public_url: String,
}

impl CommentService {
    pub fn new(database: Database, config: ThreadingConfig, public_url: impl Into<String>) -> Self {
        Self {
            database,
            config,
            public_url: public_url.into(),
        }
    }

    pub fn from_config(database: Database, config: &ThreadloomConfig) -> Self {
        Self::new(database, config.threading.clone(), config.public_url.clone())
    }

    pub fn threading_config(&self) -> &ThreadingConfig {
        &self.config
    }

    pub fn create_discussion(&self, input: CreateDiscussionInput) -> ServiceResult<DiscussionView> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ThreadError::validation("Discussion name may not be empty."));
        }
        let record = NewDiscussionRecord {
            name,
            insert_user_id: input.insert_user_id,
            date_inserted: input.date_inserted.unwrap_or_else(now_utc),
        };
        let discussion = self.database.with_repositories(|repos| {
            let id = repos.discussions().create(&record)?;
            load_discussion(&repos, id)
        })?;
        tracing::info!(
            discussion_id = discussion.discussion_id,
            "created discussion"
        );
        Ok(DiscussionView::from_record(discussion))
    }

    pub fn list_discussions(&self, limit: usize) -> ServiceResult<Vec<DiscussionView>> {
        let discussions = self
            .database
            .with_repositories(|repos| repos.discussions().list_recent(limit))?;
        Ok(discussions
            .into_iter()
            .map(DiscussionView::from_record)
            .collect())
    }

    pub fn get_discussion(&self, discussion_id: i64) -> ServiceResult<DiscussionView> {
        let record = self
            .database
            .with_repositories(|repos| load_discussion(&repos, discussion_id))?;
        Ok(DiscussionView::from_record(record))
    }

    pub fn create_comment(&self, input: CreateCommentInput) -> ServiceResult<Comment> {
        validation::validate_body(&input.body)?;
        let base_policy = ThreadingPolicy::from_config(&self.config);
        let date_inserted = input.date_inserted.unwrap_or_else(now_utc);

        let record = self.database.with_transaction(|repos| {
            load_discussion(&repos, input.discussion_id)?;
            let policy = base_policy.with_overrides(&repos.settings())?;

            let parent = match input.parent_comment_id {
                Some(parent_id) => {
                    policy.ensure_nesting_allowed()?;
                    Some(load_comment(&repos, parent_id)?)
                }
                None => None,
            };
            let depth = policy.depth_for_reply(input.discussion_id, parent.as_ref())?;

            let comments = repos.comments();
            let comment_id = comments.create(&NewCommentRecord {
                discussion_id: input.discussion_id,
                parent_comment_id: input.parent_comment_id,
                insert_user_id: input.insert_user_id,
                body: input.body.clone(),
                date_inserted,
                depth,
            })?;
            let record = load_comment(&repos, comment_id)?;
            AggregateScorer::new(repos.comments()).comment_inserted(&record)?;
            repos
                .discussions()
                .adjust_comment_count(input.discussion_id, 1)?;
            Ok(record)
        })?;

        tracing::info!(
            comment_id = record.comment_id,
            discussion_id = record.discussion_id,
            parent_comment_id = ?record.parent_comment_id,
            depth = record.depth,
            "created comment"
        );
        Ok(Comment::from_record(record))
    }

    /// Single comment with body and reaction counts.
    pub fn get_comment(&self, comment_id: i64) -> ServiceResult<Comment> {
        let comment = self.database.with_repositories(|repos| {
            let record = load_comment(&repos, comment_id)?;
            let counts = repos.reactions().count_for_comment(comment_id)?;
            let mut comment = Comment::from_record(record);
            comment.reactions = Some(counts.into_iter().collect());
            Ok(comment)
        })?;
        Ok(comment)
    }

    /// Flat, paginated listing of a discussion's comments.
    pub fn list_comments(&self, query: &CommentListQuery) -> ServiceResult<Vec<Comment>> {
        let limit = query.limit.unwrap_or(self.config.default_limit);
        let limit = limit.clamp(1, self.config.max_limit.max(1));
        let page = query.page.unwrap_or(1).max(1);
        let expand_reactions = expands(&query.expand, "reactions");

        let (records, reactions) = self.database.with_repositories(|repos| {
            load_discussion(&repos, query.discussion_id)?;
            let records = repos.comments().list_for_discussion(query.discussion_id)?;
            let reactions = if expand_reactions {
                repos.reactions().counts_for_discussion(query.discussion_id)?
            } else {
                HashMap::new()
            };
            Ok((records, reactions))
        })?;

        let comments = with_expansions(records, &query.expand, reactions);
        let trending = DecayedTrending {
            gravity: self.config.trending_gravity,
        };
        let ordering = CommentOrdering::new(query.sort, &trending, now_utc());
        Ok(ordering
            .sorted(&comments)
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Deletes one comment. Its replies become top-level comments and carry
    /// their own aggregates with them.
    pub fn delete_comment(&self, comment_id: i64) -> ServiceResult<()> {
        let (record, detached) = self.database.with_transaction(|repos| {
            let record = load_comment(&repos, comment_id)?;
            AggregateScorer::new(repos.comments()).comment_removed(&record)?;
            let comments = repos.comments();
            let detached = comments.detach_children(comment_id, record.depth)?;
            comments.delete(comment_id)?;
            repos
                .discussions()
                .adjust_comment_count(record.discussion_id, -1)?;
            Ok((record, detached))
        })?;
        tracing::info!(
            comment_id,
            discussion_id = record.discussion_id,
            detached,
            "deleted comment"
        );
        Ok(())
    }

    pub fn react(&self, comment_id: i64, input: &ReactionInput) -> ServiceResult<Comment> {
        let kind: ReactionKind = input.reaction_type.parse()?;
        let changed = self.database.with_transaction(|repos| {
            let record = load_comment(&repos, comment_id)?;
            let added = repos.reactions().add(&ReactionRecord {
                comment_id,
                user_id: input.user_id,
                reaction_type: kind.as_str().to_string(),
                date_inserted: now_utc(),
            })?;
            if added {
                AggregateScorer::new(repos.comments()).reaction_changed(&record, kind.points())?;
            }
            Ok(added)
        })?;
        tracing::debug!(comment_id, user_id = input.user_id, %kind, changed, "reaction added");
        self.get_comment(comment_id)
    }

    pub fn unreact(&self, comment_id: i64, input: &ReactionInput) -> ServiceResult<Comment> {
        let kind: ReactionKind = input.reaction_type.parse()?;
        let changed = self.database.with_transaction(|repos| {
            let record = load_comment(&repos, comment_id)?;
            let removed = repos
                .reactions()
                .remove(comment_id, input.user_id, kind.as_str())?;
            if removed {
                AggregateScorer::new(repos.comments())
                    .reaction_changed(&record, -kind.points())?;
            }
            Ok(removed)
        })?;
        tracing::debug!(comment_id, user_id = input.user_id, %kind, changed, "reaction removed");
        self.get_comment(comment_id)
    }

    pub fn get_thread(&self, query: &ThreadQuery) -> ServiceResult<ThreadStructure> {
        let discussion_id = query.parent_record_id;
        let expand_reactions = query.expands("reactions");
        let (records, reactions) = self.database.with_repositories(|repos| {
            load_discussion(&repos, discussion_id)?;
            if let Some(parent_id) = query.parent_comment_id {
                let parent = load_comment(&repos, parent_id)?;
                if parent.discussion_id != discussion_id {
                    return Err(ThreadError::validation(validation::DIFFERENT_THREAD).into());
                }
            }
            let records = repos.comments().list_for_discussion(discussion_id)?;
            let reactions = if expand_reactions {
                repos.reactions().counts_for_discussion(discussion_id)?
            } else {
                HashMap::new()
            };
            Ok((records, reactions))
        })?;

        let comments = with_expansions(records, &query.expand, reactions);
        let options = BuildOptions::from_config(&self.config, &self.public_url, now_utc());
        ThreadStructureBuilder::new(&comments, &options).build(query)
    }

    /// Stored aggregates that disagree with the comment tree, without fixing
    /// anything.
    pub fn verify(&self, discussion_id: i64) -> ServiceResult<Vec<AggregateViolation>> {
        let records = self.database.with_repositories(|repos| {
            load_discussion(&repos, discussion_id)?;
            repos.comments().list_for_discussion(discussion_id)
        })?;
        let comments: Vec<Comment> = records.into_iter().map(Comment::from_record).collect();
        Ok(aggregates::verify(&comments))
    }

    /// Rebuilds every aggregate of a discussion from its reactions and parent
    /// links. Returns the rows that had to be corrected.
    pub fn recalculate(&self, discussion_id: i64) -> ServiceResult<Vec<AggregateViolation>> {
        let violations = self.database.with_transaction(|repos| {
            let discussion = load_discussion(&repos, discussion_id)?;
            let records = repos.comments().list_for_discussion(discussion_id)?;
            let reactions = repos.reactions().counts_for_discussion(discussion_id)?;

            let mut comments: Vec<Comment> =
                records.into_iter().map(Comment::from_record).collect();
            let stored: Vec<_> = comments
                .iter()
                .map(|c| (c.comment_id, c.score, c.score_child_comments, c.count_child_comments))
                .collect();
            for comment in &mut comments {
                comment.score = reactions
                    .get(&comment.comment_id)
                    .map_or(0, reaction_points);
            }
            let recomputed = aggregates::recompute(&comments);

            let mut violations = Vec::new();
            for (comment_id, score, score_child_comments, count_child_comments) in stored {
                let Some(&expected) = recomputed.get(&comment_id) else {
                    continue;
                };
                let actual = CommentAggregates {
                    score,
                    score_child_comments,
                    count_child_comments,
                };
                if expected != actual {
                    repos.comments().set_aggregates(comment_id, expected)?;
                    violations.push(AggregateViolation {
                        comment_id,
                        expected,
                        actual,
                    });
                }
            }

            let count = repos.comments().count_for_discussion(discussion_id)?;
            if count != discussion.count_comments {
                repos
                    .discussions()
                    .adjust_comment_count(discussion_id, count - discussion.count_comments)?;
            }
            Ok(violations)
        })?;
        tracing::info!(
            discussion_id,
            repaired = violations.len(),
            "recalculated comment aggregates"
        );
        Ok(violations)
    }
}

fn load_discussion(
    repos: &SqliteRepositories<'_>,
    discussion_id: i64,
) -> anyhow::Result<DiscussionRecord> {
    repos
        .discussions()
        .get(discussion_id)?
        .ok_or_else(|| ThreadError::discussion_not_found(discussion_id).into())
}

fn load_comment(repos: &SqliteRepositories<'_>, comment_id: i64) -> anyhow::Result<CommentRecord> {
    repos
        .comments()
        .get(comment_id)?
        .ok_or_else(|| ThreadError::comment_not_found(comment_id).into())
}

fn expands(expand: &[String], token: &str) -> bool {
    expand.iter().any(|e| e == token || e == "all")
}

fn reaction_points(counts: &HashMap<String, usize>) -> i64 {
    counts
        .iter()
        .filter_map(|(kind, count)| {
            let kind: ReactionKind = kind.parse().ok()?;
            Some(kind.points() * *count as i64)
        })
        .sum()
}

/// Applies the `body` and `reactions` expansions to freshly loaded rows.
fn with_expansions(
    records: Vec<CommentRecord>,
    expand: &[String],
    mut reactions: HashMap<i64, HashMap<String, usize>>,
) -> Vec<Comment> {
    let expand_body = expands(expand, "body");
    let expand_reactions = expands(expand, "reactions");
    records
        .into_iter()
        .map(|record| {
            let mut comment = Comment::from_record(record);
            if !expand_body {
                comment.body = None;
            }
            if expand_reactions {
                let counts: BTreeMap<String, usize> = reactions
                    .remove(&comment.comment_id)
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                comment.reactions = Some(counts);
            }
            comment
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionView {
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    pub name: String,
    #[serde(rename = "insertUserID")]
    pub insert_user_id: i64,
    pub date_inserted: DateTime<Utc>,
    pub count_comments: i64,
}

impl DiscussionView {
    fn from_record(record: DiscussionRecord) -> Self {
        Self {
            discussion_id: record.discussion_id,
            name: record.name,
            insert_user_id: record.insert_user_id,
            date_inserted: record.date_inserted,
            count_comments: record.count_comments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscussionInput {
    pub name: String,
    #[serde(rename = "insertUserID")]
    pub insert_user_id: i64,
    /// Optional timestamp for imported discussions. If None, uses current time.
    #[serde(default)]
    pub date_inserted: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    #[serde(default, rename = "parentCommentID")]
    pub parent_comment_id: Option<i64>,
    #[serde(rename = "insertUserID")]
    pub insert_user_id: i64,
    pub body: String,
    /// Optional timestamp for imported comments. If None, uses current time.
    #[serde(default)]
    pub date_inserted: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInput {
    pub reaction_type: String,
    #[serde(rename = "userID")]
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::SettingRepository;
    use crate::database::Database;
    use crate::threading::sort::{CommentSort, SortField};
    use crate::threading::structure::ThreadNode;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rusqlite::Connection;

    fn setup_service() -> CommentService {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        CommentService::new(db, ThreadingConfig::default(), "")
    }

    fn discussion(service: &CommentService) -> i64 {
        service
            .create_discussion(CreateDiscussionInput {
                name: "General".into(),
                insert_user_id: 1,
                date_inserted: None,
            })
            .expect("create discussion")
            .discussion_id
    }

    fn post(service: &CommentService, discussion_id: i64, parent: Option<i64>) -> Comment {
        try_post(service, discussion_id, parent).expect("create comment")
    }

    fn try_post(
        service: &CommentService,
        discussion_id: i64,
        parent: Option<i64>,
    ) -> ServiceResult<Comment> {
        service.create_comment(CreateCommentInput {
            discussion_id,
            parent_comment_id: parent,
            insert_user_id: 1,
            body: "text".into(),
            date_inserted: None,
        })
    }

    fn like(user_id: i64) -> ReactionInput {
        ReactionInput {
            reaction_type: "like".into(),
            user_id,
        }
    }

    fn aggregates_of(service: &CommentService, comment_id: i64) -> (i64, i64, i64) {
        let c = service.get_comment(comment_id).expect("comment");
        (c.score, c.score_child_comments, c.count_child_comments)
    }

    fn validation_message(err: ThreadError) -> String {
        match err {
            ThreadError::Validation(message) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn reactions_and_deletes_roll_up_to_ancestors() {
        let service = setup_service();
        let d = discussion(&service);
        let a = post(&service, d, None);
        let a1 = post(&service, d, Some(a.comment_id));
        let a11 = post(&service, d, Some(a1.comment_id));
        assert_eq!(a11.depth, 3);

        service.react(a1.comment_id, &like(1)).unwrap();
        service.react(a11.comment_id, &like(1)).unwrap();
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 2, 2));
        assert_eq!(aggregates_of(&service, a1.comment_id), (1, 1, 1));

        service.unreact(a1.comment_id, &like(1)).unwrap();
        assert_eq!(aggregates_of(&service, a1.comment_id), (0, 1, 1));
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 1, 2));

        service.delete_comment(a11.comment_id).unwrap();
        assert_eq!(aggregates_of(&service, a1.comment_id), (0, 0, 0));
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 0, 1));
        assert!(matches!(
            service.get_comment(a11.comment_id),
            Err(ThreadError::NotFound { .. })
        ));
        assert_eq!(service.get_discussion(d).unwrap().count_comments, 2);
        assert!(service.verify(d).unwrap().is_empty());
    }

    #[test]
    fn duplicate_reactions_are_no_ops() {
        let service = setup_service();
        let d = discussion(&service);
        let root = post(&service, d, None);
        let reply = post(&service, d, Some(root.comment_id));

        service.react(reply.comment_id, &like(4)).unwrap();
        let again = service.react(reply.comment_id, &like(4)).unwrap();
        assert_eq!(again.score, 1);
        assert_eq!(again.reactions.unwrap()["like"], 1);

        service.unreact(reply.comment_id, &like(5)).unwrap();
        assert_eq!(aggregates_of(&service, root.comment_id), (0, 1, 1));

        let dislike = ReactionInput {
            reaction_type: "dislike".into(),
            user_id: 4,
        };
        service.react(reply.comment_id, &dislike).unwrap();
        assert_eq!(aggregates_of(&service, root.comment_id), (0, 0, 1));
    }

    #[test]
    fn deleting_a_branch_detaches_its_replies() {
        let service = setup_service();
        let d = discussion(&service);
        let a = post(&service, d, None);
        let b = post(&service, d, Some(a.comment_id));
        let c = post(&service, d, Some(b.comment_id));
        let e = post(&service, d, Some(c.comment_id));
        service.react(e.comment_id, &like(2)).unwrap();

        service.delete_comment(b.comment_id).unwrap();
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 0, 0));
        let c_after = service.get_comment(c.comment_id).unwrap();
        assert_eq!(c_after.parent_comment_id, None);
        assert_eq!(c_after.depth, 1);
        assert_eq!(
            (c_after.score_child_comments, c_after.count_child_comments),
            (1, 1)
        );
        assert_eq!(service.get_comment(e.comment_id).unwrap().depth, 2);
        assert!(service.verify(d).unwrap().is_empty());
    }

    #[test]
    fn cross_thread_parent_is_rejected_without_writing() {
        let service = setup_service();
        let first = discussion(&service);
        let second = discussion(&service);
        let parent = post(&service, first, None);

        let err = try_post(&service, second, Some(parent.comment_id)).unwrap_err();
        assert_eq!(validation_message(err), validation::DIFFERENT_THREAD);
        assert!(service
            .list_comments(&CommentListQuery::for_discussion(second))
            .unwrap()
            .is_empty());
        assert_eq!(aggregates_of(&service, parent.comment_id), (0, 0, 0));
    }

    #[test]
    fn max_depth_from_settings_is_enforced() {
        let service = setup_service();
        service
            .database
            .with_repositories(|repos| repos.settings().set(validation::SETTING_MAX_DEPTH, "2"))
            .unwrap();
        let d = discussion(&service);
        let a = post(&service, d, None);
        let b = post(&service, d, Some(a.comment_id));

        let err = try_post(&service, d, Some(b.comment_id)).unwrap_err();
        assert_eq!(validation_message(err), validation::MAX_DEPTH_EXCEEDED);
        assert_eq!(
            service
                .list_comments(&CommentListQuery::for_discussion(d))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 0, 1));
    }

    #[test]
    fn disabled_threading_rejects_replies_but_allows_top_level() {
        let service = setup_service();
        service
            .database
            .with_repositories(|repos| {
                repos
                    .settings()
                    .set(validation::SETTING_THREADING_ENABLED, "false")
            })
            .unwrap();
        let d = discussion(&service);
        let a = post(&service, d, None);

        let err = try_post(&service, d, Some(a.comment_id)).unwrap_err();
        assert_eq!(validation_message(err), validation::THREADING_DISABLED);
        let err = try_post(&service, d, Some(9999)).unwrap_err();
        assert_eq!(validation_message(err), validation::THREADING_DISABLED);
    }

    #[test]
    fn write_errors_surface_as_domain_errors() {
        let service = setup_service();
        let d = discussion(&service);
        assert!(matches!(
            try_post(&service, 404, None),
            Err(ThreadError::NotFound { id: 404, .. })
        ));
        assert!(matches!(
            try_post(&service, d, Some(404)),
            Err(ThreadError::NotFound { id: 404, .. })
        ));
        let err = service
            .create_comment(CreateCommentInput {
                discussion_id: d,
                parent_comment_id: None,
                insert_user_id: 1,
                body: "   ".into(),
                date_inserted: None,
            })
            .unwrap_err();
        assert_eq!(validation_message(err), validation::EMPTY_BODY);
        assert!(matches!(
            service.react(404, &like(1)),
            Err(ThreadError::NotFound { .. })
        ));
        assert!(matches!(
            service.react(
                1,
                &ReactionInput {
                    reaction_type: "meh".into(),
                    user_id: 1
                }
            ),
            Err(ThreadError::Validation(_))
        ));
    }

    #[test]
    fn thread_reads_respect_scope_and_expansions() {
        let service = setup_service();
        let d = discussion(&service);
        let other = discussion(&service);
        let a = post(&service, d, None);
        let b = post(&service, d, Some(a.comment_id));
        let foreign = post(&service, other, None);
        service.react(b.comment_id, &like(3)).unwrap();

        let mut query = ThreadQuery::for_discussion(d, service.threading_config());
        query.expand = vec!["reactions".into()];
        let thread = service.get_thread(&query).unwrap();
        assert_eq!(thread.thread_structure.len(), 1);
        let included = &thread.comments_by_id[&b.comment_id];
        assert!(included.body.is_none());
        assert_eq!(included.reactions.as_ref().unwrap()["like"], 1);
        assert_eq!(thread.comments_by_id[&a.comment_id].score_child_comments, 1);

        query.parent_comment_id = Some(foreign.comment_id);
        let err = service.get_thread(&query).unwrap_err();
        assert_eq!(validation_message(err), validation::DIFFERENT_THREAD);

        query.parent_comment_id = Some(a.comment_id);
        let scoped = service.get_thread(&query).unwrap();
        match &scoped.thread_structure[..] {
            [ThreadNode::Comment(node)] => {
                assert_eq!(node.comment_id, b.comment_id);
                assert_eq!(node.depth, 2);
            }
            other => panic!("unexpected structure: {other:?}"),
        }

        let missing = ThreadQuery::for_discussion(999, service.threading_config());
        assert!(matches!(
            service.get_thread(&missing),
            Err(ThreadError::NotFound { id: 999, .. })
        ));
    }

    #[test]
    fn flat_listing_sorts_and_paginates() {
        let service = setup_service();
        let d = discussion(&service);
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut ids = Vec::new();
        for minutes in [30, 10, 20] {
            let comment = service
                .create_comment(CreateCommentInput {
                    discussion_id: d,
                    parent_comment_id: None,
                    insert_user_id: 1,
                    body: format!("at {minutes}"),
                    date_inserted: Some(t0 + Duration::minutes(minutes)),
                })
                .unwrap();
            ids.push(comment.comment_id);
        }

        let mut query = CommentListQuery::for_discussion(d);
        let listed: Vec<i64> = service
            .list_comments(&query)
            .unwrap()
            .iter()
            .map(|c| c.comment_id)
            .collect();
        assert_eq!(listed, vec![ids[1], ids[2], ids[0]]);

        query.sort = CommentSort::descending(SortField::CommentId);
        query.limit = Some(2);
        query.page = Some(2);
        let listed = service.list_comments(&query).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].comment_id, ids[0]);
    }

    #[test]
    fn recalculate_repairs_drifted_rows() {
        let service = setup_service();
        let d = discussion(&service);
        let a = post(&service, d, None);
        let b = post(&service, d, Some(a.comment_id));
        service.react(b.comment_id, &like(1)).unwrap();

        service
            .database
            .with_repositories(|repos| {
                repos.conn().execute(
                    "UPDATE comments SET score_child_comments = 9, count_child_comments = 0 WHERE comment_id = ?1",
                    [a.comment_id],
                )?;
                repos
                    .conn()
                    .execute("UPDATE comments SET score = 4 WHERE comment_id = ?1", [b.comment_id])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(service.verify(d).unwrap().len(), 1);

        let repaired = service.recalculate(d).unwrap();
        assert_eq!(repaired.len(), 2);
        assert_eq!(aggregates_of(&service, a.comment_id), (0, 1, 1));
        assert_eq!(aggregates_of(&service, b.comment_id), (1, 0, 0));
        assert!(service.recalculate(d).unwrap().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert { parent: Option<usize> },
        Delete(usize),
        React { target: usize, user: i64, like: bool },
        Unreact { target: usize, user: i64, like: bool },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => proptest::option::of(0usize..64).prop_map(|parent| Op::Insert { parent }),
            1 => (0usize..64).prop_map(Op::Delete),
            2 => (0usize..64, 1i64..4, any::<bool>())
                .prop_map(|(target, user, like)| Op::React { target, user, like }),
            1 => (0usize..64, 1i64..4, any::<bool>())
                .prop_map(|(target, user, like)| Op::Unreact { target, user, like }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn aggregates_hold_after_any_sequence(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let service = setup_service();
            let d = discussion(&service);
            let mut live: Vec<i64> = Vec::new();
            let pick = |live: &Vec<i64>, index: usize| -> Option<i64> {
                (!live.is_empty()).then(|| live[index % live.len()])
            };

            for op in ops {
                match op {
                    Op::Insert { parent } => {
                        let parent = parent.and_then(|index| pick(&live, index));
                        live.push(post(&service, d, parent).comment_id);
                    }
                    Op::Delete(index) => {
                        if let Some(id) = pick(&live, index) {
                            service.delete_comment(id).unwrap();
                            live.retain(|&other| other != id);
                        }
                    }
                    Op::React { target, user, like } | Op::Unreact { target, user, like } => {
                        let Some(id) = pick(&live, target) else { continue };
                        let input = ReactionInput {
                            reaction_type: if like { "like" } else { "dislike" }.into(),
                            user_id: user,
                        };
                        if matches!(op, Op::React { .. }) {
                            service.react(id, &input).unwrap();
                        } else {
                            service.unreact(id, &input).unwrap();
                        }
                    }
                }
                prop_assert!(service.verify(d).unwrap().is_empty());
            }
            prop_assert_eq!(service.get_discussion(d).unwrap().count_comments, live.len() as i64);
            prop_assert!(service.recalculate(d).unwrap().is_empty());
        }
    }
}
