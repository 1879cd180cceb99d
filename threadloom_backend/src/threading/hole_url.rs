use super::query::ThreadQuery;
use url::form_urlencoded;

pub const THREAD_ENDPOINT: &str = "/api/v2/comments/thread";

/// Produces the continuation URL a client follows to fill a hole.
#[derive(Debug, Clone, Default)]
pub struct HoleUrlBuilder {
    base_url: String,
}

impl HoleUrlBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL for the page of `parent_comment_id`'s children that starts with the
    /// sibling at `offset`. The focus comment is never carried over.
    pub fn continuation(
        &self,
        query: &ThreadQuery,
        parent_comment_id: Option<i64>,
        offset: usize,
    ) -> String {
        let limit = query.limit.max(1);
        let page = offset / limit + 1;

        let mut params = form_urlencoded::Serializer::new(String::new());
        params.append_pair("parentRecordType", &query.parent_record_type.to_string());
        params.append_pair("parentRecordID", &query.parent_record_id.to_string());
        if let Some(parent_comment_id) = parent_comment_id {
            params.append_pair("parentCommentID", &parent_comment_id.to_string());
        }
        params.append_pair("sort", &query.sort.to_string());
        params.append_pair("page", &page.to_string());
        params.append_pair("limit", &limit.to_string());
        if let Some(collapse_child_limit) = query.collapse_child_limit {
            params.append_pair("collapseChildLimit", &collapse_child_limit.to_string());
        }
        if let Some(collapse_child_depth) = query.collapse_child_depth {
            params.append_pair("collapseChildDepth", &collapse_child_depth.to_string());
        }
        for (index, token) in query.expand.iter().enumerate() {
            params.append_pair(&format!("expand[{index}]"), token);
        }

        format!("{}{}?{}", self.base_url, THREAD_ENDPOINT, params.finish())
    }
}
