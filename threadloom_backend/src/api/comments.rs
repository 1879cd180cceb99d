use super::{ApiError, ApiJson, ApiPath, ApiResult, AppState};
use crate::threading::query::ThreadQuery;
use crate::threading::structure::{Comment, ThreadStructure};
use crate::threading::{CommentListQuery, CreateCommentInput, ReactionInput};
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::Json;

pub(crate) async fn get_thread(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<ThreadStructure> {
    let query = ThreadQuery::from_query_string(
        raw.as_deref().unwrap_or_default(),
        state.comments.threading_config(),
    )?;
    let structure = state.comments.get_thread(&query)?;
    Ok(Json(structure))
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Vec<Comment>> {
    let query = CommentListQuery::from_query_string(raw.as_deref().unwrap_or_default())?;
    let comments = state.comments.list_comments(&query)?;
    Ok(Json(comments))
}

pub(crate) async fn get_comment(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
) -> ApiResult<Comment> {
    Ok(Json(state.comments.get_comment(comment_id)?))
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comments.create_comment(payload)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.comments.delete_comment(comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn add_reaction(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ReactionInput>,
) -> ApiResult<Comment> {
    Ok(Json(state.comments.react(comment_id, &payload)?))
}

pub(crate) async fn remove_reaction(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ReactionInput>,
) -> ApiResult<Comment> {
    Ok(Json(state.comments.unreact(comment_id, &payload)?))
}
