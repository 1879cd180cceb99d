use super::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::threading::{CreateDiscussionInput, DiscussionView};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ListDiscussionsParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
    threading_enabled: bool,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
        threading_enabled: state.config.threading.enabled,
    })
}

pub(crate) async fn create_discussion(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateDiscussionInput>,
) -> Result<(StatusCode, Json<DiscussionView>), ApiError> {
    let discussion = state.comments.create_discussion(payload)?;
    Ok((StatusCode::CREATED, Json(discussion)))
}

pub(crate) async fn list_discussions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListDiscussionsParams>,
) -> ApiResult<Vec<DiscussionView>> {
    let limit = params
        .limit
        .unwrap_or(state.config.threading.default_limit)
        .clamp(1, state.config.threading.max_limit.max(1));
    Ok(Json(state.comments.list_discussions(limit)?))
}

pub(crate) async fn get_discussion(
    State(state): State<AppState>,
    ApiPath(discussion_id): ApiPath<i64>,
) -> ApiResult<DiscussionView> {
    Ok(Json(state.comments.get_discussion(discussion_id)?))
}
