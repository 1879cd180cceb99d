use super::{ApiError, ApiJson, ApiPath, ApiResult, AppState};
use crate::threading::validation;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct SetSettingRequest {
    value: String,
}

pub(crate) async fn get_setting_handler(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
) -> ApiResult<Option<String>> {
    let value = state
        .database
        .get_setting(&key)
        .map_err(ApiError::Internal)?;
    Ok(Json(value))
}

pub(crate) async fn set_setting_handler(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(req): ApiJson<SetSettingRequest>,
) -> Result<StatusCode, ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::BadRequest("setting key may not be empty".into()));
    }
    validation::validate_setting(&key, &req.value)?;
    state
        .database
        .set_setting(&key, &req.value)
        .map_err(ApiError::Internal)?;
    tracing::info!(key = %key, value = %req.value, "setting updated");
    Ok(StatusCode::NO_CONTENT)
}
