mod comments;
mod discussions;
mod settings;

use crate::config::ThreadloomConfig;
use crate::database::Database;
use crate::error::ThreadError;
use crate::threading::CommentService;
use anyhow::Result;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ThreadloomConfig,
    pub database: Database,
    pub comments: CommentService,
}

impl AppState {
    pub fn new(config: ThreadloomConfig, database: Database) -> Self {
        let comments = CommentService::from_config(database.clone(), &config);
        Self {
            config,
            database,
            comments,
        }
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<ThreadError> for ApiError {
    fn from(err: ThreadError) -> Self {
        match err {
            ThreadError::Validation(message) => ApiError::BadRequest(message),
            err @ ThreadError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ThreadError::Consistency(message) => {
                ApiError::Internal(anyhow::anyhow!("consistency violation: {message}"))
            }
            ThreadError::Internal(err) => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` whose rejections answer with the `{message}` error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct ApiJson<T>(pub T);

/// `Path` whose rejections answer with the `{message}` error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub(crate) struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub(crate) struct ApiQuery<T>(pub T);

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(discussions::health_handler))
        .route(
            "/api/v2/discussions",
            get(discussions::list_discussions).post(discussions::create_discussion),
        )
        .route("/api/v2/discussions/:id", get(discussions::get_discussion))
        .route(
            "/api/v2/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/v2/comments/thread", get(comments::get_thread))
        .route(
            "/api/v2/comments/:id",
            get(comments::get_comment).delete(comments::delete_comment),
        )
        .route("/api/v2/comments/:id/react", post(comments::add_reaction))
        .route("/api/v2/comments/:id/unreact", post(comments::remove_reaction))
        .route(
            "/api/v2/settings/:key",
            get(settings::get_setting_handler).put(settings::set_setting_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: ThreadloomConfig, database: Database) -> Result<()> {
    let requested_port = config.api_port;
    let router = router(AppState::new(config, database));

    // Try to bind to the configured port, or find the next available port
    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
