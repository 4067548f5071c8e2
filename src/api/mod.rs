//! HTTP API.
//!
//! Every route under `/api` except login and health requires a bearer token.
//! Handlers translate between wire DTOs and the database layer; errors are
//! rendered by [`ApiError`]'s `IntoResponse`.

mod auth;
mod labels;
mod task_statuses;
mod tasks;
mod users;

use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, ApiResult, ErrorCode};
use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderName, request::Parts},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Header carrying the size of a list response.
pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self { db, config }
    }
}

/// JSON body extractor that reports malformed input as `VALIDATION_FAILED`.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::ValidationFailed, "malformed request body")
            .with_details(rejection.body_text())
    }
}

/// Query string extractor that reports undecodable input as
/// `INVALID_FILTER_VALUE`.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(ErrorCode::InvalidFilterValue, "malformed query string")
            .with_details(rejection.body_text())
    }
}

/// A JSON array with its length in `X-Total-Count`.
fn listing<T: Serialize>(items: Vec<T>) -> impl IntoResponse {
    ([(TOTAL_COUNT_HEADER, items.len().to_string())], Json(items))
}

/// Run CPU-heavy work (password hashing) off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([TOTAL_COUNT_HEADER]);

    let protected = Router::new()
        .route("/api/logout", post(auth::logout))
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/{id}",
            get(users::show).put(users::update).delete(users::destroy),
        )
        .route(
            "/api/task_statuses",
            get(task_statuses::list).post(task_statuses::create),
        )
        .route(
            "/api/task_statuses/{id}",
            get(task_statuses::show)
                .put(task_statuses::update)
                .delete(task_statuses::destroy),
        )
        .route("/api/labels", get(labels::list).post(labels::create))
        .route(
            "/api/labels/{id}",
            get(labels::show).put(labels::update).delete(labels::destroy),
        )
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/{id}",
            get(tasks::show).put(tasks::update).delete(tasks::destroy),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/health", get(health))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = &state.config.server;
    let addr: SocketAddr = format!("{}:{}", server.bind, server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Task manager listening on http://{}", bound_addr);

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Server shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    struct Page {
        #[allow(dead_code)]
        size: u32,
    }

    fn parts(uri: &str) -> Parts {
        let (parts, _) = axum::http::Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_query_rejection_is_an_api_error() {
        let err = ApiQuery::<Page>::from_request_parts(&mut parts("/api/tasks?size=lots"), &())
            .await
            .err()
            .expect("undecodable query");
        assert_eq!(err.code, ErrorCode::InvalidFilterValue);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
        assert!(err.details.is_some());
    }

    #[tokio::test]
    async fn test_query_passes_through_decoded_params() {
        let mut parts = parts("/api/tasks?titleCont=%D0%9C%D0%B8%D1%80&status=draft");
        let ApiQuery(params) = ApiQuery::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(params.get("titleCont").map(String::as_str), Some("Мир"));
        assert_eq!(params.get("status").map(String::as_str), Some("draft"));
    }
}
