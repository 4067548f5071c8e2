use super::{ApiJson, AppState, blocking};
use crate::auth::{self, CurrentUser};
use crate::error::ApiResult;
use crate::types::LoginRequest;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// `POST /api/login`: returns the bearer token as plain text.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<String> {
    blocking(move || auth::login(&state.db, &state.config.auth, &request)).await
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    if let Some(token) = auth::bearer_token(&headers) {
        state.db.delete_session(token)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve the bearer token and attach [`CurrentUser`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let current: CurrentUser = auth::authenticate(&state.db, request.headers())?;
    tracing::debug!(user_id = current.id(), "Authenticated request");
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}
