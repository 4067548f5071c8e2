use super::{ApiJson, AppState, blocking, listing};
use crate::auth::{self, CurrentUser};
use crate::error::ApiResult;
use crate::types::{UserCreate, UserDto};
use crate::updates::UserPatch;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.db.list_users()?;
    Ok(listing(users.iter().map(UserDto::from).collect()))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<UserDto>> {
    let user = state.db.require_user(id)?;
    Ok(Json(UserDto::from(&user)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<UserCreate>,
) -> ApiResult<impl IntoResponse> {
    input.validate()?;
    let cost = state.config.auth.bcrypt_cost;
    let password = input.password.clone();
    let digest = blocking(move || auth::hash_password(&password, cost)).await?;

    let user = state.db.create_user(&input, &digest)?;
    tracing::info!(user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

/// Partial update of the caller's own account. The password is only
/// re-hashed when the body carries one.
pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<Json<UserDto>> {
    current.ensure_is(id)?;
    let cost = state.config.auth.bcrypt_cost;
    let changes = blocking(move || patch.prepare(|p| auth::hash_password(p, cost))).await?;

    let user = state.db.update_user(id, changes)?;
    Ok(Json(UserDto::from(&user)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    current.ensure_is(id)?;
    state.db.delete_user(id)?;
    tracing::info!(user_id = id, "Deleted user");
    Ok(StatusCode::NO_CONTENT)
}
