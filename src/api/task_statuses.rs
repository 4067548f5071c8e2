use super::{ApiJson, AppState, listing};
use crate::error::ApiResult;
use crate::types::{TaskStatusCreate, TaskStatusDto};
use crate::updates::TaskStatusPatch;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let statuses = state.db.list_statuses()?;
    Ok(listing(statuses.iter().map(TaskStatusDto::from).collect()))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskStatusDto>> {
    let status = state.db.require_status(id)?;
    Ok(Json(TaskStatusDto::from(&status)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<TaskStatusCreate>,
) -> ApiResult<impl IntoResponse> {
    let status = state.db.create_status(&input)?;
    Ok((StatusCode::CREATED, Json(TaskStatusDto::from(&status))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<TaskStatusPatch>,
) -> ApiResult<Json<TaskStatusDto>> {
    let status = state.db.update_status(id, patch)?;
    Ok(Json(TaskStatusDto::from(&status)))
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.db.delete_status(id)?;
    Ok(StatusCode::NO_CONTENT)
}
