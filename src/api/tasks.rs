use super::{ApiJson, ApiQuery, AppState, listing};
use crate::error::ApiResult;
use crate::filter::{TaskFilter, build_filter_predicate};
use crate::types::{TaskCreate, TaskDto};
use crate::updates::TaskPatch;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::collections::HashMap;

/// `GET /api/tasks?titleCont=&assigneeId=&status=&labelId=`
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<impl IntoResponse> {
    let filter = TaskFilter::from_params(&params)?;
    let predicate = build_filter_predicate(&filter);
    tracing::debug!(?predicate, "Listing tasks");

    let tasks = state.db.find_tasks_matching(&predicate)?;
    Ok(listing(tasks.iter().map(TaskDto::from).collect()))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<TaskDto>> {
    let task = state.db.require_task(id)?;
    Ok(Json(TaskDto::from(&task)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<TaskCreate>,
) -> ApiResult<impl IntoResponse> {
    let task = state.db.create_task(input)?;
    Ok((StatusCode::CREATED, Json(TaskDto::from(&task))))
}

/// Partial update; absent fields keep their stored values.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> ApiResult<Json<TaskDto>> {
    let task = state.db.update_task(id, patch)?;
    Ok(Json(TaskDto::from(&task)))
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.db.delete_task(id)?;
    Ok(StatusCode::NO_CONTENT)
}
