use super::{ApiJson, AppState, listing};
use crate::error::ApiResult;
use crate::types::{LabelCreate, LabelDto};
use crate::updates::LabelPatch;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let labels = state.db.list_labels()?;
    Ok(listing(labels.iter().map(LabelDto::from).collect()))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<LabelDto>> {
    let label = state.db.require_label(id)?;
    Ok(Json(LabelDto::from(&label)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LabelCreate>,
) -> ApiResult<impl IntoResponse> {
    let label = state.db.create_label(&input)?;
    Ok((StatusCode::CREATED, Json(LabelDto::from(&label))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<LabelPatch>,
) -> ApiResult<Json<LabelDto>> {
    let label = state.db.update_label(id, patch)?;
    Ok(Json(LabelDto::from(&label)))
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.db.delete_label(id)?;
    Ok(StatusCode::NO_CONTENT)
}
