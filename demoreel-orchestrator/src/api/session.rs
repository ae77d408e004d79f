//! Interactive session API handlers
//!
//! A session lets the user drive the demo's browser by hand (typically to
//! log in) before confirming the plan. The client polls the screenshot
//! endpoint and posts input events; saving extracts the login state into
//! the demo and tears the browser down.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use demoreel_core::domain::demo::Demo;
use demoreel_core::dto::session::{InputEvent, StartSession};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::repository::demo_repository;
use crate::service::demo as demo_service;
use crate::state::AppState;

/// POST /session/{demo_id}/start
pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartSession>,
) -> Result<StatusCode, ApiError> {
    demo_service::get_demo(state.pool(), id).await?;
    state.sessions().start(id, &req.url).await?;
    Ok(StatusCode::CREATED)
}

/// GET /session/{demo_id}/screenshot
pub async fn screenshot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let bytes = state.sessions().screenshot(id).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// POST /session/{demo_id}/input
pub async fn input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<InputEvent>,
) -> Result<StatusCode, ApiError> {
    state.sessions().relay_input(id, event).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /session/{demo_id}/save
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Demo>, ApiError> {
    demo_service::get_demo(state.pool(), id).await?;
    let login_state = state.sessions().save_and_close(id).await?;
    demo_repository::set_login_state(state.pool(), id, &login_state).await?;
    Ok(Json(demo_service::get_demo(state.pool(), id).await?))
}

/// DELETE /session/{demo_id}
pub async fn close(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    state.sessions().close(id).await;
    StatusCode::NO_CONTENT
}
