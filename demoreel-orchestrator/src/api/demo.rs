//! Demo API handlers

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use demoreel_core::domain::demo::Demo;
use demoreel_core::domain::job::PipelineJob;
use demoreel_core::domain::step::Step;
use demoreel_core::dto::demo::{CreateDemo, ResolveStep};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::service::demo as demo_service;
use crate::state::AppState;

/// POST /demo/create
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateDemo>,
) -> Result<(StatusCode, Json<Demo>), ApiError> {
    let demo = demo_service::create_demo(state.pool(), state.queues(), req).await?;
    Ok((StatusCode::CREATED, Json(demo)))
}

/// GET /demo/list
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Demo>>, ApiError> {
    Ok(Json(demo_service::list_demos(state.pool()).await?))
}

/// GET /demo/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Demo>, ApiError> {
    Ok(Json(demo_service::get_demo(state.pool(), id).await?))
}

/// GET /demo/{id}/steps
pub async fn steps(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Step>>, ApiError> {
    Ok(Json(demo_service::list_steps(state.pool(), id).await?))
}

/// GET /demo/{id}/jobs
pub async fn jobs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PipelineJob>>, ApiError> {
    Ok(Json(demo_service::list_jobs(state.pool(), id).await?))
}

/// POST /demo/{id}/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Demo>, ApiError> {
    let demo =
        demo_service::confirm_demo(state.pool(), state.queues(), state.events(), id).await?;
    Ok(Json(demo))
}

/// POST /demo/{id}/resolve
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveStep>,
) -> Result<Json<Demo>, ApiError> {
    let demo =
        demo_service::resolve_demo(state.pool(), state.queues(), state.events(), id, req).await?;
    Ok(Json(demo))
}

/// GET /demo/{id}/events
///
/// Server-sent stream of this demo's status changes. Polling the demo
/// resource remains available as a fallback; a lagged subscriber simply
/// resumes from the next event.
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    demo_service::get_demo(state.pool(), id).await?;

    let rx = state.events().subscribe();
    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.demo_id == id => {
                    let sse_event = Event::default()
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default());
                    return Some((Ok(sse_event), rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
