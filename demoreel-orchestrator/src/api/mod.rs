//! API Module
//!
//! HTTP endpoint definitions and routing for the orchestrator.

pub mod demo;
pub mod error;
pub mod health;
pub mod session;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main application router with all routes
pub fn create_router(state: AppState) -> Router {
    let public_dir = state.config().public_dir();

    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Demo lifecycle
        .route("/demo/create", post(demo::create))
        .route("/demo/list", get(demo::list))
        .route("/demo/{id}", get(demo::get))
        .route("/demo/{id}/steps", get(demo::steps))
        .route("/demo/{id}/jobs", get(demo::jobs))
        .route("/demo/{id}/confirm", post(demo::confirm))
        .route("/demo/{id}/resolve", post(demo::resolve))
        .route("/demo/{id}/events", get(demo::events))
        // Interactive session relay
        .route("/session/{demo_id}/start", post(session::start))
        .route("/session/{demo_id}/screenshot", get(session::screenshot))
        .route("/session/{demo_id}/input", post(session::input))
        .route("/session/{demo_id}/save", post(session::save))
        .route("/session/{demo_id}", delete(session::close))
        // Published artifacts
        .nest_service("/media", ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
