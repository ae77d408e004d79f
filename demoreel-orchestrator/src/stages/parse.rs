//! Parse stage
//!
//! Renders the demo's URL, asks the model for a step plan, and parks the
//! demo in `review` for the user to inspect. Planning is retried because
//! model calls fail transiently; a final failure is terminal for the demo.

use demoreel_core::domain::demo::DemoStatus;
use demoreel_core::domain::job::Stage;
use demoreel_core::dto::payload::ParsePayload;
use tracing::{error, info, warn};

use crate::queue::with_retries;
use crate::repository::{demo_repository, job_repository, step_repository};
use crate::service::demo as demo_service;
use crate::state::AppState;

pub async fn run(state: AppState, payload: ParsePayload) {
    let pool = state.pool();
    let demo_id = payload.demo_id;

    let demo = match demo_repository::find_by_id(pool, demo_id).await {
        Ok(Some(demo)) => demo,
        Ok(None) => {
            warn!("parse job for missing demo {}, dropping", demo_id);
            return;
        }
        Err(e) => {
            error!("parse job for demo {} failed to load: {}", demo_id, e);
            return;
        }
    };

    match demo_service::transition(pool, state.events(), demo_id, DemoStatus::Parsing, None).await
    {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            warn!("parse job for demo {} rejected: {}", demo_id, e);
            return;
        }
    }

    let job = match job_repository::open(pool, demo_id, Stage::Parse).await {
        Ok(job) => job,
        Err(e) => {
            error!("failed to open parse job for demo {}: {}", demo_id, e);
            return;
        }
    };

    let config = state.config();
    let planner = state.planner();
    let planned = with_retries(
        config.stage_retry_attempts,
        config.stage_retry_base_delay,
        "parse",
        || planner.plan(&demo.url, demo.description.as_deref(), demo.login_state.as_ref()),
    )
    .await;

    match planned {
        Ok(proposals) => {
            if let Err(e) = step_repository::insert_plan(pool, demo_id, &proposals).await {
                error!("failed to persist plan for demo {}: {}", demo_id, e);
                let _ = job_repository::fail(pool, job.id, &e.to_string()).await;
                finish(&state, demo_id, DemoStatus::Failed, Some("parse: could not persist plan"))
                    .await;
                return;
            }
            let _ = job_repository::complete(pool, job.id).await;
            info!("demo {} planned with {} steps", demo_id, proposals.len());
            finish(&state, demo_id, DemoStatus::Review, None).await;
        }
        Err(e) => {
            let message = format!("parse: {e}");
            error!("demo {} planning failed: {}", demo_id, e);
            let _ = job_repository::fail(pool, job.id, &e.to_string()).await;
            finish(&state, demo_id, DemoStatus::Failed, Some(&message)).await;
        }
    }
}

async fn finish(state: &AppState, demo_id: uuid::Uuid, status: DemoStatus, error: Option<&str>) {
    if let Err(e) =
        demo_service::transition(state.pool(), state.events(), demo_id, status, error).await
    {
        error!("demo {} could not move to {:?}: {}", demo_id, status, e);
    }
}
