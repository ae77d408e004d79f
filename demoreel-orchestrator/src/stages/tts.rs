//! Narration stage
//!
//! Synthesizes one audio clip per finished step and hands clips plus
//! segments to the merge stage. Synthesis is retried for transient backend
//! failures; an unavailable backend never fails the demo because the
//! synthesizer falls back to measured silence per clip.

use demoreel_core::domain::demo::DemoStatus;
use demoreel_core::domain::job::Stage;
use demoreel_core::domain::step::StepStatus;
use demoreel_core::dto::payload::{MergePayload, TtsPayload};
use tracing::{error, info, warn};

use crate::queue::with_retries;
use crate::repository::{demo_repository, job_repository, step_repository};
use crate::service::demo as demo_service;
use crate::state::AppState;

pub async fn run(state: AppState, payload: TtsPayload) {
    let pool = state.pool();
    let demo_id = payload.demo_id;

    match demo_repository::find_by_id(pool, demo_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("tts job for missing demo {}, dropping", demo_id);
            return;
        }
        Err(e) => {
            error!("tts job for demo {} failed to load: {}", demo_id, e);
            return;
        }
    }

    let steps = match step_repository::list_by_demo(pool, demo_id).await {
        Ok(steps) => steps,
        Err(e) => {
            error!("tts job for demo {} failed to load steps: {}", demo_id, e);
            return;
        }
    };
    // Skipped steps are absent from the video, so they get no narration.
    let narrated: Vec<_> = steps
        .into_iter()
        .filter(|s| s.status == StepStatus::Completed)
        .collect();
    if narrated.is_empty() {
        let message = "tts: no completed steps to narrate";
        finish(&state, demo_id, DemoStatus::Failed, Some(message)).await;
        return;
    }

    let job = match job_repository::open(pool, demo_id, Stage::Tts).await {
        Ok(job) => job,
        Err(e) => {
            error!("failed to open tts job for demo {}: {}", demo_id, e);
            return;
        }
    };

    let config = state.config();
    let synthesizer = state.synthesizer();
    let work_dir = config.work_dir(demo_id);
    let outcome = with_retries(
        config.stage_retry_attempts,
        config.stage_retry_base_delay,
        "tts",
        || synthesizer.synthesize(&narrated, &work_dir),
    )
    .await;

    match outcome {
        Ok(narration) => {
            let _ = job_repository::complete(pool, job.id).await;
            info!(
                "demo {} narrated: {} clips, {:.1}s",
                demo_id,
                narration.clips.len(),
                narration.total_seconds
            );
            state.queues().enqueue_merge(MergePayload {
                demo_id,
                segments: payload.segments,
                audio_clips: narration
                    .clips
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect(),
            });
        }
        Err(e) => {
            let message = format!("tts: {e}");
            error!("demo {} narration failed: {}", demo_id, e);
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
