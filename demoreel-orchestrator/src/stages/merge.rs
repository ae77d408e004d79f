//! Merge stage
//!
//! Muxes the recorded segments with the narration track into the published
//! artifact and completes the demo. The work dir is purged afterwards
//! whether the mux succeeded or not; on failure its contents have no
//! recovery value because the demo is terminal.

use std::path::PathBuf;

use demoreel_core::domain::demo::DemoStatus;
use demoreel_core::domain::job::Stage;
use demoreel_core::dto::payload::MergePayload;
use demoreel_pipeline::muxer;
use tracing::{error, info, warn};

use crate::queue::with_retries;
use crate::repository::{demo_repository, job_repository};
use crate::service::demo as demo_service;
use crate::state::AppState;

pub async fn run(state: AppState, payload: MergePayload) {
    let pool = state.pool();
    let demo_id = payload.demo_id;

    match demo_repository::find_by_id(pool, demo_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("merge job for missing demo {}, dropping", demo_id);
            return;
        }
        Err(e) => {
            error!("merge job for demo {} failed to load: {}", demo_id, e);
            return;
        }
    }

    let job = match job_repository::open(pool, demo_id, Stage::Merge).await {
        Ok(job) => job,
        Err(e) => {
            error!("failed to open merge job for demo {}: {}", demo_id, e);
            return;
        }
    };

    let config = state.config();
    let work_dir = config.work_dir(demo_id);
    let out_path = config.public_dir().join(format!("{demo_id}.mp4"));
    let clips: Vec<PathBuf> = payload.audio_clips.iter().map(PathBuf::from).collect();

    let result = with_retries(
        config.stage_retry_attempts,
        config.stage_retry_base_delay,
        "merge",
        || async {
            tokio::fs::create_dir_all(config.public_dir()).await?;
            muxer::mux(&payload.segments, &clips, &out_path, &work_dir).await
        },
    )
    .await;

    match result {
        Ok((artifact, duration)) => {
            let url = config.artifact_url(demo_id);
            let _ = demo_repository::set_artifact(pool, demo_id, &url, duration).await;
            let _ = job_repository::complete(pool, job.id).await;
            info!(
                "demo {} published at {} ({:.0}s, {})",
                demo_id,
                url,
                duration,
                artifact.display()
            );
            finish(&state, demo_id, DemoStatus::Completed, None).await;
        }
        Err(e) => {
            let message = format!("merge: {e}");
            error!("demo {} merge failed: {}", demo_id, e);
            let _ = job_repository::fail(pool, job.id, &e.to_string()).await;
            finish(&state, demo_id, DemoStatus::Failed, Some(&message)).await;
        }
    }

    let _ = tokio::fs::remove_dir_all(&work_dir).await;
}

async fn finish(state: &AppState, demo_id: uuid::Uuid, status: DemoStatus, error: Option<&str>) {
    if let Err(e) =
        demo_service::transition(state.pool(), state.events(), demo_id, status, error).await
    {
        error!("demo {} could not move to {:?}: {}", demo_id, status, e);
    }
}
