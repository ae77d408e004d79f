//! Record stage
//!
//! Replays the demo's unfinished steps in a recorded browser and persists
//! the per-step timestamps. A skippable step failure is written as
//! `skipped` and the run continues; a fatal one pauses the demo with the
//! failed step marked for the user to resolve. Runs are not retried:
//! footage already captured is kept as a segment and later runs append to
//! it, so a blind retry would duplicate work on screen.

use demoreel_core::domain::demo::{DemoStatus, VideoSegment};
use demoreel_core::domain::job::Stage;
use demoreel_core::domain::step::{Step, StepStatus, steps_to_run};
use demoreel_core::dto::payload::{RecordPayload, TtsPayload};
use demoreel_pipeline::executor::{RecordingOutcome, StepOutcome};
use tracing::{error, info, warn};

use crate::repository::{demo_repository, job_repository, step_repository};
use crate::service::demo as demo_service;
use crate::state::AppState;

pub async fn run(state: AppState, payload: RecordPayload) {
    let pool = state.pool();
    let demo_id = payload.demo_id;

    let demo = match demo_repository::find_by_id(pool, demo_id).await {
        Ok(Some(demo)) => demo,
        Ok(None) => {
            warn!("record job for missing demo {}, dropping", demo_id);
            return;
        }
        Err(e) => {
            error!("record job for demo {} failed to load: {}", demo_id, e);
            return;
        }
    };
    if demo.status != DemoStatus::Recording {
        warn!(
            "record job for demo {} in {:?}, dropping",
            demo_id, demo.status
        );
        return;
    }

    let steps = match step_repository::list_by_demo(pool, demo_id).await {
        Ok(steps) => steps,
        Err(e) => {
            error!("record job for demo {} failed to load steps: {}", demo_id, e);
            return;
        }
    };
    let to_run = steps_to_run(&steps);
    if to_run.is_empty() {
        // Nothing left to record (the only failed step was skipped).
        advance(&state, demo_id, demo.segments).await;
        return;
    }

    let job = match job_repository::open(pool, demo_id, Stage::Record).await {
        Ok(job) => job,
        Err(e) => {
            error!("failed to open record job for demo {}: {}", demo_id, e);
            return;
        }
    };

    for step in &to_run {
        let _ = step_repository::update_status(pool, demo_id, step.position, StepStatus::Recording)
            .await;
    }

    // Timestamps are relative to the final stitched video, so steps in this
    // run start after all previously kept footage.
    let offset: f64 = demo.segments.iter().map(|s| s.duration_seconds).sum();
    let work_dir = state.config().work_dir(demo_id);
    let outcome = match state
        .executor()
        .run(&to_run, demo.login_state.as_ref(), &work_dir)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = format!("record: {e}");
            error!("demo {} recording failed: {}", demo_id, e);
            // Nothing was attempted; a step left in `recording` here would
            // never move again.
            for step in &to_run {
                let _ =
                    step_repository::update_status(pool, demo_id, step.position, StepStatus::Pending)
                        .await;
            }
            let _ = job_repository::fail(pool, job.id, &e.to_string()).await;
            finish(&state, demo_id, DemoStatus::Failed, Some(&message)).await;
            return;
        }
    };

    for write in step_writes(&to_run, &outcome, offset) {
        match write {
            StepWrite::Finished {
                position,
                status,
                start_seconds,
                end_seconds,
            } => {
                if status == StepStatus::Skipped {
                    warn!("demo {} step {} skipped on failure", demo_id, position);
                }
                let _ = step_repository::finish_recorded(
                    pool,
                    demo_id,
                    position,
                    status,
                    start_seconds,
                    end_seconds,
                )
                .await;
            }
            StepWrite::Status { position, status } => {
                let _ = step_repository::update_status(pool, demo_id, position, status).await;
            }
        }
    }

    let mut segments = demo.segments;
    if let Some(segment) = &outcome.segment {
        let segment = VideoSegment {
            path: segment.path.to_string_lossy().to_string(),
            duration_seconds: segment.duration_seconds,
        };
        let _ = demo_repository::append_segment(pool, demo_id, &segment).await;
        segments.push(segment);
    }

    if let Some(fatal) = &outcome.fatal {
        let message = format!("record: step {}: {}", fatal.position, fatal.message);
        error!("demo {} paused: {}", demo_id, message);
        let _ = job_repository::fail(pool, job.id, &message).await;
        finish(&state, demo_id, DemoStatus::Paused, Some(&message)).await;
        return;
    }

    if segments.is_empty() {
        let message = "record: no video captured";
        error!("demo {} {}", demo_id, message);
        let _ = job_repository::fail(pool, job.id, message).await;
        finish(&state, demo_id, DemoStatus::Failed, Some(message)).await;
        return;
    }

    let _ = job_repository::complete(pool, job.id).await;
    info!(
        "demo {} recorded, {} segment(s) total",
        demo_id,
        segments.len()
    );
    advance(&state, demo_id, segments).await;
}

/// Move the demo into processing and hand its segments to narration.
async fn advance(state: &AppState, demo_id: uuid::Uuid, segments: Vec<VideoSegment>) {
    if segments.is_empty() {
        finish(
            state,
            demo_id,
            DemoStatus::Failed,
            Some("record: no video captured"),
        )
        .await;
        return;
    }
    finish(state, demo_id, DemoStatus::Processing, None).await;
    state.queues().enqueue_tts(TtsPayload { demo_id, segments });
}

async fn finish(state: &AppState, demo_id: uuid::Uuid, status: DemoStatus, error: Option<&str>) {
    if let Err(e) =
        demo_service::transition(state.pool(), state.events(), demo_id, status, error).await
    {
        error!("demo {} could not move to {:?}: {}", demo_id, status, e);
    }
}

/// One step's status write after a record run.
#[derive(Debug, PartialEq)]
enum StepWrite {
    /// The step was attempted; timestamps are absolute within the final
    /// stitched video.
    Finished {
        position: i32,
        status: StepStatus,
        start_seconds: f64,
        end_seconds: f64,
    },
    Status { position: i32, status: StepStatus },
}

/// Map a run outcome onto a status write for every step the run was given.
///
/// Attempted steps land on `completed` or `skipped` with their timestamps
/// offset by earlier segments. A fatal failure marks its step `failed` and
/// sends every step the run never reached back to `pending`, so no step is
/// left sitting in `recording` on a paused demo.
fn step_writes(to_run: &[Step], outcome: &RecordingOutcome, offset: f64) -> Vec<StepWrite> {
    to_run
        .iter()
        .map(|step| {
            if let Some(result) = outcome.results.iter().find(|r| r.position == step.position) {
                let status = match &result.outcome {
                    StepOutcome::Completed => StepStatus::Completed,
                    StepOutcome::SkippedOnFailure { .. } => StepStatus::Skipped,
                };
                return StepWrite::Finished {
                    position: step.position,
                    status,
                    start_seconds: offset + result.start_seconds,
                    end_seconds: offset + result.end_seconds,
                };
            }
            let status = match &outcome.fatal {
                Some(fatal) if fatal.position == step.position => StepStatus::Failed,
                _ => StepStatus::Pending,
            };
            StepWrite::Status {
                position: step.position,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_core::domain::step::ActionKind;
    use demoreel_pipeline::executor::{FatalFailure, StepResult};
    use uuid::Uuid;

    fn step(position: i32) -> Step {
        Step {
            id: Uuid::new_v4(),
            demo_id: Uuid::new_v4(),
            position,
            title: format!("Step {position}"),
            action: ActionKind::Click,
            selector: Some("#button".to_string()),
            value: None,
            narration: None,
            start_seconds: None,
            end_seconds: None,
            status: StepStatus::Recording,
        }
    }

    fn result(position: i32, outcome: StepOutcome, start: f64, end: f64) -> StepResult {
        StepResult {
            position,
            outcome,
            start_seconds: start,
            end_seconds: end,
        }
    }

    #[test]
    fn test_skippable_failure_marks_skipped_and_run_continues() {
        let to_run = vec![step(1), step(2), step(3)];
        let outcome = RecordingOutcome {
            segment: None,
            results: vec![
                result(1, StepOutcome::Completed, 0.0, 2.0),
                result(
                    2,
                    StepOutcome::SkippedOnFailure {
                        message: "no element matches #gone".to_string(),
                    },
                    2.0,
                    3.0,
                ),
                result(3, StepOutcome::Completed, 3.0, 5.0),
            ],
            fatal: None,
        };

        let writes = step_writes(&to_run, &outcome, 0.0);
        assert_eq!(
            writes,
            vec![
                StepWrite::Finished {
                    position: 1,
                    status: StepStatus::Completed,
                    start_seconds: 0.0,
                    end_seconds: 2.0,
                },
                StepWrite::Finished {
                    position: 2,
                    status: StepStatus::Skipped,
                    start_seconds: 2.0,
                    end_seconds: 3.0,
                },
                StepWrite::Finished {
                    position: 3,
                    status: StepStatus::Completed,
                    start_seconds: 3.0,
                    end_seconds: 5.0,
                },
            ]
        );
    }

    #[test]
    fn test_fatal_failure_fails_its_step_and_resets_the_rest() {
        let to_run = vec![step(1), step(2), step(3)];
        let outcome = RecordingOutcome {
            segment: None,
            results: vec![result(1, StepOutcome::Completed, 0.0, 2.0)],
            fatal: Some(FatalFailure {
                position: 2,
                message: "navigation failed".to_string(),
            }),
        };

        let writes = step_writes(&to_run, &outcome, 0.0);
        assert_eq!(
            writes[1],
            StepWrite::Status {
                position: 2,
                status: StepStatus::Failed,
            }
        );
        // The step the run never reached goes back to pending, not stuck
        // in recording.
        assert_eq!(
            writes[2],
            StepWrite::Status {
                position: 3,
                status: StepStatus::Pending,
            }
        );
    }

    #[test]
    fn test_fatal_first_step_resets_all_unattempted_steps() {
        let to_run = vec![step(1), step(2), step(3)];
        let outcome = RecordingOutcome {
            segment: None,
            results: vec![],
            fatal: Some(FatalFailure {
                position: 1,
                message: "navigation failed".to_string(),
            }),
        };

        let writes = step_writes(&to_run, &outcome, 0.0);
        assert_eq!(
            writes,
            vec![
                StepWrite::Status {
                    position: 1,
                    status: StepStatus::Failed,
                },
                StepWrite::Status {
                    position: 2,
                    status: StepStatus::Pending,
                },
                StepWrite::Status {
                    position: 3,
                    status: StepStatus::Pending,
                },
            ]
        );
    }

    #[test]
    fn test_timestamps_are_offset_by_earlier_segments() {
        let to_run = vec![step(2)];
        let outcome = RecordingOutcome {
            segment: None,
            results: vec![result(2, StepOutcome::Completed, 0.5, 2.5)],
            fatal: None,
        };

        let writes = step_writes(&to_run, &outcome, 10.0);
        assert_eq!(
            writes,
            vec![StepWrite::Finished {
                position: 2,
                status: StepStatus::Completed,
                start_seconds: 10.5,
                end_seconds: 12.5,
            }]
        );
    }
}
