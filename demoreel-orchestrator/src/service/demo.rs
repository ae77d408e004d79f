//! Demo Service
//!
//! Business logic for demo lifecycle: creation, plan confirmation, and
//! resolution of paused demos. Every status write goes through
//! [`transition`], which enforces the state machine and publishes an event.

use demoreel_core::domain::demo::{Demo, DemoStatus};
use demoreel_core::domain::job::PipelineJob;
use demoreel_core::domain::step::{Step, StepStatus};
use demoreel_core::dto::demo::{CreateDemo, DemoEvent, ResolveAction, ResolveStep};
use demoreel_core::dto::payload::{ParsePayload, RecordPayload};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::queue::JobQueues;
use crate::repository::{demo_repository, job_repository, step_repository};
use crate::service::events::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("demo not found")]
    NotFound,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create a demo and enqueue its planning job.
pub async fn create_demo(
    pool: &PgPool,
    queues: &JobQueues,
    req: CreateDemo,
) -> Result<Demo, DemoError> {
    let url = validate_url(&req.url)?;

    let demo = demo_repository::create(
        pool,
        CreateDemo {
            url: url.to_string(),
            description: req.description,
        },
    )
    .await?;

    info!("created demo {} for {}", demo.id, demo.url);
    queues.enqueue_parse(ParsePayload { demo_id: demo.id });
    Ok(demo)
}

pub async fn get_demo(pool: &PgPool, id: Uuid) -> Result<Demo, DemoError> {
    demo_repository::find_by_id(pool, id)
        .await?
        .ok_or(DemoError::NotFound)
}

pub async fn list_demos(pool: &PgPool) -> Result<Vec<Demo>, DemoError> {
    Ok(demo_repository::list_all(pool).await?)
}

pub async fn list_steps(pool: &PgPool, demo_id: Uuid) -> Result<Vec<Step>, DemoError> {
    get_demo(pool, demo_id).await?;
    Ok(step_repository::list_by_demo(pool, demo_id).await?)
}

pub async fn list_jobs(pool: &PgPool, demo_id: Uuid) -> Result<Vec<PipelineJob>, DemoError> {
    get_demo(pool, demo_id).await?;
    Ok(job_repository::list_by_demo(pool, demo_id).await?)
}

/// Confirm a reviewed plan and enqueue recording.
pub async fn confirm_demo(
    pool: &PgPool,
    queues: &JobQueues,
    events: &EventBus,
    id: Uuid,
) -> Result<Demo, DemoError> {
    let demo = get_demo(pool, id).await?;
    if demo.status != DemoStatus::Review {
        return Err(DemoError::InvalidState(format!(
            "demo is {:?}, expected review",
            demo.status
        )));
    }

    let steps = step_repository::list_by_demo(pool, id).await?;
    if steps.is_empty() {
        return Err(DemoError::InvalidState(
            "cannot confirm a demo with no steps".to_string(),
        ));
    }

    transition(pool, events, id, DemoStatus::Recording, None).await?;
    queues.enqueue_record(RecordPayload { demo_id: id });
    get_demo(pool, id).await
}

/// Resolve the failed step of a paused demo and resume recording.
pub async fn resolve_demo(
    pool: &PgPool,
    queues: &JobQueues,
    events: &EventBus,
    id: Uuid,
    req: ResolveStep,
) -> Result<Demo, DemoError> {
    let demo = get_demo(pool, id).await?;
    if demo.status != DemoStatus::Paused {
        return Err(DemoError::InvalidState(format!(
            "demo is {:?}, expected paused",
            demo.status
        )));
    }

    let step = step_repository::find_by_position(pool, id, req.position)
        .await?
        .ok_or_else(|| {
            DemoError::Validation(format!("no step at position {}", req.position))
        })?;
    if step.status != StepStatus::Failed {
        return Err(DemoError::Validation(format!(
            "step {} is {:?}, only failed steps can be resolved",
            req.position, step.status
        )));
    }

    let (new_status, narration) = resolution_outcome(req.action, req.narration.as_deref())?;
    if let Some(narration) = narration {
        step_repository::set_narration(pool, id, req.position, narration).await?;
    }
    step_repository::update_status(pool, id, req.position, new_status).await?;

    transition(pool, events, id, DemoStatus::Recording, None).await?;
    queues.enqueue_record(RecordPayload { demo_id: id });
    get_demo(pool, id).await
}

/// Validate a demo URL, returning it trimmed.
fn validate_url(url: &str) -> Result<&str, DemoError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DemoError::Validation("url must not be empty".to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(DemoError::Validation(
            "url must start with http:// or https://".to_string(),
        ));
    }
    Ok(url)
}

/// Map a resolution request onto the failed step's new status plus the
/// replacement narration to store, when any.
fn resolution_outcome(
    action: ResolveAction,
    narration: Option<&str>,
) -> Result<(StepStatus, Option<&str>), DemoError> {
    match action {
        ResolveAction::Skip => Ok((StepStatus::Skipped, None)),
        ResolveAction::Retry => Ok((StepStatus::Pending, None)),
        ResolveAction::Manual => {
            let narration = narration
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    DemoError::Validation(
                        "manual resolution requires replacement narration".to_string(),
                    )
                })?;
            Ok((StepStatus::Pending, Some(narration)))
        }
    }
}

/// Move a demo to `next`, enforcing the state machine.
///
/// Returns `Ok(false)` when the demo row no longer exists, so in-flight
/// stage work for a deleted demo dies quietly instead of erroring.
pub async fn transition(
    pool: &PgPool,
    events: &EventBus,
    id: Uuid,
    next: DemoStatus,
    error: Option<&str>,
) -> Result<bool, DemoError> {
    let Some(demo) = demo_repository::find_by_id(pool, id).await? else {
        warn!("transition for missing demo {}, dropping", id);
        return Ok(false);
    };

    if !demo.status.can_transition_to(next) {
        return Err(DemoError::InvalidState(format!(
            "cannot move demo {} from {:?} to {:?}",
            id, demo.status, next
        )));
    }

    let updated = demo_repository::update_status(pool, id, next, error).await?;
    if updated {
        info!("demo {} moved {:?} -> {:?}", id, demo.status, next);
        events.publish(DemoEvent {
            demo_id: id,
            status: next,
            error: error.map(str::to_string),
        });
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_trims_and_requires_http_scheme() {
        assert_eq!(
            validate_url("  https://app.example.com  ").unwrap(),
            "https://app.example.com"
        );
        assert!(validate_url("http://app.example.com").is_ok());
        assert!(matches!(
            validate_url(""),
            Err(DemoError::Validation(_))
        ));
        assert!(matches!(
            validate_url("   "),
            Err(DemoError::Validation(_))
        ));
        assert!(matches!(
            validate_url("ftp://app.example.com"),
            Err(DemoError::Validation(_))
        ));
        assert!(matches!(
            validate_url("app.example.com"),
            Err(DemoError::Validation(_))
        ));
    }

    #[test]
    fn test_skip_marks_step_skipped() {
        let (status, narration) = resolution_outcome(ResolveAction::Skip, None).unwrap();
        assert_eq!(status, StepStatus::Skipped);
        assert!(narration.is_none());
    }

    #[test]
    fn test_retry_resets_step_to_pending() {
        let (status, narration) = resolution_outcome(ResolveAction::Retry, None).unwrap();
        assert_eq!(status, StepStatus::Pending);
        assert!(narration.is_none());
    }

    #[test]
    fn test_manual_requires_narration() {
        assert!(matches!(
            resolution_outcome(ResolveAction::Manual, None),
            Err(DemoError::Validation(_))
        ));
        assert!(matches!(
            resolution_outcome(ResolveAction::Manual, Some("   ")),
            Err(DemoError::Validation(_))
        ));

        let (status, narration) =
            resolution_outcome(ResolveAction::Manual, Some(" We log in by hand. ")).unwrap();
        assert_eq!(status, StepStatus::Pending);
        assert_eq!(narration, Some("We log in by hand."));
    }
}
