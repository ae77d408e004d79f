//! Step Repository
//!
//! Handles all database operations related to steps. Positions are written
//! as a contiguous 1-based run when a plan is inserted and never changed
//! afterwards.

use demoreel_core::domain::step::{ActionKind, Step, StepStatus};
use demoreel_core::dto::step::ProposedStep;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert the planner's proposals as pending steps with positions 1..n
pub async fn insert_plan(
    pool: &PgPool,
    demo_id: Uuid,
    proposals: &[ProposedStep],
) -> Result<Vec<Step>, sqlx::Error> {
    let mut steps = Vec::with_capacity(proposals.len());

    for (index, proposal) in proposals.iter().enumerate() {
        let step = Step {
            id: Uuid::new_v4(),
            demo_id,
            position: (index as i32) + 1,
            title: proposal.title.clone(),
            action: proposal.action,
            selector: proposal.selector.clone(),
            value: proposal.value.clone(),
            narration: proposal.narration.clone(),
            start_seconds: None,
            end_seconds: None,
            status: StepStatus::Pending,
        };

        sqlx::query(
            r#"
            INSERT INTO steps (id, demo_id, position, title, action, selector,
                               value, narration, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(step.id)
        .bind(step.demo_id)
        .bind(step.position)
        .bind(&step.title)
        .bind(action_to_string(step.action))
        .bind(&step.selector)
        .bind(&step.value)
        .bind(&step.narration)
        .bind(status_to_string(step.status))
        .execute(pool)
        .await?;

        steps.push(step);
    }

    Ok(steps)
}

/// List a demo's steps in position order
pub async fn list_by_demo(pool: &PgPool, demo_id: Uuid) -> Result<Vec<Step>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT id, demo_id, position, title, action, selector, value,
               narration, start_seconds, end_seconds, status
        FROM steps
        WHERE demo_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(demo_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Find one step by its demo and position
pub async fn find_by_position(
    pool: &PgPool,
    demo_id: Uuid,
    position: i32,
) -> Result<Option<Step>, sqlx::Error> {
    let row = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT id, demo_id, position, title, action, selector, value,
               narration, start_seconds, end_seconds, status
        FROM steps
        WHERE demo_id = $1 AND position = $2
        "#,
    )
    .bind(demo_id)
    .bind(position)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Update one step's status by (demo, position)
pub async fn update_status(
    pool: &PgPool,
    demo_id: Uuid,
    position: i32,
    status: StepStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE steps
        SET status = $1
        WHERE demo_id = $2 AND position = $3
        "#,
    )
    .bind(status_to_string(status))
    .bind(demo_id)
    .bind(position)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write a recorded step's timestamps along with its final status
pub async fn finish_recorded(
    pool: &PgPool,
    demo_id: Uuid,
    position: i32,
    status: StepStatus,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE steps
        SET status = $1, start_seconds = $2, end_seconds = $3
        WHERE demo_id = $4 AND position = $5
        "#,
    )
    .bind(status_to_string(status))
    .bind(start_seconds)
    .bind(end_seconds)
    .bind(demo_id)
    .bind(position)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace a step's narration (manual resolution of a failed step)
pub async fn set_narration(
    pool: &PgPool,
    demo_id: Uuid,
    position: i32,
    narration: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE steps
        SET narration = $1
        WHERE demo_id = $2 AND position = $3
        "#,
    )
    .bind(narration)
    .bind(demo_id)
    .bind(position)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn action_to_string(action: ActionKind) -> &'static str {
    match action {
        ActionKind::Navigate => "navigate",
        ActionKind::Click => "click",
        ActionKind::Fill => "fill",
        ActionKind::Wait => "wait",
        ActionKind::Assert => "assert",
    }
}

pub fn string_to_action(s: &str) -> ActionKind {
    match s {
        "navigate" => ActionKind::Navigate,
        "click" => ActionKind::Click,
        "fill" => ActionKind::Fill,
        "wait" => ActionKind::Wait,
        "assert" => ActionKind::Assert,
        _ => ActionKind::Assert,
    }
}

pub fn status_to_string(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Recording => "recording",
        StepStatus::Completed => "completed",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

pub fn string_to_status(s: &str) -> StepStatus {
    match s {
        "pending" => StepStatus::Pending,
        "recording" => StepStatus::Recording,
        "completed" => StepStatus::Completed,
        "failed" => StepStatus::Failed,
        "skipped" => StepStatus::Skipped,
        _ => StepStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StepRow {
    id: Uuid,
    demo_id: Uuid,
    position: i32,
    title: String,
    action: String,
    selector: Option<String>,
    value: Option<String>,
    narration: Option<String>,
    start_seconds: Option<f64>,
    end_seconds: Option<f64>,
    status: String,
}

impl From<StepRow> for Step {
    fn from(row: StepRow) -> Self {
        Step {
            id: row.id,
            demo_id: row.demo_id,
            position: row.position,
            title: row.title,
            action: string_to_action(&row.action),
            selector: row.selector,
            value: row.value,
            narration: row.narration,
            start_seconds: row.start_seconds,
            end_seconds: row.end_seconds,
            status: string_to_status(&row.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_string_round_trip() {
        for action in [
            ActionKind::Navigate,
            ActionKind::Click,
            ActionKind::Fill,
            ActionKind::Wait,
            ActionKind::Assert,
        ] {
            assert_eq!(string_to_action(action_to_string(action)), action);
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            StepStatus::Pending,
            StepStatus::Recording,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Skipped,
        ] {
            assert_eq!(string_to_status(status_to_string(status)), status);
        }
    }
}
