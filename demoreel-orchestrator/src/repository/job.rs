//! Pipeline Job Repository
//!
//! Append-only audit records of stage executions. Opening a job supersedes
//! any record still marked running for the same (demo, stage), keeping one
//! open record per stage per demo.

use demoreel_core::domain::job::{JobStatus, PipelineJob, Stage};
use sqlx::PgPool;
use uuid::Uuid;

/// Open a running job record for a stage execution
pub async fn open(pool: &PgPool, demo_id: Uuid, stage: Stage) -> Result<PipelineJob, sqlx::Error> {
    let now = chrono::Utc::now();

    // A crashed worker can leave a running row behind; supersede it.
    sqlx::query(
        r#"
        UPDATE pipeline_jobs
        SET status = 'failed', error = 'superseded', finished_at = $1
        WHERE demo_id = $2 AND stage = $3 AND status = 'running'
        "#,
    )
    .bind(now)
    .bind(demo_id)
    .bind(stage.as_str())
    .execute(pool)
    .await?;

    let job = PipelineJob {
        id: Uuid::new_v4(),
        demo_id,
        stage,
        status: JobStatus::Running,
        error: None,
        started_at: now,
        finished_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO pipeline_jobs (id, demo_id, stage, status, started_at)
        VALUES ($1, $2, $3, 'running', $4)
        "#,
    )
    .bind(job.id)
    .bind(demo_id)
    .bind(stage.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(job)
}

/// Close a job record as completed
pub async fn complete(pool: &PgPool, job_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_jobs
        SET status = 'completed', finished_at = $1
        WHERE id = $2
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Close a job record as failed with its error text
pub async fn fail(pool: &PgPool, job_id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_jobs
        SET status = 'failed', error = $1, finished_at = $2
        WHERE id = $3
        "#,
    )
    .bind(error)
    .bind(chrono::Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List a demo's job records in execution order
pub async fn list_by_demo(pool: &PgPool, demo_id: Uuid) -> Result<Vec<PipelineJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, demo_id, stage, status, error, started_at, finished_at
        FROM pipeline_jobs
        WHERE demo_id = $1
        ORDER BY started_at ASC
        "#,
    )
    .bind(demo_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Helper Functions
// =============================================================================

fn string_to_stage(s: &str) -> Stage {
    match s {
        "parse" => Stage::Parse,
        "record" => Stage::Record,
        "tts" => Stage::Tts,
        "merge" => Stage::Merge,
        _ => Stage::Parse,
    }
}

fn string_to_status(s: &str) -> JobStatus {
    match s {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Running,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    demo_id: Uuid,
    stage: String,
    status: String,
    error: Option<String>,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<JobRow> for PipelineJob {
    fn from(row: JobRow) -> Self {
        PipelineJob {
            id: row.id,
            demo_id: row.demo_id,
            stage: string_to_stage(&row.stage),
            status: string_to_status(&row.status),
            error: row.error,
            started_at: row.started_at,
            finished_at: row.finished_at,
        }
    }
}
