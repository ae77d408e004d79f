//! Demo Repository
//!
//! Handles all database operations related to demos.

use demoreel_core::domain::demo::{Demo, DemoStatus, VideoSegment};
use demoreel_core::dto::demo::CreateDemo;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new demo in `pending` status
pub async fn create(pool: &PgPool, req: CreateDemo) -> Result<Demo, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let demo = Demo {
        id,
        url: req.url.clone(),
        description: req.description.clone(),
        login_state: None,
        status: DemoStatus::Pending,
        error: None,
        artifact_url: None,
        duration_seconds: None,
        segments: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO demos (id, url, description, status, segments, created_at, updated_at)
        VALUES ($1, $2, $3, $4, '[]', $5, $5)
        "#,
    )
    .bind(id)
    .bind(&req.url)
    .bind(&req.description)
    .bind(status_to_string(DemoStatus::Pending))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(demo)
}

/// Find a demo by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Demo>, sqlx::Error> {
    let row = sqlx::query_as::<_, DemoRow>(
        r#"
        SELECT id, url, description, login_state, status, error, artifact_url,
               duration_seconds, segments, created_at, updated_at
        FROM demos
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all demos, newest first
pub async fn list_all(pool: &PgPool) -> Result<Vec<Demo>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DemoRow>(
        r#"
        SELECT id, url, description, login_state, status, error, artifact_url,
               duration_seconds, segments, created_at, updated_at
        FROM demos
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Update demo status and user-visible error text.
/// Returns false if the demo row is gone (orphaned write, tolerated).
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: DemoStatus,
    error: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE demos
        SET status = $1, error = $2, updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(status_to_string(status))
    .bind(error)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Store the login state captured from an interactive session
pub async fn set_login_state(
    pool: &PgPool,
    id: Uuid,
    login_state: &serde_json::Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE demos
        SET login_state = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(login_state)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Append one record run's video segment
pub async fn append_segment(
    pool: &PgPool,
    id: Uuid,
    segment: &VideoSegment,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE demos
        SET segments = segments || $1::jsonb, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(serde_json::json!([segment]))
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write the final artifact location and total duration
pub async fn set_artifact(
    pool: &PgPool,
    id: Uuid,
    artifact_url: &str,
    duration_seconds: f64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE demos
        SET artifact_url = $1, duration_seconds = $2, updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(artifact_url)
    .bind(duration_seconds)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn status_to_string(status: DemoStatus) -> &'static str {
    match status {
        DemoStatus::Pending => "pending",
        DemoStatus::Parsing => "parsing",
        DemoStatus::Review => "review",
        DemoStatus::Recording => "recording",
        DemoStatus::Processing => "processing",
        DemoStatus::Completed => "completed",
        DemoStatus::Paused => "paused",
        DemoStatus::Failed => "failed",
    }
}

pub fn string_to_status(s: &str) -> DemoStatus {
    match s {
        "pending" => DemoStatus::Pending,
        "parsing" => DemoStatus::Parsing,
        "review" => DemoStatus::Review,
        "recording" => DemoStatus::Recording,
        "processing" => DemoStatus::Processing,
        "completed" => DemoStatus::Completed,
        "paused" => DemoStatus::Paused,
        "failed" => DemoStatus::Failed,
        _ => DemoStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DemoRow {
    id: Uuid,
    url: String,
    description: Option<String>,
    login_state: Option<serde_json::Value>,
    status: String,
    error: Option<String>,
    artifact_url: Option<String>,
    duration_seconds: Option<f64>,
    segments: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DemoRow> for Demo {
    fn from(row: DemoRow) -> Self {
        let segments: Vec<VideoSegment> =
            serde_json::from_value(row.segments).unwrap_or_default();

        Demo {
            id: row.id,
            url: row.url,
            description: row.description,
            login_state: row.login_state,
            status: string_to_status(&row.status),
            error: row.error,
            artifact_url: row.artifact_url,
            duration_seconds: row.duration_seconds,
            segments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            DemoStatus::Pending,
            DemoStatus::Parsing,
            DemoStatus::Review,
            DemoStatus::Recording,
            DemoStatus::Processing,
            DemoStatus::Completed,
            DemoStatus::Paused,
            DemoStatus::Failed,
        ] {
            assert_eq!(string_to_status(status_to_string(status)), status);
        }
    }
}
