use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create demos table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS demos (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL,
            description TEXT,
            login_state JSONB,
            status VARCHAR(50) NOT NULL,
            error TEXT,
            artifact_url TEXT,
            duration_seconds DOUBLE PRECISION,
            segments JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create steps table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS steps (
            id UUID PRIMARY KEY,
            demo_id UUID NOT NULL REFERENCES demos(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            title TEXT NOT NULL,
            action VARCHAR(20) NOT NULL,
            selector TEXT,
            value TEXT,
            narration TEXT,
            start_seconds DOUBLE PRECISION,
            end_seconds DOUBLE PRECISION,
            status VARCHAR(20) NOT NULL,
            UNIQUE (demo_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipeline job audit table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_jobs (
            id UUID PRIMARY KEY,
            demo_id UUID NOT NULL REFERENCES demos(id) ON DELETE CASCADE,
            stage VARCHAR(20) NOT NULL,
            status VARCHAR(20) NOT NULL,
            error TEXT,
            started_at TIMESTAMPTZ NOT NULL,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_demos_status ON demos(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_steps_demo_id ON steps(demo_id, position)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_jobs_demo_id ON pipeline_jobs(demo_id, started_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
