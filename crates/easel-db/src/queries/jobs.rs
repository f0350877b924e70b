//! Database query functions for the `jobs` table.
//!
//! Status updates use optimistic locking: every UPDATE's WHERE clause pins
//! the expected current status, so a concurrent writer that got there first
//! makes the row count come back 0 instead of clobbering state.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Job, RenderStatus};

/// Insert a new job row in `queued` status. Returns the inserted job with
/// server-generated defaults (id, timestamps).
pub async fn insert_job(pool: &PgPool, prompt: &str, model: &str) -> Result<Job> {
    let job = sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (prompt, model) VALUES ($1, $2) RETURNING *",
    )
    .bind(prompt)
    .bind(model)
    .fetch_one(pool)
    .await
    .context("failed to insert job")?;

    Ok(job)
}

/// Fetch a single job by ID.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch job")?;

    Ok(job)
}

/// The oldest `queued` jobs, up to `limit`.
///
/// This is the worker claim query. It is read-only: it does not mark the
/// rows, so two workers polling at the same time can observe the same job.
pub async fn list_queued_oldest(pool: &PgPool, limit: i64) -> Result<Vec<Job>> {
    let jobs = sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs \
         WHERE render_status = 'queued' \
         ORDER BY created_at ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list queued jobs")?;

    Ok(jobs)
}

/// The most recent `queued` jobs, up to `limit`. Used by the polling API.
pub async fn list_queued_recent(pool: &PgPool, limit: i64) -> Result<Vec<Job>> {
    let jobs = sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs \
         WHERE render_status = 'queued' \
         ORDER BY created_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list queued jobs")?;

    Ok(jobs)
}

// -----------------------------------------------------------------------
// State-machine queries
// -----------------------------------------------------------------------

/// Atomically transition a job from one status to another.
///
/// Returns the number of rows affected (0 means the current status did not
/// match `from`, or the job does not exist).
pub async fn transition_status(
    pool: &PgPool,
    id: Uuid,
    from: RenderStatus,
    to: RenderStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET render_status = $1, updated_at = NOW() \
         WHERE id = $2 AND render_status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition job status")?;

    Ok(result.rows_affected())
}

/// Atomically complete a job: set `done`, attach the artifact reference,
/// and stamp `completed_at`. Only fires while the job is in a non-terminal
/// status.
pub async fn set_done_with_artifact(pool: &PgPool, id: Uuid, artifact_ref: &str) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET render_status = 'done', \
             artifact_ref = $1, \
             completed_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $2 \
           AND render_status IN ('queued', 'rendering', 'in_progress')",
    )
    .bind(artifact_ref)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to complete job")?;

    Ok(result.rows_affected())
}

/// Atomically mark a job `failed` from any non-terminal status, stamping
/// `completed_at`.
pub async fn set_failed(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET render_status = 'failed', \
             completed_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 \
           AND render_status IN ('queued', 'rendering', 'in_progress')",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark job failed")?;

    Ok(result.rows_affected())
}

/// Atomically requeue a single `failed` job, clearing the artifact
/// reference and completion timestamp.
pub async fn requeue_failed(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET render_status = 'queued', \
             artifact_ref = NULL, \
             completed_at = NULL, \
             updated_at = NOW() \
         WHERE id = $1 AND render_status = 'failed'",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to requeue job")?;

    Ok(result.rows_affected())
}

/// Requeue every `failed` job. Returns the number of jobs requeued.
///
/// This is the operator bulk-recovery path after a backend outage.
pub async fn requeue_all_failed(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET render_status = 'queued', \
             artifact_ref = NULL, \
             completed_at = NULL, \
             updated_at = NOW() \
         WHERE render_status = 'failed'",
    )
    .execute(pool)
    .await
    .context("failed to requeue failed jobs")?;

    Ok(result.rows_affected())
}

/// Count jobs with the given status.
pub async fn count_by_status(pool: &PgPool, status: RenderStatus) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE render_status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
        .context("failed to count jobs by status")?;

    Ok(row.0)
}

/// Job counts by status.
#[derive(Debug, Clone, Default)]
pub struct QueueDepth {
    pub queued: i64,
    pub rendering: i64,
    pub in_progress: i64,
    pub done: i64,
    pub failed: i64,
    pub total: i64,
}

/// Get a summary of job counts by status.
pub async fn get_queue_depth(pool: &PgPool) -> Result<QueueDepth> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT render_status::text, COUNT(*) as cnt \
         FROM jobs \
         GROUP BY render_status",
    )
    .fetch_all(pool)
    .await
    .context("failed to get queue depth")?;

    let mut depth = QueueDepth::default();
    for (status, count) in &rows {
        match status.as_str() {
            "queued" => depth.queued = *count,
            "rendering" => depth.rendering = *count,
            "in_progress" => depth.in_progress = *count,
            "done" => depth.done = *count,
            "failed" => depth.failed = *count,
            _ => {}
        }
        depth.total += count;
    }
    Ok(depth)
}
