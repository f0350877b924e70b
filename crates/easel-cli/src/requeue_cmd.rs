//! The `easel requeue` command: operator recovery for failed jobs.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use easel_core::state::JobStateMachine;

pub async fn run_requeue_one(pool: &PgPool, id: Uuid) -> Result<()> {
    JobStateMachine::requeue(pool, id).await?;
    println!("Job {id} requeued.");
    Ok(())
}

pub async fn run_requeue_all(pool: &PgPool) -> Result<()> {
    let count = JobStateMachine::requeue_all_failed(pool).await?;
    println!("Requeued {count} failed job(s).");
    Ok(())
}
