//! The `easel status` command: queue depth by render status.

use anyhow::Result;
use sqlx::PgPool;

use easel_core::state::JobStateMachine;

pub async fn run_status(pool: &PgPool) -> Result<()> {
    let depth = JobStateMachine::queue_depth(pool).await?;

    println!("Render queue:");
    println!("  queued:      {}", depth.queued);
    println!("  rendering:   {}", depth.rendering);
    println!("  in_progress: {}", depth.in_progress);
    println!("  done:        {}", depth.done);
    println!("  failed:      {}", depth.failed);
    println!("  total:       {}", depth.total);

    Ok(())
}
