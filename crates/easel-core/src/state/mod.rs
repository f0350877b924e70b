//! Job lifecycle state machine.
//!
//! Validates and executes render-status transitions for persisted jobs,
//! enforcing the allowed transition graph with optimistic locking. The
//! machine never retries on its own; all failure recovery is the
//! operator-initiated `failed -> queued` requeue.

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use easel_db::models::{Job, RenderStatus};
use easel_db::queries::jobs as db;

pub use easel_db::queries::jobs::QueueDepth;

/// Errors from job lifecycle operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("invalid render status transition: {from} -> {to} for job {id}")]
    InvalidTransition {
        id: Uuid,
        from: RenderStatus,
        to: RenderStatus,
    },

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// The job state machine.
///
/// Enforces the valid transition graph:
///
/// ```text
/// queued      -> rendering | in_progress
/// rendering   -> in_progress
/// queued      -> done | failed
/// rendering   -> done | failed
/// in_progress -> done | failed
/// failed      -> queued  (operator requeue)
/// ```
///
/// `done` is terminal and its artifact reference is immutable.
pub struct JobStateMachine;

impl JobStateMachine {
    /// Check whether a transition from `from` to `to` is a valid edge in
    /// the state graph.
    pub fn is_valid_transition(from: RenderStatus, to: RenderStatus) -> bool {
        use easel_db::models::RenderStatus::*;
        matches!(
            (from, to),
            (Queued, Rendering)
                | (Queued, InProgress)
                | (Rendering, InProgress)
                | (Queued, Done)
                | (Rendering, Done)
                | (InProgress, Done)
                | (Queued, Failed)
                | (Rendering, Failed)
                | (InProgress, Failed)
                | (Failed, Queued)
        )
    }

    /// Create a job in `queued` status with no artifact reference.
    pub async fn enqueue(pool: &PgPool, prompt: &str, model: &str) -> Result<Job, StateError> {
        let job = db::insert_job(pool, prompt, model).await?;
        tracing::info!(job_id = %job.id, model = %job.model, "job enqueued");
        Ok(job)
    }

    /// The oldest `queued` jobs, up to `batch`.
    ///
    /// Read-only: claiming does not mark the rows, so two workers polling
    /// concurrently can observe the same job. The worker is expected to
    /// call [`Self::mark_rendering`] when it begins; a lost race there
    /// surfaces as [`StateError::InvalidTransition`], never a corrupted row.
    pub async fn claim_next(pool: &PgPool, batch: i64) -> Result<Vec<Job>, StateError> {
        Ok(db::list_queued_oldest(pool, batch).await?)
    }

    /// Worker advance: `queued -> rendering`.
    pub async fn mark_rendering(pool: &PgPool, id: Uuid) -> Result<(), StateError> {
        Self::transition(pool, id, RenderStatus::Queued, RenderStatus::Rendering).await
    }

    /// Worker advance: `queued | rendering -> in_progress`.
    pub async fn mark_in_progress(pool: &PgPool, id: Uuid) -> Result<(), StateError> {
        let job = Self::get(pool, id).await?;
        Self::transition(pool, id, job.render_status, RenderStatus::InProgress).await
    }

    /// Transition to `done` and attach the artifact reference.
    ///
    /// Idempotent: completing a job already `done` with the same artifact
    /// is a no-op. A different artifact on a `done` job is rejected -- the
    /// reference is immutable once set.
    pub async fn complete_with_artifact(
        pool: &PgPool,
        id: Uuid,
        artifact_ref: &str,
    ) -> Result<(), StateError> {
        let rows = db::set_done_with_artifact(pool, id, artifact_ref).await?;
        if rows == 0 {
            let job = Self::get(pool, id).await?;
            if job.render_status == RenderStatus::Done
                && job.artifact_ref.as_deref() == Some(artifact_ref)
            {
                return Ok(());
            }
            return Err(StateError::InvalidTransition {
                id,
                from: job.render_status,
                to: RenderStatus::Done,
            });
        }
        tracing::info!(job_id = %id, artifact = artifact_ref, "job completed");
        Ok(())
    }

    /// Transition to `failed` from any non-terminal status.
    pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<(), StateError> {
        let rows = db::set_failed(pool, id).await?;
        if rows == 0 {
            let job = Self::get(pool, id).await?;
            return Err(StateError::InvalidTransition {
                id,
                from: job.render_status,
                to: RenderStatus::Failed,
            });
        }
        tracing::warn!(job_id = %id, "job marked failed");
        Ok(())
    }

    /// Operator requeue: `failed -> queued`, clearing the artifact
    /// reference and completion timestamp.
    pub async fn requeue(pool: &PgPool, id: Uuid) -> Result<(), StateError> {
        let rows = db::requeue_failed(pool, id).await?;
        if rows == 0 {
            let job = Self::get(pool, id).await?;
            return Err(StateError::InvalidTransition {
                id,
                from: job.render_status,
                to: RenderStatus::Queued,
            });
        }
        tracing::info!(job_id = %id, "job requeued");
        Ok(())
    }

    /// Requeue every `failed` job. Returns the number requeued.
    pub async fn requeue_all_failed(pool: &PgPool) -> Result<u64, StateError> {
        let count = db::requeue_all_failed(pool).await?;
        tracing::info!(count, "requeued all failed jobs");
        Ok(count)
    }

    /// Count jobs with the given status.
    pub async fn count(pool: &PgPool, status: RenderStatus) -> Result<i64, StateError> {
        Ok(db::count_by_status(pool, status).await?)
    }

    /// Job counts by status, for queue-depth display.
    pub async fn queue_depth(pool: &PgPool) -> Result<QueueDepth, StateError> {
        Ok(db::get_queue_depth(pool).await?)
    }

    /// Operator override: move a job to an arbitrary status, subject to the
    /// transition graph. Setting the current status again is a no-op.
    ///
    /// Completion is excluded -- `done` requires an artifact reference and
    /// must go through [`Self::complete_with_artifact`].
    pub async fn set_status(pool: &PgPool, id: Uuid, to: RenderStatus) -> Result<(), StateError> {
        let job = Self::get(pool, id).await?;
        let from = job.render_status;
        if from == to {
            return Ok(());
        }
        match to {
            RenderStatus::Queued => Self::requeue(pool, id).await,
            RenderStatus::Failed => Self::mark_failed(pool, id).await,
            RenderStatus::Rendering | RenderStatus::InProgress => {
                Self::transition(pool, id, from, to).await
            }
            RenderStatus::Done => Err(StateError::InvalidTransition { id, from, to }),
        }
    }

    /// Execute a plain status transition with optimistic locking.
    async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: RenderStatus,
        to: RenderStatus,
    ) -> Result<(), StateError> {
        if !Self::is_valid_transition(from, to) {
            return Err(StateError::InvalidTransition { id, from, to });
        }

        let rows = db::transition_status(pool, id, from, to).await?;
        if rows == 0 {
            // Either the job does not exist or another writer moved it first.
            let job = Self::get(pool, id).await?;
            return Err(StateError::InvalidTransition {
                id,
                from: job.render_status,
                to,
            });
        }
        Ok(())
    }

    async fn get(pool: &PgPool, id: Uuid) -> Result<Job, StateError> {
        db::get_job(pool, id)
            .await?
            .ok_or(StateError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_db::models::RenderStatus::*;

    #[test]
    fn worker_advance_edges_valid() {
        assert!(JobStateMachine::is_valid_transition(Queued, Rendering));
        assert!(JobStateMachine::is_valid_transition(Queued, InProgress));
        assert!(JobStateMachine::is_valid_transition(Rendering, InProgress));
        assert!(JobStateMachine::is_valid_transition(InProgress, Done));
        assert!(JobStateMachine::is_valid_transition(Rendering, Failed));
    }

    #[test]
    fn requeue_is_the_only_backward_edge() {
        assert!(JobStateMachine::is_valid_transition(Failed, Queued));
        assert!(!JobStateMachine::is_valid_transition(Done, Queued));
        assert!(!JobStateMachine::is_valid_transition(Rendering, Queued));
        assert!(!JobStateMachine::is_valid_transition(InProgress, Queued));
    }

    #[test]
    fn terminal_states_have_no_forward_edges() {
        for to in [Queued, Rendering, InProgress, Failed] {
            assert!(!JobStateMachine::is_valid_transition(Done, to));
        }
        for to in [Rendering, InProgress, Done] {
            assert!(!JobStateMachine::is_valid_transition(Failed, to));
        }
    }

    #[test]
    fn no_self_transitions() {
        for s in [Queued, Rendering, InProgress, Done, Failed] {
            assert!(!JobStateMachine::is_valid_transition(s, s));
        }
    }
}
