//! End-to-end generation driver: compiles the template, evaluates segments
//! concurrently under a deadline, combines the results, and persists one
//! render job per combined prompt.
//!
//! Segments have no data dependency on one another, so their retry loops
//! run concurrently; attempts within a segment stay strictly sequential.
//! The combiner acts as the synchronization barrier. A failure in any
//! segment aborts the whole operation -- partial combined output is never
//! emitted.

use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use easel_db::models::Job;

use crate::backend::TextBackend;
use crate::combine::combine;
use crate::generate::{GenerateError, generate_exact};
use crate::state::{JobStateMachine, StateError};
use crate::template::{TemplateError, compile};

/// Soft deadline for the whole multi-segment operation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

/// The `{prompt}` placeholder recognized in segment text.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// A top-level generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Raw `::`-delimited template.
    pub template: String,
    /// The caller's original prompt, substituted for `{prompt}`.
    pub prompt: String,
    /// Model identifier (may carry the `--thinking` suffix).
    pub model: String,
    /// Answer count for segments without an explicit prefix.
    pub default_count: usize,
    /// Temperature for each segment's first attempt.
    pub initial_temperature: f32,
    /// Wall-time budget for the whole operation.
    pub deadline: Duration,
}

impl GenerationRequest {
    pub fn new(
        template: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
        default_count: usize,
    ) -> Self {
        Self {
            template: template.into(),
            prompt: prompt.into(),
            model: model.into(),
            default_count,
            initial_temperature: 1.0,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Errors from a top-level generation run.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),

    #[error("segment {index} failed: {source}")]
    Segment {
        index: usize,
        #[source]
        source: GenerateError,
    },

    #[error("generation deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("generation interrupted by caller")]
    Interrupted,

    #[error(transparent)]
    State(#[from] StateError),
}

/// Produce the final combined prompt strings for a request, without
/// touching the database.
///
/// An empty plan (template of nothing but separators/whitespace) falls
/// back to the caller's original prompt unchanged. Dropping past the
/// deadline cancels the remaining segment futures; no partial results
/// escape.
pub async fn generate_prompts(
    backend: &dyn TextBackend,
    req: &GenerationRequest,
    cancel: &CancellationToken,
) -> Result<Vec<String>, OrchestrateError> {
    let plan = compile(&req.template, req.default_count)?;

    if plan.is_empty() {
        tracing::debug!("template compiled to empty plan, passing prompt through");
        return Ok(vec![req.prompt.clone()]);
    }

    tracing::info!(
        segments = plan.segments.len(),
        explode = plan.explode,
        model = %req.model,
        "starting generation"
    );

    let segment_futures = plan.segments.iter().enumerate().map(|(index, segment)| {
        let text = segment.text.replace(PROMPT_PLACEHOLDER, &req.prompt);
        let count = segment.count;
        async move {
            generate_exact(backend, &req.model, &text, count, req.initial_temperature)
                .await
                .map_err(|source| OrchestrateError::Segment { index, source })
        }
    });

    // try_join_all aborts every sibling on the first segment error; the
    // timeout drops all of them at the deadline.
    let joined = futures::future::try_join_all(segment_futures);
    let results = tokio::select! {
        _ = cancel.cancelled() => return Err(OrchestrateError::Interrupted),
        outcome = tokio::time::timeout(req.deadline, joined) => {
            outcome.map_err(|_| OrchestrateError::DeadlineExceeded(req.deadline))??
        }
    };

    Ok(combine(&plan, &results))
}

/// Run a full generation: produce combined prompts, then enqueue one
/// `queued` render job per prompt. Returns the created jobs in order.
pub async fn run_generation(
    pool: &PgPool,
    backend: &dyn TextBackend,
    req: &GenerationRequest,
    cancel: &CancellationToken,
) -> Result<Vec<Job>, OrchestrateError> {
    let prompts = generate_prompts(backend, req, cancel).await?;

    let mut jobs = Vec::with_capacity(prompts.len());
    for prompt in &prompts {
        let job = JobStateMachine::enqueue(pool, prompt, &req.model).await?;
        jobs.push(job);
    }

    tracing::info!(count = jobs.len(), "generation committed to render queue");
    Ok(jobs)
}
