//! Generation retry engine: drives the backend until it yields an exact
//! answer count, or attempts run out.
//!
//! Each retry lowers the sampling temperature, narrowing the model's output
//! distribution to make an exact-count structured response more likely.
//! Temperature and attempt state are loop locals passed explicitly, so
//! concurrent segments never share retry state.

use thiserror::Error;

use crate::backend::{BackendError, CompletionRequest, TextBackend};
use crate::normalize::{NormalizeError, normalize};

/// Attempts per segment before giving up.
pub const MAX_ATTEMPTS: u32 = 4;

/// Temperature decrement applied after each failed attempt.
pub const TEMPERATURE_STEP: f32 = 0.3;

/// Temperature never drops below this.
pub const TEMPERATURE_FLOOR: f32 = 0.5;

/// Errors from an exhausted retry loop.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Every attempt produced a parseable response with the wrong number of
    /// answers (or none at all). Carries the final attempt's count so the
    /// operator can judge how far off the backend was.
    #[error("backend produced {got} answers, expected {expected}")]
    AnswerCountMismatch { got: usize, expected: usize },

    /// The final attempt failed at the transport level.
    #[error("generation backend failed")]
    Backend(#[source] BackendError),
}

/// Outcome of the most recent attempt, for diagnosing the final failure.
enum AttemptFailure {
    WrongCount(usize),
    Unparseable(NormalizeError),
    Backend(BackendError),
}

/// Ask the backend for exactly `requested` answers to `segment_text`.
///
/// Runs up to [`MAX_ATTEMPTS`] strictly sequential attempts. The only
/// success path is an exact count; a near miss retries like any other
/// failure. On the final attempt the outgoing prompt gains an explicit
/// count instruction -- a soft nudge, not a guarantee.
pub async fn generate_exact(
    backend: &dyn TextBackend,
    model: &str,
    segment_text: &str,
    requested: usize,
    initial_temperature: f32,
) -> Result<Vec<String>, GenerateError> {
    let mut temperature = initial_temperature;
    let mut last_failure = AttemptFailure::WrongCount(0);

    for attempt in 1..=MAX_ATTEMPTS {
        let prompt = if attempt == MAX_ATTEMPTS && MAX_ATTEMPTS > 1 {
            format!("{segment_text}\n\nReturn exactly {requested} answers.")
        } else {
            segment_text.to_owned()
        };

        let req = CompletionRequest {
            prompt,
            model: model.to_owned(),
            temperature,
        };

        match backend.complete(&req).await {
            Ok(raw) => match normalize(&raw) {
                Ok(answers) if answers.len() == requested => return Ok(answers),
                Ok(answers) => {
                    tracing::warn!(
                        attempt,
                        temperature,
                        got = answers.len(),
                        expected = requested,
                        "answer count mismatch, retrying"
                    );
                    last_failure = AttemptFailure::WrongCount(answers.len());
                }
                Err(e) => {
                    tracing::warn!(attempt, temperature, error = %e, "unparseable response, retrying");
                    last_failure = AttemptFailure::Unparseable(e);
                }
            },
            Err(e) => {
                tracing::warn!(attempt, temperature, error = %e, "backend call failed, retrying");
                last_failure = AttemptFailure::Backend(e);
            }
        }

        temperature = (temperature - TEMPERATURE_STEP).max(TEMPERATURE_FLOOR);
    }

    Err(match last_failure {
        AttemptFailure::WrongCount(got) => GenerateError::AnswerCountMismatch {
            got,
            expected: requested,
        },
        // No answers were parsed out of the final response.
        AttemptFailure::Unparseable(_) => GenerateError::AnswerCountMismatch {
            got: 0,
            expected: requested,
        },
        AttemptFailure::Backend(e) => GenerateError::Backend(e),
    })
}
