//! The generation-backend seam.
//!
//! [`TextBackend`] is the adapter interface the retry engine drives; the
//! concrete [`openai::OpenAiBackend`] speaks the OpenAI-compatible chat
//! completions protocol over HTTP. Tests substitute stub implementations.

pub mod openai;
pub mod trait_def;

use thiserror::Error;

pub use trait_def::{CompletionRequest, TextBackend};

/// Model-identifier suffix that requests extended reasoning.
pub const THINKING_SUFFIX: &str = "--thinking";

/// Errors from the generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connect, timeout, TLS, ...).
    #[error("backend unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response parsed but carried no completion text.
    #[error("backend response contained no completion content")]
    MissingContent,
}

/// A model identifier after boundary transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Identifier as transmitted to the backend.
    pub id: String,
    /// Whether the request should ask for extended reasoning.
    pub thinking: bool,
}

/// Split a user-facing model identifier into the wire identifier and the
/// reasoning flag. A `--thinking` suffix is stripped and becomes the flag;
/// everything else passes through untouched.
pub fn parse_model_spec(model: &str) -> ModelSpec {
    match model.strip_suffix(THINKING_SUFFIX) {
        Some(base) => ModelSpec {
            id: base.to_owned(),
            thinking: true,
        },
        None => ModelSpec {
            id: model.to_owned(),
            thinking: false,
        },
    }
}
