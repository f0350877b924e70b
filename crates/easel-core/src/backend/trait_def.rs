//! The `TextBackend` trait -- the adapter interface for generation backends.
//!
//! The trait is intentionally object-safe so it can be passed around as
//! `&dyn TextBackend` / `Box<dyn TextBackend>`; the retry engine and
//! orchestrator never know which concrete backend they are driving.

use async_trait::async_trait;

use super::BackendError;

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Full prompt text, placeholders already substituted.
    pub prompt: String,
    /// User-facing model identifier (may carry the `--thinking` suffix;
    /// adapters strip it at the wire boundary).
    pub model: String,
    /// Sampling temperature for this attempt.
    pub temperature: f32,
}

/// Adapter interface for synchronous request/response text generation.
///
/// Implementors wrap a specific transport (HTTP chat completions, a local
/// process, a test stub) and return the raw completion text; parsing is the
/// normalizer's job.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Human-readable name for this backend (e.g. "openai-chat").
    fn name(&self) -> &str;

    /// Execute one completion request, blocking until the backend answers
    /// or the transport times out.
    async fn complete(&self, req: &CompletionRequest) -> Result<String, BackendError>;
}

// Compile-time assertion: TextBackend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TextBackend) {}
};
