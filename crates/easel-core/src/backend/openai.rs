//! OpenAI-compatible chat completions adapter.
//!
//! Speaks `POST {base_url}/chat/completions` with bearer auth. Generation
//! calls are slow; the client timeout defaults to 240 seconds.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::trait_def::{CompletionRequest, TextBackend};
use super::{BackendError, parse_model_spec};

/// Default per-request timeout. Image-prompt generation regularly runs for
/// minutes on reasoning models.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

/// HTTP backend for OpenAI-compatible chat completion APIs.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Build a backend from `EASEL_BACKEND_URL` and `EASEL_BACKEND_API_KEY`.
    pub fn from_env() -> Result<Self, BackendError> {
        let base_url = std::env::var("EASEL_BACKEND_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_owned());
        let api_key = std::env::var("EASEL_BACKEND_API_KEY").unwrap_or_default();
        Self::with_config(base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Build a backend with explicit configuration.
    pub fn with_config(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai-chat"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<String, BackendError> {
        // `--thinking` is a user-facing convention; the wire request carries
        // the bare model id plus a reasoning-effort flag instead.
        let spec = parse_model_spec(&req.model);
        let body = ChatCompletionBody {
            model: &spec.id,
            temperature: req.temperature,
            messages: vec![MessageBody {
                role: "user",
                content: &req.prompt,
            }],
            reasoning_effort: spec.thinking.then_some("high"),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(BackendError::MissingContent)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<MessageBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_omits_reasoning_for_plain_models() {
        let body = ChatCompletionBody {
            model: "gpt-image",
            temperature: 1.0,
            messages: vec![MessageBody {
                role: "user",
                content: "hello",
            }],
            reasoning_effort: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("reasoning_effort").is_none());
        assert_eq!(json["model"], "gpt-image");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn body_sets_reasoning_for_thinking_models() {
        let spec = parse_model_spec("gpt-image--thinking");
        let body = ChatCompletionBody {
            model: &spec.id,
            temperature: 0.7,
            messages: vec![],
            reasoning_effort: spec.thinking.then_some("high"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-image");
        assert_eq!(json["reasoning_effort"], "high");
    }

    #[test]
    fn response_parses_with_missing_content() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let backend =
            OpenAiBackend::with_config("http://localhost:8080/v1/", "key", DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(backend.base_url, "http://localhost:8080/v1");
    }
}
