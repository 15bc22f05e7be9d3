//! OpenAI adapter (chat completions).
//!
//! Implements the core `CompletionClient` port over `POST {base}/chat/completions`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use intui_core::{
    completion::{Completion, CompletionClient, CompletionRequest, TokenUsage},
    errors::{CollaboratorError, Error},
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn map_err(&self, e: reqwest::Error) -> CollaboratorError {
        if e.is_timeout() {
            CollaboratorError::Timeout(self.timeout)
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    }

    fn body(&self, req: &CompletionRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": req.system_prompt },
                { "role": "user", "content": req.user_text },
            ],
            "max_tokens": req.max_output_tokens,
            "temperature": req.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        req: CompletionRequest,
    ) -> std::result::Result<Completion, CollaboratorError> {
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.body(&req))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let raw = resp.text().await.map_err(|e| self.map_err(e))?;
        let completion = parse_response(&raw)?;
        tracing::debug!(chars = completion.text.chars().count(), "completion received");
        Ok(completion)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Parse a chat-completions body; a missing or blank first choice is malformed.
fn parse_response(raw: &str) -> std::result::Result<Completion, CollaboratorError> {
    let parsed: ChatResponse = serde_json::from_str(raw)
        .map_err(|e| CollaboratorError::Malformed(format!("invalid json: {e}")))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CollaboratorError::Malformed("missing choices[0].message.content".into()))?;

    Ok(Completion {
        text,
        usage: parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}
