use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;

/// Normalized request for a single, stateless completion call.
///
/// No prior history is sent: each call carries only the persona prompt and
/// the user's text.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Port for the completion API (OpenAI-compatible HTTP today).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        req: CompletionRequest,
    ) -> std::result::Result<Completion, CollaboratorError>;
}
