use std::sync::Arc;
use std::time::Duration;

use crate::{
    completion::{CompletionClient, CompletionRequest},
    config::Config,
    domain::UserId,
    errors::CollaboratorError,
    failure::FailureMonitor,
    formatting::{render_interpretation, split_advice, truncate_text},
    persona::PersonaRegistry,
    session::{Interaction, SessionStore},
    usage::UsageTracker,
};

/// Shown when the message has no text to interpret.
pub const EMPTY_INPUT_PROMPT: &str =
    "Я не вижу текста сна 🌙 Расскажи, что тебе приснилось, и я попробую его истолковать.";

/// Fixed parameters of every completion call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionParams {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 700,
            temperature: 0.8,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CompletionParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_output_tokens: cfg.max_output_tokens,
            temperature: cfg.temperature,
            timeout: cfg.completion_timeout,
        }
    }
}

/// What the transport should send back for one inbound text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundReply {
    Interpretation {
        main: String,
        advice: Option<String>,
    },
    EmptyInput,
    /// Generic reply after a failed completion; never contains error detail.
    Fallback(String),
}

impl OutboundReply {
    /// Split the raw completion text into main + advice segments when possible.
    pub fn interpretation(text: &str) -> Self {
        match split_advice(text) {
            Some(s) => OutboundReply::Interpretation {
                main: s.main.trim().to_string(),
                advice: Some(s.advice.trim().to_string()),
            },
            None => OutboundReply::Interpretation {
                main: text.to_string(),
                advice: None,
            },
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            OutboundReply::Interpretation { main, advice } => {
                render_interpretation(main, advice.as_deref())
            }
            OutboundReply::EmptyInput => EMPTY_INPUT_PROMPT.to_string(),
            OutboundReply::Fallback(text) => crate::formatting::escape_html(text),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, OutboundReply::Fallback(_))
    }
}

/// Turns one inbound text into one reply.
///
/// Owns the process-scoped collaborators; constructed once at startup and
/// shared by every transport handler.
pub struct InteractionHandler {
    sessions: Arc<SessionStore>,
    personas: Arc<PersonaRegistry>,
    completion: Arc<dyn CompletionClient>,
    monitor: Arc<FailureMonitor>,
    usage: Arc<UsageTracker>,
    params: CompletionParams,
}

impl InteractionHandler {
    pub fn new(
        sessions: Arc<SessionStore>,
        personas: Arc<PersonaRegistry>,
        completion: Arc<dyn CompletionClient>,
        monitor: Arc<FailureMonitor>,
        params: CompletionParams,
    ) -> Self {
        Self {
            sessions,
            personas,
            completion,
            monitor,
            usage: Arc::new(UsageTracker::new()),
            params,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    pub fn monitor(&self) -> &FailureMonitor {
        &self.monitor
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub async fn handle(&self, user_id: UserId, message_text: &str) -> OutboundReply {
        let text = message_text.trim();
        if text.is_empty() {
            return OutboundReply::EmptyInput;
        }

        // Held across the completion call: same-user messages run one at a time.
        let mut session = self.sessions.lock(user_id).await;
        let persona = self.personas.resolve(session.active_style());

        let req = CompletionRequest {
            system_prompt: persona.system_prompt.clone(),
            user_text: text.to_string(),
            max_output_tokens: self.params.max_output_tokens,
            temperature: self.params.temperature,
        };

        tracing::debug!(
            user = user_id.0,
            style = %persona.name,
            preview = %truncate_text(text, 40),
            "requesting interpretation"
        );

        let outcome = match tokio::time::timeout(self.params.timeout, self.completion.complete(req))
            .await
        {
            Ok(r) => r,
            Err(_) => Err(CollaboratorError::Timeout(self.params.timeout)),
        };

        match outcome {
            Ok(completion) => {
                if let Some(u) = &completion.usage {
                    tracing::info!(
                        user = user_id.0,
                        prompt_tokens = u.prompt_tokens,
                        completion_tokens = u.completion_tokens,
                        total_tokens = u.total_tokens,
                        "completion usage"
                    );
                    self.usage.record(u).await;
                }

                session.record(Interaction::new(text, &completion.text, &persona.name));
                OutboundReply::interpretation(&completion.text)
            }
            Err(err) => {
                drop(session);
                self.monitor
                    .record_failure(&format!("user {}: {err}", user_id.0))
                    .await;
                OutboundReply::Fallback(self.monitor.pick_fallback())
            }
        }
    }
}
