use std::time::Duration;

/// Failure of the completion collaborator.
///
/// Always recovered by the interaction handler: it turns into a fallback reply
/// plus a notification, never into a crash.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion transport error: {0}")]
    Transport(String),

    #[error("completion returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot core can
/// handle failures consistently (fatal at startup vs recovered per message).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
