use thiserror::Error;
use vigil_process::{Capability, Lifecycle};

/// Failure talking to the panel API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success response; `message` is the remote's own error text.
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Why an imperative operation did not succeed.
///
/// Holds only strings so results can be fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("permission denied: {0:?}")]
    Forbidden(Capability),
    #[error("{operation} is not available while the target is {status}")]
    Unavailable {
        operation: &'static str,
        status: Lifecycle,
    },
    #[error("another action is already in progress")]
    Busy,
    #[error("target no longer exists")]
    Gone,
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Remote(String),
    #[error("request failed: {0}")]
    Transport(String),
}

impl ActionError {
    /// True when the gateway refused locally and no request was sent.
    pub fn is_refusal(&self) -> bool {
        !matches!(self, ActionError::Remote(_) | ActionError::Transport(_))
    }
}

impl From<ApiError> for ActionError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::Remote { message, .. } => ActionError::Remote(message),
            ApiError::Http(e) => ActionError::Transport(e.to_string()),
            ApiError::Decode(e) => ActionError::Transport(e),
        }
    }
}
