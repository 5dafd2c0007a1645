//! Error taxonomy shared by the backend client, the binding store and the
//! command handlers.

/// Normalized failure of a Devana backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status_code})")]
pub struct BackendError {
    pub message: String,
    pub status_code: u16,
}

impl BackendError {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16()).unwrap_or(500);
        Self::new(err.to_string(), status_code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Missing or conflicting command arguments, with the localized reply
    #[error("validation error: {0}")]
    Validation(String),

    /// Agent, knowledge base or configuration message absent, with the
    /// localized reply
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(BackendError),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Attachment download failed during ingestion
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("channel {0} is already bound")]
    AlreadyBound(String),

    #[error("channel {0} is not bound")]
    NotBound(String),

    #[error("no configuration message in guild {0}")]
    NoConfig(String),
}

impl From<BackendError> for BotError {
    fn from(err: BackendError) -> Self {
        BotError::Backend(err)
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Backend(err.into())
    }
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_carries_status() {
        let err = BotError::from(BackendError::new("Error creating agent.", 500));
        assert_eq!(
            err.to_string(),
            "backend error: Error creating agent. (status 500)"
        );
    }
}
