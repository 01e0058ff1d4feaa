use thiserror::Error;

/// Failure of a hosted LLM call, split by what the caller can do about it.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM provider rejected the credentials")]
    Unauthorized,
    #[error("LLM provider rate limit exceeded")]
    RateLimited,
    #[error("LLM provider returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("LLM response contained no choices")]
    EmptyResponse,
    #[error("LLM response could not be parsed: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Unauthorized,
            408 => LlmError::Timeout,
            429 => LlmError::RateLimited,
            _ => LlmError::Upstream { status, body },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Timeout => "timeout",
            LlmError::Unauthorized => "unauthorized",
            LlmError::RateLimited => "rate_limited",
            LlmError::Upstream { .. } => "upstream",
            LlmError::Transport(_) => "transport",
            LlmError::EmptyResponse => "empty_response",
            LlmError::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}
