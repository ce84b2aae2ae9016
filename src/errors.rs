use http::StatusCode;
use thiserror::Error;

/// Errors surfaced to callers of the request pipeline.
///
/// Refresh failures never appear here: the coordinator absorbs them and the
/// pipeline reports whatever the server said about the request instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 401 on a first attempt that could not be recovered because the refresh failed.
    #[error("request rejected as unauthenticated ({status})")]
    AuthenticationRejected { status: StatusCode },

    /// 401 on a request that was already retried once with a fresh credential.
    #[error("request rejected as unauthenticated after retry ({status})")]
    RetryExhausted { status: StatusCode },

    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl PipelineError {
    /// HTTP status behind this error, if the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PipelineError::AuthenticationRejected { status }
            | PipelineError::RetryExhausted { status }
            | PipelineError::Status { status, .. } => Some(*status),
            PipelineError::Transport(err) => err.status(),
            PipelineError::InvalidUrl { .. } => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            PipelineError::AuthenticationRejected { .. } | PipelineError::RetryExhausted { .. }
        )
    }
}

/// Why a refresh settled as a failure. Logged and counted, never returned to callers.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh endpoint unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("refresh endpoint answered {0}")]
    Status(StatusCode),

    #[error("refresh response is invalid: {0}")]
    InvalidResponse(String),

    #[error("refresh timed out after {0} ms")]
    Timeout(u64),

    #[error("refresh task ended without an outcome")]
    Abandoned,
}

impl RefreshError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RefreshError::Network(_) => "network",
            RefreshError::Status(_) => "status",
            RefreshError::InvalidResponse(_) => "invalid_response",
            RefreshError::Timeout(_) => "timeout",
            RefreshError::Abandoned => "abandoned",
        }
    }
}
