use reqwest::StatusCode;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum KaldraError {
    /// Request rejected before any network attempt.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Attempt did not complete within the configured timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Success status with a body that is not the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Every attempt failed; carries the failure of the final attempt.
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        attempts: usize,
        last: Box<KaldraError>,
    },
    /// Invalid environment or base URL configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl KaldraError {
    /// Returns `true` for failures the dashboard treats as "service unavailable":
    /// `503`, timeouts, transport failures and exhausted retries over any of those.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            Self::MaxRetriesExceeded { last, .. } => last.is_unavailable(),
            Self::InvalidInput(_) | Self::Decode(_) | Self::Config(_) => false,
        }
    }

    /// Whether a failed attempt may be retried.
    pub(crate) fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidInput(_) | Self::Config(_) | Self::MaxRetriesExceeded { .. }
        )
    }
}
