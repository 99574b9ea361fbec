use crate::limiter::RateLimitExceeded;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error("Origin not allowed: {}", .origin.as_deref().unwrap_or("<none>"))]
    OriginRejected { origin: Option<String> },

    #[error("Missing or invalid API key")]
    InvalidCredential,
}
