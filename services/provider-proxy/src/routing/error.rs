use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid provider")]
    InvalidProvider { provider: Option<String> },

    #[error("Invalid upstream URL: {0}")]
    InvalidTarget(String),
}
