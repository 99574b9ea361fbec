mod credential;
mod error;
mod origin;
mod pipeline;

pub use credential::{CredentialValidator, MIN_CREDENTIAL_LENGTH};
pub use error::AdmissionError;
pub use origin::OriginValidator;
pub use pipeline::{client_identity, Admission, AdmissionPipeline};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-API-Key, X-Request-ID";
pub const CORS_MAX_AGE_SECS: &str = "86400";
