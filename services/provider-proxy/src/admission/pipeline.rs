use std::net::IpAddr;
use std::sync::Arc;

use http::header::ORIGIN;
use http::{HeaderMap, Method};
use tracing::debug;

use super::{AdmissionError, CredentialValidator, OriginValidator};
use crate::config::ProxyConfig;
use crate::limiter::RateLimiter;

/// Outcome of a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// CORS preflight, answered without touching any other stage
    Preflight,
    /// All checks passed for this client identity
    Admitted { identity: String },
}

/// Ordered gate every proxied request goes through:
/// preflight, rate limit, origin, credential.
pub struct AdmissionPipeline {
    limiter: Arc<dyn RateLimiter>,
    origins: OriginValidator,
    credentials: CredentialValidator,
    identity_header: Option<String>,
}

impl AdmissionPipeline {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        origins: OriginValidator,
        credentials: CredentialValidator,
        identity_header: Option<String>,
    ) -> Self {
        Self {
            limiter,
            origins,
            credentials,
            identity_header,
        }
    }

    pub fn from_config(config: &ProxyConfig, limiter: Arc<dyn RateLimiter>) -> Self {
        Self::new(
            limiter,
            OriginValidator::new(config.allowed_origins.clone()),
            CredentialValidator::new(config.api_key_validation),
            config.rate_limit_key_header.clone(),
        )
    }

    pub fn origins(&self) -> &OriginValidator {
        &self.origins
    }

    pub fn identity_for(&self, headers: &HeaderMap, peer_ip: Option<IpAddr>) -> String {
        client_identity(headers, peer_ip, self.identity_header.as_deref())
    }

    pub fn admit(
        &self,
        method: &Method,
        headers: &HeaderMap,
        peer_ip: Option<IpAddr>,
    ) -> Result<Admission, AdmissionError> {
        if *method == Method::OPTIONS {
            debug!("preflight request short-circuited");
            return Ok(Admission::Preflight);
        }

        let identity = self.identity_for(headers, peer_ip);
        self.limiter.consume(&identity)?;

        let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
        if !self.origins.validate(origin) {
            return Err(AdmissionError::OriginRejected {
                origin: origin.map(str::to_string),
            });
        }

        if !self.credentials.validate(headers) {
            return Err(AdmissionError::InvalidCredential);
        }

        Ok(Admission::Admitted { identity })
    }
}

/// Rate-limit partition key: the configured identity header when present,
/// otherwise the peer address.
pub fn client_identity(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    identity_header: Option<&str>,
) -> String {
    identity_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer_ip.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
