use super::API_KEY_HEADER;
use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Shortest credential accepted by the shape check.
pub const MIN_CREDENTIAL_LENGTH: usize = 20;

/// Shape check for caller-supplied credentials.
///
/// Upstream providers do the real authentication; this only turns away
/// requests that could not possibly carry a key.
#[derive(Debug, Clone, Copy)]
pub struct CredentialValidator {
    enabled: bool,
}

impl CredentialValidator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn validate(&self, headers: &HeaderMap) -> bool {
        if !self.enabled {
            return true;
        }

        match extract_credential(headers) {
            Some(credential) => credential.chars().count() >= MIN_CREDENTIAL_LENGTH,
            None => false,
        }
    }
}

/// Bearer token first, then `X-API-Key`.
pub(crate) fn extract_credential(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    })
}
