use bytes::Bytes;
use chrono::Utc;
use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderValue, Method, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::admission::AdmissionError;
use crate::config::Environment;
use crate::routing::RoutingError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Body too large: exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Route not found: {method} {path}")]
    NotFound { method: Method, path: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
    pub request_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Admission(AdmissionError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Admission(AdmissionError::OriginRejected { .. }) => StatusCode::FORBIDDEN,
            ProxyError::Admission(AdmissionError::InvalidCredential) => StatusCode::UNAUTHORIZED,
            ProxyError::Routing(_) | ProxyError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Admission(AdmissionError::RateLimited(_)) => "RATE_LIMIT_EXCEEDED",
            ProxyError::Admission(AdmissionError::OriginRejected { .. }) => "CORS_ERROR",
            ProxyError::Admission(AdmissionError::InvalidCredential) => "AUTHENTICATION_ERROR",
            ProxyError::Routing(_) | ProxyError::InvalidBody(_) => "VALIDATION_ERROR",
            ProxyError::BodyTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ProxyError::Upstream(_) => "PROXY_ERROR",
            ProxyError::NotFound { .. } => "NOT_FOUND",
            ProxyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show any client. Upstream and internal failures keep
    /// their cause for `details`, which only development mode renders.
    pub fn client_message(&self) -> String {
        match self {
            ProxyError::Admission(AdmissionError::RateLimited(_)) => {
                "Too many requests, please try again later".to_string()
            }
            ProxyError::Admission(AdmissionError::OriginRejected { .. }) => {
                "Origin not allowed by CORS policy".to_string()
            }
            ProxyError::Admission(AdmissionError::InvalidCredential) => {
                "Missing or invalid API key".to_string()
            }
            ProxyError::Routing(RoutingError::InvalidProvider { .. }) => {
                "Invalid provider".to_string()
            }
            ProxyError::Routing(e) => e.to_string(),
            ProxyError::InvalidBody(_) => "Request body must be valid JSON".to_string(),
            ProxyError::BodyTooLarge { limit } => {
                format!("Request body exceeds limit of {} bytes", limit)
            }
            ProxyError::Upstream(_) => "Failed to reach upstream provider".to_string(),
            ProxyError::NotFound { method, path } => {
                format!("Route {} {} not found", method, path)
            }
            ProxyError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Diagnostic detail, rendered in development only.
    fn details(&self, environment: Environment) -> Option<Value> {
        if !environment.is_development() {
            return None;
        }

        match self {
            ProxyError::Admission(AdmissionError::RateLimited(limit)) => Some(json!({
                "retryAfterSecs": limit.retry_after_secs(),
                "cause": self.to_string(),
            })),
            _ => Some(json!({ "cause": self.to_string() })),
        }
    }

    pub fn envelope(&self, request_id: &str, environment: Environment) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                message: self.client_message(),
                code: self.code(),
                request_id: request_id.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                details: self.details(environment),
            },
        }
    }

    pub fn to_response(&self, request_id: &str, environment: Environment) -> Response<Full<Bytes>> {
        let envelope = self.envelope(request_id, environment);
        let body = serde_json::to_vec(&envelope).unwrap_or_default();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let ProxyError::Admission(AdmissionError::RateLimited(limit)) = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(limit.retry_after_secs()));
        }

        response
    }

    /// Development-only diagnostic. The request's audit record is the log
    /// line that carries the error in every environment.
    pub fn report(&self, request_id: &str, method: &Method, path: &str, environment: Environment) {
        if !environment.is_development() {
            return;
        }

        debug!(
            request_id,
            %method,
            path,
            status = self.status().as_u16(),
            code = self.code(),
            diagnostic = ?self,
            "request error diagnostic"
        );
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        // The target URL may carry a query-string credential
        let err = err.without_url();
        if err.is_timeout() {
            ProxyError::Upstream(format!("upstream timed out: {}", err))
        } else if err.is_connect() {
            ProxyError::Upstream(format!("upstream unreachable: {}", err))
        } else {
            ProxyError::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimitExceeded;
    use http_body_util::BodyExt;
    use std::time::Duration;

    fn rate_limited() -> ProxyError {
        ProxyError::Admission(AdmissionError::RateLimited(RateLimitExceeded {
            capacity: 100,
            window_secs: 60,
            retry_after: Duration::from_secs(12),
        }))
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_taxonomy_mapping() {
        let cases: Vec<(ProxyError, u16, &str)> = vec![
            (rate_limited(), 429, "RATE_LIMIT_EXCEEDED"),
            (
                AdmissionError::OriginRejected { origin: None }.into(),
                403,
                "CORS_ERROR",
            ),
            (
                AdmissionError::InvalidCredential.into(),
                401,
                "AUTHENTICATION_ERROR",
            ),
            (
                RoutingError::UnknownProvider("x".to_string()).into(),
                400,
                "VALIDATION_ERROR",
            ),
            (ProxyError::Upstream("refused".to_string()), 502, "PROXY_ERROR"),
            (
                ProxyError::NotFound {
                    method: Method::GET,
                    path: "/x".to_string(),
                },
                404,
                "NOT_FOUND",
            ),
            (ProxyError::Internal("boom".to_string()), 500, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "{}", err);
            assert_eq!(err.code(), code);
        }
    }

    #[tokio::test]
    async fn test_production_envelope_hides_cause() {
        let err = ProxyError::Upstream("connect error: 10.0.0.3:443 refused".to_string());
        let response = err.to_response("req-9", Environment::Production);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "PROXY_ERROR");
        assert_eq!(body["error"]["requestId"], "req-9");
        assert!(body["error"]["timestamp"].is_string());
        assert!(body["error"].get("details").is_none());
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_development_envelope_carries_cause() {
        let err = ProxyError::Upstream("connect error".to_string());
        let body = body_json(err.to_response("req-1", Environment::Development)).await;

        assert_eq!(
            body["error"]["details"]["cause"],
            "Upstream request failed: connect error"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_response_has_retry_after() {
        let response = rate_limited().to_response("req-2", Environment::Production);
        assert_eq!(response.headers()[RETRY_AFTER], "12");

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_development_rate_limit_details_include_backoff() {
        let response = rate_limited().to_response("req-3", Environment::Development);
        assert_eq!(response.headers()[RETRY_AFTER], "12");

        let body = body_json(response).await;
        assert_eq!(body["error"]["details"]["retryAfterSecs"], 12);
        assert!(body["error"]["details"]["cause"].is_string());
    }
}
