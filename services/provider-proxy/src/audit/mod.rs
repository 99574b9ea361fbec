use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::USER_AGENT;
use http::{HeaderMap, Method, Uri};
use serde::Serialize;
use tracing::{error, info, warn};

/// Headers that never reach a log line, whatever the configuration says.
pub const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "x-api-key",
    "cookie",
    "set-cookie",
];

/// Query parameters whose values are credentials (Gemini-style `?key=`).
pub const REDACTED_QUERY_PARAMS: &[&str] = &["key", "api_key", "apikey", "access_token", "token"];

const REDACTED_VALUE: &str = "[REDACTED]";

/// One record per handled request, success or failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAuditRecord {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub client_identity: String,
    pub user_agent: Option<String>,
    pub status_code: u16,
    pub response_time_ms: u64,
    /// Taxonomy code of a failed request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    sanitized_headers: BTreeMap<String, String>,
}

impl RequestAuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: &str,
        timestamp: DateTime<Utc>,
        method: &Method,
        uri: &Uri,
        client_identity: &str,
        headers: &HeaderMap,
        status_code: u16,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            timestamp,
            method: method.to_string(),
            url: redact_query_credentials(&uri.to_string()),
            client_identity: client_identity.to_string(),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            status_code,
            response_time_ms: elapsed.as_millis() as u64,
            error_code: None,
            error: None,
            sanitized_headers: sanitize_headers(headers),
        }
    }

    pub fn sanitized_headers(&self) -> &BTreeMap<String, String> {
        &self.sanitized_headers
    }

    pub fn with_error(mut self, code: &'static str, message: impl Into<String>) -> Self {
        self.error_code = Some(code);
        self.error = Some(message.into());
        self
    }

    fn headers_json(&self) -> String {
        serde_json::to_string(&self.sanitized_headers).unwrap_or_default()
    }

    pub fn is_failure(&self) -> bool {
        self.error_code.is_some()
    }

    /// Single log line for the request: error for 5xx, warn for other
    /// failures, info otherwise.
    pub fn emit(&self) {
        macro_rules! audit_event {
            ($level:ident, $record:ident, $message:literal) => {
                $level!(
                    target: "audit",
                    request_id = %$record.request_id,
                    timestamp = %$record.timestamp.to_rfc3339(),
                    method = %$record.method,
                    url = %$record.url,
                    client_identity = %$record.client_identity,
                    user_agent = ?$record.user_agent,
                    status = $record.status_code,
                    response_time_ms = $record.response_time_ms,
                    code = ?$record.error_code,
                    error = ?$record.error,
                    headers = %$record.headers_json(),
                    $message
                )
            };
        }

        if self.status_code >= 500 {
            audit_event!(error, self, "request failed");
        } else if self.is_failure() {
            audit_event!(warn, self, "request rejected");
        } else {
            audit_event!(info, self, "request completed");
        }
    }
}

/// Mask the values of credential query parameters in a path or URL,
/// leaving every other pair in its original encoding.
pub fn redact_query_credentials(target: &str) -> String {
    let Some((path, query)) = target.split_once('?') else {
        return target.to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded: String = url::form_urlencoded::parse(name.as_bytes())
                .map(|(k, _)| k.into_owned())
                .next()
                .unwrap_or_default()
                .to_lowercase();

            if !value.is_empty() && REDACTED_QUERY_PARAMS.contains(&decoded.as_str()) {
                format!("{}={}", name, REDACTED_VALUE)
            } else {
                pair.to_string()
            }
        })
        .collect();

    format!("{}?{}", path, pairs.join("&"))
}

/// Copy of `headers` without credentials or cookies. Values that are not
/// valid visible ASCII are dropped; repeated headers are joined with `, `.
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut sanitized: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers.iter() {
        let name = name.as_str().to_lowercase();
        if REDACTED_HEADERS.contains(&name.as_str()) {
            continue;
        }

        let Ok(value) = value.to_str() else {
            continue;
        };

        sanitized
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    sanitized
}
