use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Client;
use tracing::{debug, info, instrument};

use super::ProxyError;
use crate::admission::API_KEY_HEADER;
use crate::{SERVICE_NAME, SERVICE_VERSION};

pub const FORWARDED_BY_HEADER: &str = "x-forwarded-by";

/// Hop-by-hop headers plus framing headers hyper recomputes for the relay.
const NON_RELAYED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

/// Outbound request, built from a filtered copy of the inbound one.
#[derive(Debug, Clone)]
pub struct ForwardedRequest {
    pub method: Method,
    pub target_url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    /// Create a pooled client; `None` leaves outbound calls without a timeout
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(20);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Only auth headers survive from the inbound request; everything else is
    /// set by the proxy. Missing Authorization falls back to `default_api_key`.
    pub fn build_request(
        method: Method,
        target_url: String,
        inbound_headers: &HeaderMap,
        inbound_body: Bytes,
        default_api_key: Option<&str>,
    ) -> Result<ForwardedRequest, ProxyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, identification_header());
        headers.insert(
            HeaderName::from_static(FORWARDED_BY_HEADER),
            HeaderValue::from_static(SERVICE_NAME),
        );

        match inbound_headers.get(AUTHORIZATION) {
            Some(value) => {
                headers.insert(AUTHORIZATION, value.clone());
            }
            None => {
                if let Some(key) = default_api_key {
                    let value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| {
                        ProxyError::Internal("configured API key is not a valid header value".into())
                    })?;
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }

        if let Some(value) = inbound_headers.get(API_KEY_HEADER) {
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value.clone());
        }

        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            Some(normalize_json_body(&inbound_body)?)
        };

        Ok(ForwardedRequest {
            method,
            target_url,
            headers,
            body,
        })
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %target_path(&request.target_url)))]
    pub async fn dispatch(&self, request: ForwardedRequest) -> Result<ProxyResponse, ProxyError> {
        debug!("Forwarding request to upstream");

        let mut upstream_req = self
            .http_client
            .request(request.method, &request.target_url)
            .headers(request.headers);

        if let Some(body) = request.body {
            upstream_req = upstream_req.body(body);
        }

        let start = std::time::Instant::now();
        let upstream_response = upstream_req.send().await?;

        let status = upstream_response.status();
        let headers = relayable_headers(upstream_response.headers());
        let body = upstream_response.bytes().await?;

        info!(
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis(),
            response_size_bytes = body.len(),
            "Upstream response received"
        );

        if !body.is_empty() && serde_json::from_slice::<serde::de::IgnoredAny>(&body).is_err() {
            return Err(ProxyError::Upstream(format!(
                "upstream returned a non-JSON body (status {})",
                status.as_u16()
            )));
        }

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }
}

/// Path of the outbound URL; the query can carry a credential.
fn target_path(target_url: &str) -> String {
    url::Url::parse(target_url)
        .map(|url| url.path().to_string())
        .unwrap_or_default()
}

fn identification_header() -> HeaderValue {
    HeaderValue::from_str(&format!("{}/{}", SERVICE_NAME, SERVICE_VERSION))
        .unwrap_or_else(|_| HeaderValue::from_static(SERVICE_NAME))
}

/// Re-serialise the inbound JSON body; an empty body becomes `{}`.
fn normalize_json_body(body: &Bytes) -> Result<Bytes, ProxyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Bytes::from_static(b"{}"));
    }

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ProxyError::InvalidBody(e.to_string()))?;
    let encoded =
        serde_json::to_vec(&value).map_err(|e| ProxyError::Internal(e.to_string()))?;
    Ok(Bytes::from(encoded))
}

fn relayable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::new();

    for (name, value) in headers.iter() {
        // CORS headers are the proxy's own; upstream values would contradict them
        if NON_RELAYED_HEADERS.contains(&name.as_str())
            || name.as_str().starts_with("access-control-")
        {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }

    relayed
}
