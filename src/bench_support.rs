use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request};
use http_body_util::Full;
use provider_gateway_proxy::config::ProxyConfig;
use provider_gateway_proxy::{AdmissionPipeline, InMemoryRateLimiter, ProxyHandler};

pub use provider_gateway_proxy;

/// Capacity high enough that benchmark loops never hit the limit.
pub const BENCH_CAPACITY: u32 = u32::MAX;

pub struct AdmissionBenchFixture {
    pub pipeline: AdmissionPipeline,
    pub limiter: InMemoryRateLimiter,
    pub headers: HeaderMap,
    pub peer_ip: IpAddr,
}

impl AdmissionBenchFixture {
    /// `origins` and `key_validation` mirror the matching config settings.
    pub fn new(origins: &[&str], key_validation: bool) -> Self {
        let config = ProxyConfig {
            rate_limit_points: BENCH_CAPACITY,
            allowed_origins: origins.iter().map(|o| (*o).to_string()).collect(),
            api_key_validation: key_validation,
            ..ProxyConfig::default()
        };

        let limiter = InMemoryRateLimiter::new(BENCH_CAPACITY, Duration::from_secs(3600));
        let pipeline = AdmissionPipeline::from_config(&config, Arc::new(limiter.clone()));

        let mut headers = HeaderMap::new();
        headers.insert("origin", HeaderValue::from_static("https://app.example"));
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer sk-bench-0123456789abcdef"),
        );

        Self {
            pipeline,
            limiter,
            headers,
            peer_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    pub fn admit(&self, method: &Method) -> bool {
        self.pipeline
            .admit(method, &self.headers, Some(self.peer_ip))
            .is_ok()
    }
}

/// Handler with request logging off, for routes that never leave the process.
pub fn local_handler() -> anyhow::Result<ProxyHandler> {
    let config = ProxyConfig {
        rate_limit_points: BENCH_CAPACITY,
        log_requests: false,
        ..ProxyConfig::default()
    };
    ProxyHandler::new(config)
}

pub fn local_request(method: Method, uri: &str) -> Request<Full<Bytes>> {
    let mut request = Request::new(Full::new(Bytes::new()));
    *request.method_mut() = method;
    if let Ok(uri) = uri.parse() {
        *request.uri_mut() = uri;
    }
    request
}
