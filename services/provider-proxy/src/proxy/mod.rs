mod error;
pub(crate) mod handler;
mod upstream;

pub use error::{ErrorBody, ErrorEnvelope, ProxyError};
pub use handler::ProxyHandler;
pub use upstream::{ForwardedRequest, ProxyResponse, UpstreamClient, FORWARDED_BY_HEADER};

use crate::admission::AdmissionPipeline;
use crate::config::ProxyConfig;
use crate::health::HealthProbe;
use crate::limiter::RateLimiter;
use crate::routing::{ProviderTargets, RouteTable};
use std::sync::Arc;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything a request needs, shared read-only across connections.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub admission: Arc<AdmissionPipeline>,
    pub routes: Arc<RouteTable>,
    pub targets: Arc<ProviderTargets>,
    pub upstream_client: Arc<UpstreamClient>,
    pub health_probe: Arc<HealthProbe>,
}

impl ProxyState {
    pub fn new(config: ProxyConfig, limiter: Arc<dyn RateLimiter>) -> anyhow::Result<Self> {
        let targets = ProviderTargets::from_config(&config);
        let routes = RouteTable::new(config.providers.iter().map(|p| p.name.as_str()));
        let admission = AdmissionPipeline::from_config(&config, limiter);
        let upstream_client = UpstreamClient::new(config.upstream_timeout())?;
        let health_probe = HealthProbe::new(
            upstream_client.http_client().clone(),
            &targets,
            &config.health_check_provider,
        );

        Ok(Self {
            config: Arc::new(config),
            admission: Arc::new(admission),
            routes: Arc::new(routes),
            targets: Arc::new(targets),
            upstream_client: Arc::new(upstream_client),
            health_probe: Arc::new(health_probe),
        })
    }
}
