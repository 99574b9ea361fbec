use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use http::header::AUTHORIZATION;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::routing::ProviderTargets;

pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const HEALTH_PROBE_PATH: &str = "/v1/models";

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime: u64,
    pub timestamp: String,
    pub services: BTreeMap<String, &'static str>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Pings one provider; any HTTP answer counts as reachable.
pub struct HealthProbe {
    client: Client,
    provider: String,
    url: Option<String>,
    api_key: Option<String>,
    started_at: Instant,
}

impl HealthProbe {
    pub fn new(client: Client, targets: &ProviderTargets, provider: &str) -> Self {
        let target = targets.get(provider);
        Self {
            client,
            provider: provider.to_string(),
            url: target.map(|t| format!("{}{}", t.base_url, HEALTH_PROBE_PATH)),
            api_key: target.and_then(|t| t.default_api_key.clone()),
            started_at: Instant::now(),
        }
    }

    pub async fn check(&self) -> HealthReport {
        let reachable = match &self.url {
            Some(url) => self.ping(url).await,
            None => false,
        };

        let mut services = BTreeMap::new();
        services.insert(
            self.provider.clone(),
            if reachable { "available" } else { "unreachable" },
        );

        HealthReport {
            status: if reachable { "healthy" } else { "degraded" },
            uptime: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now().to_rfc3339(),
            services,
        }
    }

    async fn ping(&self, url: &str) -> bool {
        let mut request = self.client.get(url).timeout(HEALTH_PROBE_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                debug!(
                    provider = %self.provider,
                    status = response.status().as_u16(),
                    "health probe answered"
                );
                true
            }
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "health probe failed");
                false
            }
        }
    }
}
