use std::collections::HashMap;

use super::RoutingError;
use crate::audit::redact_query_credentials;
use crate::config::ProxyConfig;

#[derive(Clone)]
pub struct ProviderTarget {
    pub base_url: String,
    pub default_api_key: Option<String>,
}

/// Immutable `provider -> upstream` table, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderTargets {
    targets: HashMap<String, ProviderTarget>,
}

impl ProviderTargets {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let targets = config
            .providers
            .iter()
            .map(|provider| {
                (
                    provider.name.clone(),
                    ProviderTarget {
                        base_url: provider.base_url.trim_end_matches('/').to_string(),
                        default_api_key: provider.default_api_key.clone(),
                    },
                )
            })
            .collect();

        Self { targets }
    }

    pub fn get(&self, provider: &str) -> Option<&ProviderTarget> {
        self.targets.get(provider)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Append `path_and_query` untouched to the provider's base URL.
    pub fn resolve(&self, provider: &str, path_and_query: &str) -> Result<String, RoutingError> {
        let target = self
            .targets
            .get(provider)
            .ok_or_else(|| RoutingError::UnknownProvider(provider.to_string()))?;

        let url = if path_and_query.starts_with('/') || path_and_query.starts_with('?') {
            format!("{}{}", target.base_url, path_and_query)
        } else {
            format!("{}/{}", target.base_url, path_and_query)
        };

        url::Url::parse(&url).map_err(|e| {
            RoutingError::InvalidTarget(format!("{}: {}", redact_query_credentials(&url), e))
        })?;
        Ok(url)
    }
}
