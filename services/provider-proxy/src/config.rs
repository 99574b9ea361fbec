use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Providers known to the gateway, with their default upstream base URL.
pub const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com"),
    ("anthropic", "https://api.anthropic.com"),
    ("gemini", "https://generativelanguage.googleapis.com"),
    ("xai", "https://api.x.ai"),
    ("google", "https://generativelanguage.googleapis.com"),
];

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_POINTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_DURATION_SECS: u64 = 60;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_BODY_SIZE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Production
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            // Anything else ("test", "staging", ...) keeps error details hidden
            _ => Ok(Environment::Production),
        }
    }
}

/// Per-provider upstream settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    pub base_url: String,
    /// Credential injected when the client sends no Authorization header
    pub default_api_key: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field(
                "default_api_key",
                &self.default_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen host address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Bucket capacity per client identity
    pub rate_limit_points: u32,

    /// Rate limit window in seconds
    pub rate_limit_duration_secs: u64,

    /// Header carrying an explicit client identity; peer IP is used otherwise
    pub rate_limit_key_header: Option<String>,

    /// Origin allow-list, `*` admits everything
    pub allowed_origins: Vec<String>,

    /// Enable credential shape validation
    pub api_key_validation: bool,

    /// Emit one audit record per request
    pub log_requests: bool,

    /// Upstream providers, in routing order
    pub providers: Vec<ProviderSettings>,

    /// Outbound timeout in seconds, 0 disables it
    pub upstream_timeout_secs: u64,

    /// Maximum inbound body size in bytes
    pub max_body_size_bytes: usize,

    /// Provider pinged by the health endpoint
    pub health_check_provider: String,

    /// Deployment environment
    pub environment: Environment,

    /// Log level
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            rate_limit_points: DEFAULT_RATE_LIMIT_POINTS,
            rate_limit_duration_secs: DEFAULT_RATE_LIMIT_DURATION_SECS,
            rate_limit_key_header: None,
            allowed_origins: vec!["*".to_string()],
            api_key_validation: false,
            log_requests: true,
            providers: BUILTIN_PROVIDERS
                .iter()
                .map(|(name, base_url)| ProviderSettings {
                    name: (*name).to_string(),
                    base_url: (*base_url).to_string(),
                    default_api_key: None,
                })
                .collect(),
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            max_body_size_bytes: DEFAULT_MAX_BODY_SIZE_BYTES,
            health_check_provider: "openai".to_string(),
            environment: Environment::Production,
            log_level: "info".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(host) = lookup("HOST") {
            cfg.host = host;
        }
        if let Some(port) = lookup("PORT") {
            cfg.port = port.trim().parse().context("Invalid PORT")?;
        }
        if let Some(points) = lookup("RATE_LIMIT_POINTS") {
            cfg.rate_limit_points = points
                .trim()
                .parse()
                .context("Invalid RATE_LIMIT_POINTS")?;
        }
        if let Some(duration) = lookup("RATE_LIMIT_DURATION") {
            cfg.rate_limit_duration_secs = duration
                .trim()
                .parse()
                .context("Invalid RATE_LIMIT_DURATION")?;
        }
        cfg.rate_limit_key_header = lookup("RATE_LIMIT_KEY_HEADER")
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty());

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            cfg.allowed_origins = parse_origins(&origins);
        }
        if let Some(flag) = lookup("API_KEY_VALIDATION") {
            cfg.api_key_validation =
                parse_bool(&flag).with_context(|| format!("Invalid API_KEY_VALIDATION: {flag}"))?;
        }
        if let Some(flag) = lookup("LOG_REQUESTS") {
            cfg.log_requests =
                parse_bool(&flag).with_context(|| format!("Invalid LOG_REQUESTS: {flag}"))?;
        }

        for provider in cfg.providers.iter_mut() {
            let prefix = provider.name.to_uppercase();
            if let Some(url) = lookup(&format!("{prefix}_BASE_URL")) {
                provider.base_url = url.trim().to_string();
            }
            provider.default_api_key = lookup(&format!("{prefix}_API_KEY"))
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty());
        }

        if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECS") {
            cfg.upstream_timeout_secs = secs
                .trim()
                .parse()
                .context("Invalid UPSTREAM_TIMEOUT_SECS")?;
        }
        if let Some(size) = lookup("MAX_BODY_SIZE_BYTES") {
            cfg.max_body_size_bytes = size
                .trim()
                .parse()
                .context("Invalid MAX_BODY_SIZE_BYTES")?;
        }
        if let Some(provider) = lookup("HEALTH_CHECK_PROVIDER") {
            cfg.health_check_provider = provider.trim().to_string();
        }
        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            cfg.environment = env.parse()?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.log_level = level;
        }

        Ok(cfg)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_points == 0 {
            anyhow::bail!("RATE_LIMIT_POINTS must be greater than 0");
        }

        if self.rate_limit_duration_secs == 0 {
            anyhow::bail!("RATE_LIMIT_DURATION must be greater than 0");
        }

        if self.allowed_origins.is_empty() {
            anyhow::bail!("ALLOWED_ORIGINS must contain at least one origin or `*`");
        }

        if self.max_body_size_bytes == 0 {
            anyhow::bail!("MAX_BODY_SIZE_BYTES must be greater than 0");
        }

        for provider in &self.providers {
            url::Url::parse(&provider.base_url).with_context(|| {
                format!(
                    "{}_BASE_URL is not a valid URL: {}",
                    provider.name.to_uppercase(),
                    provider.base_url
                )
            })?;
        }

        if !self
            .providers
            .iter()
            .any(|p| p.name == self.health_check_provider)
        {
            anyhow::bail!(
                "HEALTH_CHECK_PROVIDER names an unknown provider: {}",
                self.health_check_provider
            );
        }

        Ok(())
    }

    /// Get rate limit window as Duration
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_duration_secs)
    }

    /// Outbound timeout, `None` when disabled
    pub fn upstream_timeout(&self) -> Option<Duration> {
        (self.upstream_timeout_secs > 0).then(|| Duration::from_secs(self.upstream_timeout_secs))
    }

    /// Get the listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ProxyConfig::from_source(source(&[])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_points, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
        assert!(!config.api_key_validation);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.providers.len(), BUILTIN_PROVIDERS.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_recognized_options() {
        let config = ProxyConfig::from_source(source(&[
            ("PORT", "8081"),
            ("RATE_LIMIT_POINTS", "5"),
            ("RATE_LIMIT_DURATION", "10"),
            ("ALLOWED_ORIGINS", "https://a.com, https://b.com,,"),
            ("API_KEY_VALIDATION", "TRUE"),
            ("LOG_REQUESTS", "0"),
            ("OPENAI_API_KEY", "sk-default"),
            ("XAI_BASE_URL", "http://127.0.0.1:9999"),
            ("NODE_ENV", "development"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.rate_limit_points, 5);
        assert_eq!(config.rate_limit_duration_secs, 10);
        assert_eq!(config.allowed_origins, vec!["https://a.com", "https://b.com"]);
        assert!(config.api_key_validation);
        assert!(!config.log_requests);
        assert_eq!(
            config.provider("openai").unwrap().default_api_key.as_deref(),
            Some("sk-default")
        );
        assert_eq!(config.provider("xai").unwrap().base_url, "http://127.0.0.1:9999");
        assert!(config.environment.is_development());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ProxyConfig::from_source(source(&[("PORT", "eighty")])).is_err());
        assert!(ProxyConfig::from_source(source(&[("LOG_REQUESTS", "maybe")])).is_err());

        let mut config = ProxyConfig::default();
        config.rate_limit_points = 0;
        assert!(config.validate().is_err());
        config.rate_limit_points = 1;

        config.health_check_provider = "mistral".to_string();
        assert!(config.validate().is_err());
        config.health_check_provider = "openai".to_string();

        config.providers[0].base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_output_hides_api_keys() {
        let settings = ProviderSettings {
            name: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            default_api_key: Some("sk-very-secret".to_string()),
        };

        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
