pub mod admission;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod health;
pub mod limiter;
pub mod proxy;
pub mod routing;
pub mod server;

pub use admission::{AdmissionError, AdmissionPipeline, CredentialValidator, OriginValidator};
pub use config::{Environment, ProxyConfig};
pub use limiter::{InMemoryRateLimiter, RateLimitExceeded, RateLimiter};
pub use proxy::{ProxyError, ProxyHandler, UpstreamClient};
pub use routing::{ProviderTargets, RouteTable, RoutingError};
pub use server::ProxyServer;

/// Name sent upstream in identification headers and used in log lines.
pub const SERVICE_NAME: &str = "provider-gateway-proxy";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
