mod error;
mod routes;
mod target;

pub use error::RoutingError;
pub use routes::{Route, RouteTable, API_ROUTE_PREFIX, QUERY_ROUTED_PROVIDERS};
pub use target::{ProviderTarget, ProviderTargets};
