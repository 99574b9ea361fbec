use http::Uri;

pub const API_ROUTE_PREFIX: &str = "/api";
pub const PROVIDER_QUERY_PARAM: &str = "provider";

/// Providers reachable through `/api?provider=<name>`.
pub const QUERY_ROUTED_PROVIDERS: &[&str] = &["openai", "anthropic", "gemini"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Models,
    /// Forward to `provider`, with the routing prefix already stripped
    Proxy {
        provider: String,
        path_and_query: String,
    },
    /// `/api` form naming a provider it does not serve
    InvalidProvider { provider: Option<String> },
    NotFound,
}

impl Route {
    pub fn is_proxied(&self) -> bool {
        matches!(self, Route::Proxy { .. } | Route::InvalidProvider { .. })
    }
}

/// Path-prefix routes, one per provider, plus the query-routed `/api` form.
#[derive(Debug, Clone)]
pub struct RouteTable {
    prefixes: Vec<(String, String)>,
}

impl RouteTable {
    pub fn new<'a>(providers: impl IntoIterator<Item = &'a str>) -> Self {
        let prefixes = providers
            .into_iter()
            .map(|name| (format!("/{}", name), name.to_string()))
            .collect();
        Self { prefixes }
    }

    pub fn match_uri(&self, uri: &Uri) -> Route {
        let path = uri.path();

        match path {
            "/health" => return Route::Health,
            "/models" => return Route::Models,
            _ => {}
        }

        if let Some(subpath) = strip_prefix(path, API_ROUTE_PREFIX) {
            return Self::match_query_routed(subpath, uri.query());
        }

        for (prefix, provider) in &self.prefixes {
            if let Some(subpath) = strip_prefix(path, prefix) {
                return Route::Proxy {
                    provider: provider.clone(),
                    path_and_query: join_path_and_query(subpath, uri.query()),
                };
            }
        }

        Route::NotFound
    }

    fn match_query_routed(subpath: &str, query: Option<&str>) -> Route {
        let provider = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == PROVIDER_QUERY_PARAM)
                .map(|(_, value)| value.into_owned())
        });

        match provider {
            Some(name) if QUERY_ROUTED_PROVIDERS.contains(&name.as_str()) => {
                let remaining = query.map(strip_provider_param).filter(|q| !q.is_empty());
                Route::Proxy {
                    provider: name,
                    path_and_query: join_path_and_query(subpath, remaining.as_deref()),
                }
            }
            other => Route::InvalidProvider { provider: other },
        }
    }
}

/// `/openai/v1/models` with prefix `/openai` yields `/v1/models`;
/// `/openai` alone yields `/`; `/openaix` does not match.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn join_path_and_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}

/// Drop `provider=` pairs, keeping the rest in their original encoding.
fn strip_provider_param(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !key.is_empty() && key != PROVIDER_QUERY_PARAM
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(["openai", "anthropic", "gemini", "xai", "google"])
    }

    fn route(uri: &str) -> Route {
        table().match_uri(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_local_routes() {
        assert_eq!(route("/health"), Route::Health);
        assert_eq!(route("/models"), Route::Models);
        assert_eq!(route("/nope"), Route::NotFound);
        assert_eq!(route("/openaiv1/models"), Route::NotFound);
    }

    #[test]
    fn test_provider_prefix_is_stripped() {
        assert_eq!(
            route("/openai/v1/chat/completions"),
            Route::Proxy {
                provider: "openai".to_string(),
                path_and_query: "/v1/chat/completions".to_string()
            }
        );
        assert_eq!(
            route("/gemini/v1beta/models?key=abc&alt=json"),
            Route::Proxy {
                provider: "gemini".to_string(),
                path_and_query: "/v1beta/models?key=abc&alt=json".to_string()
            }
        );
    }

    #[test]
    fn test_query_routed_provider() {
        assert_eq!(
            route("/api/v1/messages?provider=anthropic&stream=false"),
            Route::Proxy {
                provider: "anthropic".to_string(),
                path_and_query: "/v1/messages?stream=false".to_string()
            }
        );
        assert_eq!(
            route("/api?provider=openai"),
            Route::Proxy {
                provider: "openai".to_string(),
                path_and_query: "/".to_string()
            }
        );
    }

    #[test]
    fn test_query_routed_rejects_other_providers() {
        assert_eq!(
            route("/api?provider=unsupported"),
            Route::InvalidProvider {
                provider: Some("unsupported".to_string())
            }
        );
        // Only the path-prefix form reaches xai
        assert_eq!(
            route("/api/v1/chat?provider=xai"),
            Route::InvalidProvider {
                provider: Some("xai".to_string())
            }
        );
        assert_eq!(route("/api/v1/chat"), Route::InvalidProvider { provider: None });
    }
}
