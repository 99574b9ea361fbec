use crate::config::ProxyConfig;
use crate::limiter::InMemoryRateLimiter;
use crate::proxy::ProxyHandler;
use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    handler: Arc<ProxyHandler>,
    limiter: InMemoryRateLimiter,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ProxyConfig) -> Result<Self> {
        // One limiter shared by the handler and the sweeper
        let limiter = InMemoryRateLimiter::new(config.rate_limit_points, config.rate_limit_window());
        let handler = ProxyHandler::with_limiter(config.clone(), Arc::new(limiter.clone()))
            .context("Failed to build request handler")?;

        Ok(Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            limiter,
        })
    }

    /// Bind the configured address and run the proxy server
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr()
            .parse()
            .context("Invalid listen address")?;

        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        self.serve(listener).await
    }

    /// Accept loop on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("Listener has no local address")?;
        info!(
            "Provider proxy listening on {} ({} providers, {} requests per {}s)",
            addr,
            self.config.providers.len(),
            self.config.rate_limit_points,
            self.config.rate_limit_duration_secs
        );

        // Keep bucket memory bounded to active clients
        let _sweeper = SweeperGuard(self.limiter.start_sweeper());
        let server = Arc::new(self);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let server = Arc::clone(&server);

            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    debug!("Connection error from {}: {:#}", peer_addr, e);
                }
            });
        }
    }

    /// Handle a single connection
    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        let io = TokioIo::new(stream);
        let handler = Arc::clone(&self.handler);
        let peer_info = Arc::new(PeerInfo { addr: peer_addr });

        let service = service_fn(move |req| {
            let handler = Arc::clone(&handler);
            let peer_info = Arc::clone(&peer_info);
            async move { handler.handle_request(req, Some(peer_info.client_ip())).await }
        });

        http1::Builder::new()
            .serve_connection(io, service)
            .await
            .context("Failed to serve connection")?;

        Ok(())
    }
}

/// Stops the bucket sweeper when the accept loop is dropped.
struct SweeperGuard(JoinHandle<()>);

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Peer connection information
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub addr: SocketAddr,
}

impl PeerInfo {
    /// Get client IP address
    pub fn client_ip(&self) -> IpAddr {
        self.addr.ip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_peer_info() {
        let peer_info = PeerInfo {
            addr: "127.0.0.1:1234".parse().unwrap(),
        };

        assert_eq!(
            peer_info.client_ip(),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
    }

    #[tokio::test]
    async fn test_server_builds_from_default_config() {
        let server = ProxyServer::new(ProxyConfig::default()).unwrap();
        assert_eq!(server.limiter.capacity(), 100);
        assert_eq!(server.handler.state().targets.names().count(), 5);
    }
}
