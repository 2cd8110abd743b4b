//! Outbound connection establishment.
//!
//! The orchestrator opens connections through a [`Dialer`] so that the
//! network path is swappable: production uses [`TcpDialer`], a deployment
//! that routes around blocking plugs in a proxy-aware implementation, and
//! tests can refuse or redirect connections without touching the client.

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Opens outbound TCP connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connects to `address` (`host:port`).
    async fn dial(&self, address: &str) -> std::io::Result<TcpStream>;
}

/// Direct TCP dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &str) -> std::io::Result<TcpStream> {
        TcpStream::connect(address).await
    }
}
