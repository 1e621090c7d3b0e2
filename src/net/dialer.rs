//! Outbound dialers.
//!
//! # Responsibilities
//! - Establish raw connections to a target address
//! - Resolve host names and honour the requested network family
//! - Adapt plain async closures into dialers for injection

use std::future::Future;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};

use crate::net::connection::{BoxConnection, Network};

/// Something that can open a connection to an address.
///
/// Implementations do not apply timeouts; the manager bounds every dial.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, network: Network, address: &str) -> io::Result<BoxConnection>;
}

/// Shared dialer reference.
pub type DialerRef = Arc<dyn Dialer>;

/// Dialer for plain TCP targets written as `host:port`.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    nodelay: bool,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `TCP_NODELAY` on every dialed socket.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, network: Network, address: &str) -> io::Result<BoxConnection> {
        let mut last_err = None;

        for addr in lookup_host(address).await? {
            if !network.accepts(&addr) {
                continue;
            }
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    if self.nodelay {
                        stream.set_nodelay(true)?;
                    }
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    tracing::trace!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {} address found for {}", network, address),
            )
        }))
    }
}

/// Dialer built from an async closure.
pub struct DialerFn<F>(F);

/// Wrap an async closure as a [`Dialer`].
pub fn dialer_fn<F, Fut>(f: F) -> DialerFn<F>
where
    F: Fn(Network, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<BoxConnection>> + Send + 'static,
{
    DialerFn(f)
}

#[async_trait]
impl<F, Fut> Dialer for DialerFn<F>
where
    F: Fn(Network, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<BoxConnection>> + Send + 'static,
{
    async fn dial(&self, network: Network, address: &str) -> io::Result<BoxConnection> {
        (self.0)(network, address.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Connection;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hi").await.unwrap();
        });

        let mut conn = TcpDialer::new()
            .with_nodelay(true)
            .dial(Network::Tcp, &addr.to_string())
            .await
            .unwrap();
        assert_eq!(conn.peer_addr().unwrap(), addr);

        let mut buf = [0u8; 2];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn tcp_dialer_respects_family() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let err = TcpDialer::new()
            .dial(Network::Tcp6, &addr.to_string())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }

    #[tokio::test]
    async fn closure_dialer() {
        let dialer = dialer_fn(|_network, address| async move {
            if address == "up" {
                let (a, _b) = tokio::io::duplex(64);
                Ok(Box::new(a) as BoxConnection)
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
        });

        assert!(dialer.dial(Network::Tcp, "up").await.is_ok());
        let err = dialer.dial(Network::Tcp, "down").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
