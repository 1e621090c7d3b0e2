//! TCP forwarding front-end.
//!
//! # Data Flow
//! ```text
//! client connects to listener.bind_address
//!     → net::listener (session permit)
//!     → Manager::connect (highest-priority reachable target)
//!     → copy_bidirectional until either side closes
//!     → close the instrumented connection, release the permit
//! ```
//!
//! # Design Decisions
//! - A dial failure drops the client socket; there is nothing to forward to
//! - Sessions already running are not interrupted by shutdown, only by
//!   failback, disable or recycle closing their target connection

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::failover::Manager;
use crate::net::listener::{Listener, ListenerError};

/// Accepts client connections and pipes each one to a failover target.
pub struct ForwardServer {
    listener: Listener,
    manager: Arc<Manager>,
}

impl ForwardServer {
    pub fn new(listener: Listener, manager: Arc<Manager>) -> Self {
        Self { listener, manager }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (client, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let manager = Arc::clone(&self.manager);
                    tokio::spawn(async move {
                        forward(client, peer, &manager).await;
                        drop(permit);
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Forwarding listener stopped");
                    return Ok(());
                }
            }
        }
    }
}

async fn forward(mut client: TcpStream, peer: SocketAddr, manager: &Manager) {
    let mut upstream = match manager.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(peer_addr = %peer, error = %e, "No upstream for client");
            return;
        }
    };
    let connection_id = upstream.id().clone();
    tracing::debug!(peer_addr = %peer, %connection_id, "Forwarding session started");

    match copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_upstream, to_client)) => {
            tracing::debug!(peer_addr = %peer, %connection_id, to_upstream, to_client, "Forwarding session finished");
        }
        Err(e) => {
            tracing::debug!(peer_addr = %peer, %connection_id, error = %e, "Forwarding session aborted");
        }
    }

    if let Err(e) = upstream.close().await {
        tracing::trace!(%connection_id, error = %e, "Upstream close reported an error");
    }
}
