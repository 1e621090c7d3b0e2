//! Abstract stream connection and connection identity.
//!
//! # Responsibilities
//! - Define the byte-stream interface every dialer produces
//! - Name the network families a dial may be restricted to
//! - Generate unique connection IDs for tracing and bookkeeping

use std::any::Any;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A bidirectional byte stream produced by a [`Dialer`](crate::net::dialer::Dialer).
///
/// Deadlines are not part of the interface: callers bound individual reads and
/// writes with `tokio::time::timeout`.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Local address of the stream, if it has one.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote address of the stream, if it has one.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Type inspection for callers that need stream-specific operations.
    fn as_any(&self) -> &dyn Any;

    /// Detach the wrapped stream, if this connection wraps one.
    fn take_inner(&mut self) -> Option<BoxConnection> {
        None
    }
}

/// Type-erased connection handed from dialers to the manager.
pub type BoxConnection = Box<dyn Connection>;

impl Connection for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// In-memory pipes have no socket addresses.
impl Connection for DuplexStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "in-memory stream has no local address"))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "in-memory stream has no peer address"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Network family requested for a dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Any resolved address family.
    #[default]
    Tcp,
    /// IPv4 addresses only.
    Tcp4,
    /// IPv6 addresses only.
    Tcp6,
}

impl Network {
    /// Whether a resolved address belongs to this network family.
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network '{0}' (expected tcp, tcp4 or tcp6)")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

/// Unique identifier for a dialed connection.
///
/// Backed by a random UUID so IDs stay unique across managers and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
