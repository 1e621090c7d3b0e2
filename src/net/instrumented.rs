//! Instrumented connection wrapper.
//!
//! # Responsibilities
//! - Wrap one raw connection handed out to a caller
//! - Record byte counters, timestamps and the last error per operation
//! - Let the owning target close the connection out from under the caller
//!
//! # Design Decisions
//! - The caller's [`InstrumentedConnection`] and the target's [`ConnectionHandle`]
//!   share one state cell; neither owns the socket exclusively
//! - Errors are recorded, never swallowed: the caller sees exactly what the
//!   underlying stream returned
//! - Removal is lazy: the maintenance pass reaps entries whose
//!   [`ConnectionStats::has_error`] is true

use std::any::Any;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::net::connection::{BoxConnection, Connection, ConnectionId};

/// Traffic counters and last-seen errors of one connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub bytes_read: u64,
    pub bytes_written: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_write: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_write_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_close_error: Option<String>,

    /// Set once, never cleared.
    pub closed: bool,
}

impl ConnectionStats {
    /// Health predicate used by the recycle pass.
    pub fn has_error(&self) -> bool {
        self.closed
            || self.last_close_error.is_some()
            || self.last_read_error.is_some()
            || self.last_write_error.is_some()
    }
}

/// State shared between the caller's connection and the target's handle.
struct Shared {
    id: ConnectionId,
    stream: Mutex<Option<BoxConnection>>,
    stats: Mutex<ConnectionStats>,
    closed: CancellationToken,
}

impl Shared {
    fn mark_closed(&self, err: Option<&io::Error>) -> bool {
        let first = {
            let mut stats = self.stats.lock();
            let first = !stats.closed;
            if first {
                stats.closed = true;
                stats.closed_at = Some(Utc::now());
            }
            if let Some(e) = err {
                stats.last_close_error = Some(e.to_string());
            }
            first
        };
        self.closed.cancel();
        first
    }

    /// Drop the stream (closing the socket) and mark closed.
    fn close_now(&self) -> bool {
        let stream = self.stream.lock().take();
        drop(stream);
        self.mark_closed(None)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed")
}

/// A dialed connection that records its own traffic.
///
/// Reads and writes go straight to the wrapped stream. Counters assume a
/// single consumer driving the connection.
pub struct InstrumentedConnection {
    shared: Arc<Shared>,
    close_signal: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl InstrumentedConnection {
    /// Wrap a raw connection, returning the caller side and the bookkeeping handle.
    pub fn new(stream: BoxConnection) -> (Self, ConnectionHandle) {
        let closed = CancellationToken::new();
        let shared = Arc::new(Shared {
            id: ConnectionId::new(),
            stream: Mutex::new(Some(stream)),
            stats: Mutex::new(ConnectionStats::default()),
            closed: closed.clone(),
        });

        let conn = Self {
            shared: Arc::clone(&shared),
            close_signal: Box::pin(closed.cancelled_owned()),
        };
        (conn, ConnectionHandle { shared })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.shared.id
    }

    /// Snapshot of the current counters.
    pub fn stats(&self) -> ConnectionStats {
        self.shared.stats.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.stats.lock().closed
    }

    /// Shut the stream down and release it.
    ///
    /// Calling this again after the first close is a no-op returning `Ok(())`.
    pub async fn close(&mut self) -> io::Result<()> {
        let stream = self.shared.stream.lock().take();
        let result = match stream {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        };
        self.shared.mark_closed(result.as_ref().err());
        result
    }

    /// Detach the raw stream. The manager sees this connection as closed afterwards.
    pub fn into_inner(self) -> Option<BoxConnection> {
        self.shared.stream.lock().take()
    }

    fn poll_stream<T>(
        &mut self,
        cx: &mut Context<'_>,
        op: impl FnOnce(Pin<&mut BoxConnection>, &mut Context<'_>) -> Poll<io::Result<T>>,
    ) -> Poll<io::Result<T>> {
        let polled = {
            let mut guard = self.shared.stream.lock();
            match guard.as_mut() {
                Some(stream) => op(Pin::new(stream), cx),
                None => return Poll::Ready(Err(closed_error())),
            }
        };

        match polled {
            // Closed by the owning target while we were parked on the socket.
            Poll::Pending if self.close_signal.as_mut().poll(cx).is_ready() => {
                Poll::Ready(Err(closed_error()))
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for InstrumentedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedConnection")
            .field("id", &self.shared.id)
            .field("stats", &*self.shared.stats.lock())
            .finish()
    }
}

impl AsyncRead for InstrumentedConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let wanted = buf.remaining() > 0;

        let result = match this.poll_stream(cx, |s, cx| s.poll_read(cx, buf)) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };

        let n = buf.filled().len() - before;
        let mut stats = this.shared.stats.lock();
        stats.last_read = Some(Utc::now());
        stats.bytes_read += n as u64;
        match &result {
            Err(e) => stats.last_read_error = Some(e.to_string()),
            Ok(()) if n == 0 && wanted => stats.last_read_error = Some("EOF".to_string()),
            Ok(()) => {}
        }
        Poll::Ready(result)
    }
}

impl AsyncWrite for InstrumentedConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = match this.poll_stream(cx, |s, cx| s.poll_write(cx, buf)) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };

        let mut stats = this.shared.stats.lock();
        stats.last_write = Some(Utc::now());
        match &result {
            Ok(n) => stats.bytes_written += *n as u64,
            Err(e) => stats.last_write_error = Some(e.to_string()),
        }
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = match this.poll_stream(cx, |s, cx| s.poll_flush(cx)) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        if let Err(e) = &result {
            this.shared.stats.lock().last_write_error = Some(e.to_string());
        }
        Poll::Ready(result)
    }

    /// Half-close of the write side. Use [`InstrumentedConnection::close`] to
    /// release the connection.
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = match this.poll_stream(cx, |s, cx| s.poll_shutdown(cx)) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        if let Err(e) = &result {
            this.shared.stats.lock().last_close_error = Some(e.to_string());
        }
        Poll::Ready(result)
    }
}

impl Connection for InstrumentedConnection {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self.shared.stream.lock().as_ref() {
            Some(stream) => stream.local_addr(),
            None => Err(closed_error()),
        }
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self.shared.stream.lock().as_ref() {
            Some(stream) => stream.peer_addr(),
            None => Err(closed_error()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn take_inner(&mut self) -> Option<BoxConnection> {
        self.shared.stream.lock().take()
    }
}

/// The socket goes away with the caller's handle; let the next recycle pass reap it.
impl Drop for InstrumentedConnection {
    fn drop(&mut self) {
        self.shared.close_now();
    }
}

/// Return the raw stream behind an instrumented connection.
///
/// Any other connection, or an instrumented one whose stream is already gone,
/// is returned unchanged.
pub fn unwrap(mut conn: BoxConnection) -> BoxConnection {
    match conn.take_inner() {
        Some(inner) => inner,
        None => conn,
    }
}

/// Bookkeeping side of an [`InstrumentedConnection`], held in the target's
/// connection map.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> &ConnectionId {
        &self.shared.id
    }

    pub fn stats(&self) -> ConnectionStats {
        self.shared.stats.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.stats.lock().closed
    }

    pub fn has_error(&self) -> bool {
        self.shared.stats.lock().has_error()
    }

    /// Close the connection from the manager side.
    ///
    /// The socket is dropped immediately; a caller parked in a read or write is
    /// woken with `ConnectionAborted`. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        self.shared.close_now()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    fn pair() -> (InstrumentedConnection, ConnectionHandle, DuplexStream) {
        let (local, remote) = duplex(1024);
        let (conn, handle) = InstrumentedConnection::new(Box::new(local));
        (conn, handle, remote)
    }

    #[tokio::test]
    async fn counts_bytes() {
        let (mut conn, handle, mut remote) = pair();

        conn.write_all(b"hello").await.unwrap();
        conn.write_all(b" world").await.unwrap();
        let mut buf = [0u8; 11];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello world");

        remote.write_all(b"abc").await.unwrap();
        let mut buf = [0u8; 3];
        conn.read_exact(&mut buf).await.unwrap();

        let stats = handle.stats();
        assert_eq!(stats.bytes_written, 11);
        assert_eq!(stats.bytes_read, 3);
        assert!(stats.last_read.is_some());
        assert!(stats.last_write.is_some());
        assert!(!stats.has_error());
    }

    #[tokio::test]
    async fn eof_is_recorded() {
        let (mut conn, handle, remote) = pair();
        drop(remote);

        let mut buf = [0u8; 8];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
        assert_eq!(handle.stats().last_read_error.as_deref(), Some("EOF"));
        assert!(handle.has_error());
    }

    #[tokio::test]
    async fn write_error_is_recorded() {
        let (mut conn, handle, remote) = pair();
        drop(remote);

        let err = conn.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(handle.stats().last_write_error.is_some());
        assert!(handle.has_error());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut conn, handle, _remote) = pair();

        conn.close().await.unwrap();
        let first = handle.stats();
        assert!(first.closed);
        assert!(first.closed_at.is_some());
        assert!(first.last_close_error.is_none());

        conn.close().await.unwrap();
        let second = handle.stats();
        assert_eq!(second.closed_at, first.closed_at);
        assert!(second.closed);
    }

    #[tokio::test]
    async fn io_after_close_is_recorded() {
        let (mut conn, handle, _remote) = pair();
        conn.close().await.unwrap();

        let err = conn.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert_eq!(handle.stats().last_write_error.as_deref(), Some("connection closed"));
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn handle_close_wakes_pending_read() {
        let (mut conn, handle, _remote) = pair();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            let result = conn.read(&mut buf).await;
            (result.map_err(|e| e.kind()), conn.stats())
        });

        tokio::task::yield_now().await;
        assert!(handle.close());
        assert!(!handle.close());

        let (result, stats) = reader.await.unwrap();
        assert_eq!(result, Err(io::ErrorKind::ConnectionAborted));
        assert!(stats.closed);
        assert!(stats.last_read_error.is_some());
    }

    #[tokio::test]
    async fn drop_marks_closed() {
        let (conn, handle, _remote) = pair();
        assert!(!handle.is_closed());
        drop(conn);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn unwrap_returns_inner_stream() {
        let (conn, handle, _remote) = pair();
        let inner = unwrap(Box::new(conn));
        assert!(inner.as_any().is::<DuplexStream>());
        assert!(handle.is_closed());

        let (plain, _other) = duplex(8);
        let same = unwrap(Box::new(plain));
        assert!(same.as_any().is::<DuplexStream>());
    }

    #[tokio::test]
    async fn into_inner_detaches() {
        let (conn, _handle, _remote) = pair();
        let inner = conn.into_inner();
        assert!(inner.is_some());
    }
}
