//! Stream abstraction over TCP and Unix-domain transports.
//!
//! Accept loops that serve both socket families can hand either kind of
//! connection to a relay through one concrete type. Pipe pairs do not need
//! this wrapper; they go through [`Relay::from_pair`](crate::Relay::from_pair).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

/// A byte stream that can be a TCP or Unix-domain socket.
///
/// Both inner stream types are `Unpin`, so the passthrough below pins them
/// on the fly.
#[derive(Debug)]
pub enum RelayStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl RelayStream {
    /// Returns whether this stream is a Unix-domain socket.
    pub fn is_unix(&self) -> bool {
        #[cfg(unix)]
        {
            matches!(self, RelayStream::Unix(_))
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

impl From<TcpStream> for RelayStream {
    fn from(stream: TcpStream) -> Self {
        RelayStream::Tcp(stream)
    }
}

#[cfg(unix)]
impl From<UnixStream> for RelayStream {
    fn from(stream: UnixStream) -> Self {
        RelayStream::Unix(stream)
    }
}

impl AsyncRead for RelayStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            RelayStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            RelayStream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RelayStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            RelayStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            RelayStream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            RelayStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            RelayStream::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            RelayStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            RelayStream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
