//! Transport seam under a peer's outbound queue.

use std::io::{self, Write};
use std::net::{IpAddr, TcpStream};

/// Byte sink for one peer connection. Chunking and throttling live above
/// this seam; implementations just move bytes.
pub trait PeerTransport {
    /// Send one chunk synchronously.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush anything the transport buffered, e.g. before closing.
    fn flush(&mut self) -> io::Result<()>;

    fn peer_addr(&self) -> Option<IpAddr>;

    fn hostname(&self) -> Option<&str>;
}

/// TCP-backed transport for peers accepted by the host's listener.
pub struct TcpPeerTransport {
    stream: TcpStream,
    hostname: Option<String>,
}

impl TcpPeerTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, hostname: None }
    }

    /// Attach a resolved hostname so `hostname` can report it; the registry
    /// never does lookups of its own.
    pub fn with_hostname(stream: TcpStream, hostname: impl Into<String>) -> Self {
        Self { stream, hostname: Some(hostname.into()) }
    }
}

impl PeerTransport for TcpPeerTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    fn peer_addr(&self) -> Option<IpAddr> {
        self.stream.peer_addr().ok().map(|addr| addr.ip())
    }

    fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}
