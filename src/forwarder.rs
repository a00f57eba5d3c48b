//! Upstream DNS forwarding.
//!
//! Each whitelisted query is relayed over its own short-lived UDP socket
//! bound to the device's local address. The socket is dropped as soon as
//! one reply arrives or the wait runs out.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Largest reply accepted from the upstream resolver.
pub const MAX_UPSTREAM_RESPONSE: usize = 512;

/// Default time to wait for the upstream reply.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Ways a forward can fail. All of them mean "no response" to the caller.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream host is unreachable or refused the query.
    #[error("upstream unreachable: {0}")]
    HostUnreachable(#[source] io::Error),

    #[error("no reply from upstream within {0:?}")]
    Timeout(Duration),

    #[error("forwarding failed: {0}")]
    Io(#[source] io::Error),
}

impl ForwardError {
    fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::HostUnreachable | io::ErrorKind::ConnectionRefused => {
                ForwardError::HostUnreachable(e)
            }
            _ => ForwardError::Io(e),
        }
    }

    /// Whether the failure is worth a warning.
    ///
    /// An unreachable upstream is expected while the uplink is still coming up.
    pub fn is_expected(&self) -> bool {
        matches!(self, ForwardError::HostUnreachable(_))
    }
}

/// Relays raw queries to a single upstream resolver.
#[derive(Debug, Clone, Copy)]
pub struct Forwarder {
    upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            upstream,
            timeout: DEFAULT_FORWARD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `query` unmodified to the upstream and return its reply.
    pub async fn forward(&self, query: &[u8], local_ip: Ipv4Addr) -> Result<Vec<u8>, ForwardError> {
        let socket = UdpSocket::bind((local_ip, 0))
            .await
            .map_err(ForwardError::from_io)?;

        // Connected so an ICMP refusal surfaces as an error on recv
        socket
            .connect(self.upstream)
            .await
            .map_err(ForwardError::from_io)?;
        socket.send(query).await.map_err(ForwardError::from_io)?;

        let mut buf = vec![0u8; MAX_UPSTREAM_RESPONSE];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
            .map_err(ForwardError::from_io)?;

        buf.truncate(len);

        Ok(buf)
    }

    /// Forward `query`, logging failures and collapsing them to `None`.
    pub async fn forward_or_log(&self, query: &[u8], local_ip: Ipv4Addr) -> Option<Vec<u8>> {
        match self.forward(query, local_ip).await {
            Ok(response) => Some(response),
            Err(e) if e.is_expected() => {
                debug!(upstream = %self.upstream, "Upstream unreachable: {}", e);
                None
            }
            Err(e) => {
                warn!(upstream = %self.upstream, "Error forwarding DNS request: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upstream that answers one query with `reply`, returning what it received.
    async fn one_shot_upstream(reply: Vec<u8>) -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (len, src) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(&reply, src).await.unwrap();
            buf[..len].to_vec()
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn forward_returns_upstream_reply() {
        let (upstream, handle) = one_shot_upstream(vec![0xAA; 40]).await;
        let forwarder = Forwarder::new(upstream);

        let response = forwarder
            .forward(b"query-bytes", Ipv4Addr::LOCALHOST)
            .await
            .unwrap();

        assert_eq!(response, vec![0xAA; 40]);
        assert_eq!(handle.await.unwrap(), b"query-bytes");
    }

    #[tokio::test]
    async fn forward_truncates_oversized_reply() {
        let (upstream, _handle) = one_shot_upstream(vec![1; 700]).await;
        let forwarder = Forwarder::new(upstream);

        let response = forwarder.forward(b"q", Ipv4Addr::LOCALHOST).await.unwrap();

        assert_eq!(response.len(), MAX_UPSTREAM_RESPONSE);
    }

    #[tokio::test]
    async fn forward_times_out_on_silent_upstream() {
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let forwarder = Forwarder::new(silent.local_addr().unwrap())
            .with_timeout(Duration::from_millis(100));

        let err = forwarder.forward(b"q", Ipv4Addr::LOCALHOST).await.unwrap_err();

        assert!(matches!(err, ForwardError::Timeout(t) if t == Duration::from_millis(100)));
        assert!(!err.is_expected());
    }

    #[tokio::test]
    async fn forward_reports_refused_upstream_as_unreachable() {
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);
        let forwarder = Forwarder::new(closed_addr).with_timeout(Duration::from_secs(2));

        let err = forwarder.forward(b"q", Ipv4Addr::LOCALHOST).await.unwrap_err();

        assert!(matches!(err, ForwardError::HostUnreachable(_)));
        assert!(err.is_expected());
    }

    #[tokio::test]
    async fn forward_fails_to_bind_foreign_address() {
        let forwarder = Forwarder::new("127.0.0.1:53".parse().unwrap());

        // TEST-NET-1 is never assigned locally
        let err = forwarder
            .forward(b"q", Ipv4Addr::new(192, 0, 2, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardError::Io(_)));
    }

    #[tokio::test]
    async fn forward_or_log_collapses_failures() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let forwarder = Forwarder::new(silent.local_addr().unwrap())
            .with_timeout(Duration::from_millis(50));

        assert!(forwarder.forward_or_log(b"q", Ipv4Addr::LOCALHOST).await.is_none());
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        let forwarder = Forwarder::new("8.8.8.8:53".parse().unwrap());

        assert_eq!(forwarder.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unreachable_is_expected() {
        let unreachable = ForwardError::from_io(io::Error::from(io::ErrorKind::HostUnreachable));
        let refused = ForwardError::from_io(io::Error::from(io::ErrorKind::ConnectionRefused));
        let other = ForwardError::from_io(io::Error::from(io::ErrorKind::PermissionDenied));

        assert!(unreachable.is_expected());
        assert!(refused.is_expected());
        assert!(!other.is_expected());
        assert!(!ForwardError::Timeout(DEFAULT_FORWARD_TIMEOUT).is_expected());
    }
}
