//! DNS interceptor.
//!
//! Answers every query on the DNS port. Whitelisted names are relayed to the
//! upstream resolver; everything else resolves to the portal. Queries are
//! handled one at a time, and a failed query never stops the loop.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::forwarder::Forwarder;
use crate::netif::LocalAddrSource;
use crate::resolver::{QueryAction, Resolver};
use crate::state::ActiveFlag;
use crate::stats::Stats;

use super::{ERROR_BACKOFF, MAX_REQUEST_SIZE, pause};

/// Everything the DNS loop needs besides its socket.
#[derive(Clone)]
pub struct DnsContext {
    pub resolver: Arc<Resolver>,
    pub forwarder: Forwarder,
    pub local_addr: Arc<dyn LocalAddrSource>,
    pub stats: Arc<Stats>,
}

/// UDP listener for the DNS interceptor.
pub struct DnsInterceptor {
    socket: UdpSocket,
}

impl DnsInterceptor {
    /// Bind the UDP socket for the interceptor.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve queries until `active` is cleared.
    ///
    /// The forwarding address is looked up once, when the loop starts.
    pub async fn run(self, ctx: DnsContext, mut active: ActiveFlag) {
        let local_ip = ctx.local_addr.local_ipv4();
        let mut buf = [0u8; MAX_REQUEST_SIZE];

        info!(
            bind = %self.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            forward_from = %local_ip,
            "DNS server running"
        );

        while active.is_active() {
            let received = tokio::select! {
                result = self.socket.recv_from(&mut buf) => result,
                _ = active.cleared() => break,
            };

            let result = match received {
                Ok((len, src)) => self.respond(&ctx, &buf[..len], src, local_ip).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                warn!("DNS handling error: {}", e);
                ctx.stats.record_error();
                if !pause(&mut active, ERROR_BACKOFF).await {
                    break;
                }
            }
        }

        debug!("DNS server stopped");
    }

    /// Decide on one query and send the answer back to `src`.
    async fn respond(
        &self,
        ctx: &DnsContext,
        request: &[u8],
        src: SocketAddr,
        local_ip: Ipv4Addr,
    ) -> io::Result<()> {
        debug!(from = %src, len = request.len(), "DNS request");

        let response = match ctx.resolver.process_query(request) {
            QueryAction::Hijack { response, domain } => {
                if domain.is_empty() {
                    debug!(from = %src, "Unparseable query, sending empty response");
                } else {
                    debug!(
                        "Hijacking: {} -> {}",
                        domain,
                        ctx.resolver.portal_ip()
                    );
                }
                ctx.stats.record_hijacked();
                response
            }
            QueryAction::Forward { domain } => {
                debug!("Domain {} is in whitelist, forwarding to real DNS", domain);
                let start = Instant::now();
                match ctx.forwarder.forward_or_log(request, local_ip).await {
                    Some(response) => {
                        ctx.stats
                            .record_forwarded(start.elapsed().as_secs_f64() * 1000.0);
                        response
                    }
                    None => {
                        debug!(domain = %domain, "No response from real DNS, sending zeroed response");
                        ctx.stats.record_forward_failed();
                        vec![0u8; request.len()]
                    }
                }
            }
        };

        self.socket.send_to(&response, src).await?;

        Ok(())
    }
}
