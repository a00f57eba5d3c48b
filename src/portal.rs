//! Captive portal orchestration.
//!
//! Binds the DNS and HTTP listeners, runs both loops as separate tasks and
//! tears them down again.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::error::{Error, Result};
use crate::filter::Whitelist;
use crate::forwarder::Forwarder;
use crate::netif::{LocalAddrSource, RouteProbe};
use crate::resolver::Resolver;
use crate::state::{ActiveFlag, PortalState};
use crate::stats::Stats;
use crate::transport::dns::{DnsContext, DnsInterceptor};
use crate::transport::http::HttpRedirector;

/// Tasks and addresses of a running portal.
struct Running {
    dns_addr: SocketAddr,
    http_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

/// The captive portal controller.
///
/// Dropping a running portal clears the active flag, so its loops exit on
/// their own; call [`stop`](Self::stop) to wait for them.
pub struct CaptivePortal {
    config: PortalConfig,
    resolver: Arc<Resolver>,
    local_addr: Arc<dyn LocalAddrSource>,
    stats: Arc<Stats>,
    state: PortalState,
    running: Option<Running>,
}

impl CaptivePortal {
    /// Create a portal from a validated configuration.
    ///
    /// Forwarded queries leave from `forward_bind` when set, otherwise from
    /// the address routing to the upstream resolver.
    pub fn new(config: PortalConfig) -> Result<Self> {
        config.validate()?;

        let local_addr: Arc<dyn LocalAddrSource> = match config.forward_bind {
            Some(ip) => Arc::new(ip),
            None => Arc::new(RouteProbe::new(config.upstream)),
        };
        let resolver = Arc::new(Resolver::new(
            Whitelist::new(&config.whitelist),
            config.portal_ip,
        ));

        Ok(Self {
            config,
            resolver,
            local_addr,
            stats: Arc::new(Stats::new()),
            state: PortalState::new(),
            running: None,
        })
    }

    /// Replace the source of the forwarding address.
    pub fn with_local_addr_source(mut self, source: impl LocalAddrSource + 'static) -> Self {
        self.local_addr = Arc::new(source);
        self
    }

    /// Start the DNS and HTTP servers.
    ///
    /// Both listeners are bound before this returns; a bind failure is
    /// returned and leaves nothing running. The loops themselves run in the
    /// background.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let dns_bind = self.config.dns_bind;
        let dns = DnsInterceptor::bind(dns_bind)
            .await
            .map_err(|source| Error::Bind {
                service: "DNS",
                addr: dns_bind,
                source,
            })?;

        let http_bind = self.config.http_addr();
        let http = HttpRedirector::bind(http_bind)
            .await
            .map_err(|source| Error::Bind {
                service: "HTTP",
                addr: http_bind,
                source,
            })?;

        let dns_addr = dns.local_addr()?;
        let http_addr = http.local_addr()?;

        self.state.activate();

        let ctx = DnsContext {
            resolver: self.resolver.clone(),
            forwarder: Forwarder::new(self.config.upstream)
                .with_timeout(self.config.forward_timeout()),
            local_addr: self.local_addr.clone(),
            stats: self.stats.clone(),
        };

        let mut tasks = vec![
            tokio::spawn(dns.run(ctx, self.state.subscribe())),
            tokio::spawn(http.run(
                Arc::from(self.config.target_url.as_str()),
                self.stats.clone(),
                self.state.subscribe(),
            )),
        ];

        if let Some(interval) = self.config.stats_interval() {
            tasks.push(tokio::spawn(report_stats(
                self.stats.clone(),
                interval,
                self.state.subscribe(),
            )));
        }

        self.running = Some(Running {
            dns_addr,
            http_addr,
            tasks,
        });

        info!(
            dns = %dns_addr,
            http = %http_addr,
            upstream = %self.config.upstream,
            whitelist = self.resolver.whitelist_len(),
            "Captive Portal started"
        );

        Ok(())
    }

    /// Stop both servers and wait for their tasks to finish.
    ///
    /// Safe to call any number of times.
    pub async fn stop(&mut self) {
        self.state.deactivate();

        let Some(running) = self.running.take() else {
            return;
        };

        for result in join_all(running.tasks).await {
            if let Err(e) = result {
                warn!("Portal task failed: {}", e);
            }
        }

        info!("Captive Portal stopped");
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Address the DNS interceptor is bound to, while running.
    pub fn dns_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.dns_addr)
    }

    /// Address the HTTP redirector is bound to, while running.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.http_addr)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

/// Log counters every `interval` until the portal stops.
async fn report_stats(stats: Arc<Stats>, interval: std::time::Duration, mut active: ActiveFlag) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip first immediate tick

    while active.is_active() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = active.cleared() => break,
        }

        let stats = stats.snapshot_and_reset();
        info!(
            uptime_secs = stats.uptime_secs,
            hijacked = stats.hijacked,
            forwarded = stats.forwarded,
            forward_failed = stats.forward_failed,
            redirected = stats.redirected,
            errors = stats.errors,
            avg_upstream_ms = %format!("{:.2}", stats.avg_upstream_ms),
            "stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn local_config() -> PortalConfig {
        let mut config = PortalConfig::new("https://example.com/", ["example.com"]);
        config.dns_bind = "127.0.0.1:0".parse().unwrap();
        config.http_bind = Some("127.0.0.1:0".parse().unwrap());
        config.forward_bind = Some(Ipv4Addr::LOCALHOST);
        config.stats_interval_secs = 0;
        config
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = PortalConfig::new("", Vec::<String>::new());

        assert!(CaptivePortal::new(config).is_err());
    }

    #[tokio::test]
    async fn start_binds_and_stop_joins() {
        let mut portal = CaptivePortal::new(local_config()).unwrap();
        assert!(!portal.is_active());
        assert!(portal.dns_addr().is_none());

        portal.start().await.unwrap();
        assert!(portal.is_active());
        assert!(portal.dns_addr().unwrap().port() != 0);
        assert!(portal.http_addr().unwrap().port() != 0);

        portal.stop().await;
        assert!(!portal.is_active());
        assert!(portal.dns_addr().is_none());
    }

    #[tokio::test]
    async fn stop_twice_is_safe() {
        let mut portal = CaptivePortal::new(local_config()).unwrap();
        portal.start().await.unwrap();

        portal.stop().await;
        assert!(!portal.is_active());
        portal.stop().await;
        assert!(!portal.is_active());
    }

    #[tokio::test]
    async fn stop_before_start_is_safe() {
        let mut portal = CaptivePortal::new(local_config()).unwrap();

        portal.stop().await;
        assert!(!portal.is_active());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut portal = CaptivePortal::new(local_config()).unwrap();
        portal.start().await.unwrap();

        assert!(matches!(portal.start().await, Err(Error::AlreadyRunning)));

        portal.stop().await;
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let mut portal = CaptivePortal::new(local_config()).unwrap();
        portal.start().await.unwrap();
        portal.stop().await;

        portal.start().await.unwrap();
        assert!(portal.is_active());
        portal.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = local_config();
        config.dns_bind = taken.local_addr().unwrap();
        let mut portal = CaptivePortal::new(config).unwrap();

        let err = portal.start().await.unwrap_err();

        assert!(matches!(err, Error::Bind { service: "DNS", .. }));
        assert!(!portal.is_active());
        assert!(portal.dns_addr().is_none());
    }

    #[tokio::test]
    async fn stats_reporter_stops_with_portal() {
        let mut config = local_config();
        config.stats_interval_secs = 1;
        let mut portal = CaptivePortal::new(config).unwrap();
        portal.start().await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), portal.stop())
            .await
            .unwrap();
    }
}
