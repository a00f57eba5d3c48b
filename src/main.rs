use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portal::{CaptivePortal, PortalConfig};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Captive portal DNS interceptor and HTTP redirector", long_about = None)]
struct Args {
    /// TOML config file; command line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL every HTTP request is redirected to
    #[arg(short, long)]
    target_url: Option<String>,

    /// Domain substrings resolved through the upstream (repeat or comma separate)
    #[arg(short, long, value_delimiter = ',')]
    whitelist: Vec<String>,

    /// Upstream DNS server (host:port)
    #[arg(short, long)]
    upstream: Option<SocketAddr>,

    /// Address hijacked names resolve to
    #[arg(long)]
    portal_ip: Option<Ipv4Addr>,

    /// DNS listen address
    #[arg(long)]
    dns_bind: Option<SocketAddr>,

    /// HTTP listen address (defaults to <portal-ip>:80)
    #[arg(long)]
    http_bind: Option<SocketAddr>,

    /// Log every query and connection
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<PortalConfig> {
        let mut config = match &self.config {
            Some(path) => PortalConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let target_url = self
                    .target_url
                    .clone()
                    .context("--target-url is required without --config")?;
                PortalConfig::new(target_url, Vec::<String>::new())
            }
        };

        if let Some(target_url) = self.target_url {
            config.target_url = target_url;
        }
        if !self.whitelist.is_empty() {
            config.whitelist = self.whitelist;
        }
        if let Some(upstream) = self.upstream {
            config.upstream = upstream;
        }
        if let Some(portal_ip) = self.portal_ip {
            config.portal_ip = portal_ip;
        }
        if let Some(dns_bind) = self.dns_bind {
            config.dns_bind = dns_bind;
        }
        if let Some(http_bind) = self.http_bind {
            config.http_bind = Some(http_bind);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

async fn run(config: PortalConfig) -> Result<()> {
    let mut portal = CaptivePortal::new(config)?;
    portal.start().await.context("Failed to start portal")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    portal.stop().await;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}
