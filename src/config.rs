//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Address handed out for hijacked names (USB network gateway).
pub const DEFAULT_PORTAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 43, 1);

/// Port the redirector listens on when no HTTP bind address is given.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Configuration for the captive portal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// URL every HTTP request is redirected to (e.g., "https://example.com/").
    pub target_url: String,

    /// Domain substrings resolved through the upstream resolver.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Upstream DNS resolver address.
    #[serde(default = "default_upstream")]
    pub upstream: SocketAddr,

    /// Address returned for every hijacked name.
    #[serde(default = "default_portal_ip")]
    pub portal_ip: Ipv4Addr,

    /// Where the DNS interceptor listens.
    #[serde(default = "default_dns_bind")]
    pub dns_bind: SocketAddr,

    /// Where the HTTP redirector listens. Defaults to `portal_ip:80`.
    #[serde(default)]
    pub http_bind: Option<SocketAddr>,

    /// How long to wait for the upstream resolver.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Local address for forwarded queries. If None, ask the network interface.
    #[serde(default)]
    pub forward_bind: Option<Ipv4Addr>,

    /// Seconds between stats reports, 0 to disable.
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_upstream() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 53))
}

const fn default_portal_ip() -> Ipv4Addr {
    DEFAULT_PORTAL_IP
}

fn default_dns_bind() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 53))
}

const fn default_forward_timeout_ms() -> u64 {
    5000
}

const fn default_stats_interval() -> u64 {
    60
}

impl PortalConfig {
    /// Create a configuration with default addresses.
    pub fn new<I, S>(target_url: impl Into<String>, whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_url: target_url.into(),
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            upstream: default_upstream(),
            portal_ip: default_portal_ip(),
            dns_bind: default_dns_bind(),
            http_bind: None,
            forward_timeout_ms: default_forward_timeout_ms(),
            forward_bind: None,
            stats_interval_secs: default_stats_interval(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(|e| ConfigError::Validation(e).into())
    }

    fn check(&self) -> std::result::Result<(), ValidationError> {
        let url = self.target_url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyTargetUrl);
        }
        // The URL is written straight into a response header
        if self.target_url.contains(['\r', '\n']) {
            return Err(ValidationError::TargetUrlLineBreak);
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidTargetUrl {
                url: self.target_url.clone(),
            });
        }

        if self.whitelist.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ValidationError::EmptyWhitelistEntry);
        }

        if self.forward_timeout_ms == 0 {
            return Err(ValidationError::ZeroForwardTimeout);
        }

        Ok(())
    }

    /// Address the HTTP redirector binds to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_bind
            .unwrap_or(SocketAddr::V4(SocketAddrV4::new(self.portal_ip, DEFAULT_HTTP_PORT)))
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Interval between stats reports, None when disabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}
