//! Portal - A captive portal DNS interceptor and HTTP redirector.
//!
//! Names on the whitelist resolve through a real upstream resolver; every
//! other name resolves to the portal, whose HTTP server redirects all
//! requests to the enrollment page.
//!
//! ```no_run
//! use portal::{CaptivePortal, PortalConfig};
//!
//! # async fn run() -> portal::Result<()> {
//! let config = PortalConfig::new("https://example.com/", ["example.com"]);
//! let mut portal = CaptivePortal::new(config)?;
//! portal.start().await?;
//! // ...
//! portal.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod netif;
pub mod portal;
pub mod resolver;
pub mod state;
pub mod stats;
pub mod transport;

pub use config::PortalConfig;
pub use error::{Error, Result};
pub use portal::CaptivePortal;
