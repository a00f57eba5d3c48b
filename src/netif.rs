//! Local network interface address lookup.
//!
//! Forwarded queries leave from the address of the interface that routes
//! to the upstream resolver. How that address is found is up to the device,
//! so the portal only depends on the [`LocalAddrSource`] trait.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use tracing::warn;

/// Source of the device's currently bound IPv4 address.
pub trait LocalAddrSource: Send + Sync {
    /// Current local address, or `0.0.0.0` when it cannot be determined.
    fn local_ipv4(&self) -> Ipv4Addr;
}

/// Always reports the same address.
impl LocalAddrSource for Ipv4Addr {
    fn local_ipv4(&self) -> Ipv4Addr {
        *self
    }
}

/// Asks the kernel which local address it would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
#[derive(Debug, Clone, Copy)]
pub struct RouteProbe {
    target: SocketAddr,
}

impl RouteProbe {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    fn probe(&self) -> std::io::Result<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(self.target)?;
        match socket.local_addr()? {
            SocketAddr::V4(addr) => Ok(*addr.ip()),
            SocketAddr::V6(addr) => Err(std::io::Error::other(format!(
                "route to {} uses IPv6 address {}",
                self.target,
                addr.ip()
            ))),
        }
    }
}

impl LocalAddrSource for RouteProbe {
    fn local_ipv4(&self) -> Ipv4Addr {
        match self.probe() {
            Ok(ip) => ip,
            Err(e) => {
                warn!(target_addr = %self.target, "Error getting local IP: {}", e);
                Ipv4Addr::UNSPECIFIED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_address_is_returned_as_is() {
        let ip = Ipv4Addr::new(10, 1, 2, 3);

        assert_eq!(ip.local_ipv4(), ip);
    }

    #[test]
    fn route_probe_finds_loopback() {
        let probe = RouteProbe::new("127.0.0.1:53".parse().unwrap());

        assert_eq!(probe.local_ipv4(), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn route_probe_falls_back_to_unspecified() {
        // No IPv4 route can reach an IPv6 target
        let probe = RouteProbe::new("[::1]:53".parse().unwrap());

        assert_eq!(probe.local_ipv4(), Ipv4Addr::UNSPECIFIED);
    }
}
