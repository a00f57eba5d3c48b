//! Network loops of the portal.
//!
//! [`dns::DnsInterceptor`] owns the UDP DNS port and [`http::HttpRedirector`]
//! owns the TCP HTTP port. Each runs as its own task until its
//! [`ActiveFlag`](crate::state::ActiveFlag) is cleared.

pub mod dns;
pub mod http;

use std::time::Duration;

use crate::state::ActiveFlag;

/// Largest DNS datagram or HTTP request read from a client.
pub const MAX_REQUEST_SIZE: usize = 1024;

/// Pause after a failed DNS iteration.
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Pause between HTTP connections.
pub const ACCEPT_PAUSE: Duration = Duration::from_millis(100);

/// Sleep for `duration` unless `active` is cleared first.
///
/// Returns `false` when the loop should stop.
pub(crate) async fn pause(active: &mut ActiveFlag, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => active.is_active(),
        _ = active.cleared() => false,
    }
}
