//! HTTP redirector.
//!
//! Every connection gets the same `302 Found` pointing at the enrollment
//! page. Connections are served strictly one after another: the request is
//! read, ignored, answered and closed before the next `accept`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use crate::state::ActiveFlag;
use crate::stats::Stats;

use super::{ACCEPT_PAUSE, MAX_REQUEST_SIZE, pause};

/// Pending connection queue length.
const LISTEN_BACKLOG: u32 = 3;

/// Build the redirect sent for every request.
pub fn redirect_response(target_url: &str) -> String {
    format!("HTTP/1.1 302 Found\r\nLocation: {target_url}\r\n\r\n")
}

/// TCP listener for the HTTP redirector.
pub struct HttpRedirector {
    listener: TcpListener,
}

impl HttpRedirector {
    /// Bind the listening socket with `SO_REUSEADDR`.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Redirect every connection to `target_url` until `active` is cleared.
    pub async fn run(self, target_url: Arc<str>, stats: Arc<Stats>, mut active: ActiveFlag) {
        let response = redirect_response(&target_url);

        info!(
            bind = %self.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            target = %target_url,
            "HTTP server running"
        );

        while active.is_active() {
            let accepted = tokio::select! {
                result = self.listener.accept() => result,
                _ = active.cleared() => break,
            };

            match accepted {
                Ok((client, peer)) => {
                    debug!(from = %peer, "Connection");

                    let handled = tokio::select! {
                        result = handle_connection(client, response.as_bytes()) => result,
                        _ = active.cleared() => break,
                    };

                    match handled {
                        Ok(true) => stats.record_redirected(),
                        Ok(false) => debug!(from = %peer, "Empty request, closing connection"),
                        Err(e) => {
                            warn!(from = %peer, "Request handling error: {}", e);
                            stats.record_error();
                        }
                    }
                }
                Err(e) => {
                    warn!("HTTP server error: {}", e);
                    stats.record_error();
                }
            }

            if !pause(&mut active, ACCEPT_PAUSE).await {
                break;
            }
        }

        debug!("HTTP server stopped");
    }
}

/// Handle a single connection: read the request, answer, close.
///
/// Returns `false` when the client sent nothing.
async fn handle_connection(mut client: TcpStream, response: &[u8]) -> io::Result<bool> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];

    let len = client.read(&mut buf).await?;
    if len == 0 {
        return Ok(false);
    }

    client.write_all(response).await?;
    client.shutdown().await?;

    Ok(true)
}
