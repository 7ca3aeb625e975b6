// ── Reachability checks ──
//
// Cheap "is anybody there" checks that gate the expensive probes:
// ICMP echo via surge-ping and plain TCP connects.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

/// Echo payload, the size `ping` sends by default.
const ECHO_PAYLOAD: [u8; 56] = [0; 56];

/// Liveness checks against a single address.
///
/// Implementations enforce the given timeout themselves and never block
/// past it.
#[async_trait]
pub trait Reachability: Send + Sync {
    /// `true` if a TCP connection to `address:port` succeeds within `timeout`.
    async fn is_port_open(&self, address: IpAddr, port: u16, timeout: Duration) -> bool;

    /// Round-trip time of a single echo request, `None` if there was no reply.
    async fn ping(&self, address: IpAddr, timeout: Duration) -> Option<Duration>;
}

/// [`Reachability`] backed by tokio sockets and ICMP echo.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReachability;

#[async_trait]
impl Reachability for SystemReachability {
    async fn is_port_open(&self, address: IpAddr, port: u16, timeout: Duration) -> bool {
        let target = SocketAddr::new(address, port);
        match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(%target, error = %e, "tcp connect failed");
                false
            }
            Err(_) => {
                debug!(%target, "tcp connect timed out");
                false
            }
        }
    }

    async fn ping(&self, address: IpAddr, timeout: Duration) -> Option<Duration> {
        match tokio::time::timeout(timeout, surge_ping::ping(address, &ECHO_PAYLOAD)).await {
            Ok(Ok((_packet, rtt))) => Some(rtt),
            Ok(Err(e)) => {
                debug!(%address, error = %e, "icmp echo failed");
                None
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reach = SystemReachability;
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();

        assert!(
            reach
                .is_port_open(localhost, port, Duration::from_secs(2))
                .await
        );

        drop(listener);
        assert!(
            !reach
                .is_port_open(localhost, port, Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn unanswered_echo_yields_none() {
        // TEST-NET-1 is never routed; without ICMP rights the socket error
        // also yields `None`.
        let rtt = SystemReachability
            .ping("192.0.2.1".parse().unwrap(), Duration::from_millis(200))
            .await;
        assert!(rtt.is_none());
    }
}
