//! Best-effort TCP reachability check for a provisioned instance

use imgtest_common::defaults::{PORT_PROBE_INTERVAL_SECS, PORT_PROBE_SETTLE_SECS};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Repeated TCP connect attempts against one address
#[derive(Debug, Clone)]
pub struct PortProbe {
    /// Pause between failed connect attempts
    pub retry_interval: Duration,
    /// Pause after the first successful connect
    pub settle_delay: Duration,
}

impl Default for PortProbe {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(PORT_PROBE_INTERVAL_SECS),
            settle_delay: Duration::from_secs(PORT_PROBE_SETTLE_SECS),
        }
    }
}

impl PortProbe {
    /// Try to connect until success or until `timeout` has elapsed.
    ///
    /// Returns `true` once a connection succeeds (after the settle delay),
    /// `false` on deadline. Connection errors are never surfaced.
    pub async fn wait(&self, address: &str, port: u16, timeout: Duration) -> bool {
        let target = format!("{address}:{port}");
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;

        info!(target_addr = %target, timeout_secs = timeout.as_secs(), "Waiting for port to open");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            attempts += 1;

            match tokio::time::timeout(remaining, TcpStream::connect(&target)).await {
                Ok(Ok(_stream)) => {
                    debug!(target_addr = %target, attempts, "Port is open");
                    tokio::time::sleep(self.settle_delay).await;
                    return true;
                }
                Ok(Err(e)) => {
                    debug!(target_addr = %target, attempt = attempts, error = %e, "Connect failed");
                }
                Err(_) => break,
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.retry_interval.min(remaining)).await;
        }

        warn!(target_addr = %target, attempts, "Port did not open before the deadline");
        false
    }
}

/// Wait for `address:port` to accept TCP connections using the default
/// probe intervals.
pub async fn wait_for_port(address: &str, port: u16, timeout: Duration) -> bool {
    PortProbe::default().wait(address, port, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast_probe() -> PortProbe {
        PortProbe {
            retry_interval: Duration::from_millis(20),
            settle_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_open_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(
            fast_probe()
                .wait("127.0.0.1", port, Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn test_closed_port_returns_false() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let start = std::time::Instant::now();
        let open = fast_probe()
            .wait("127.0.0.1", port, Duration::from_millis(200))
            .await;
        assert!(!open);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_port_opening_late_is_detected() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            let _ = listener.accept().await;
        });

        assert!(
            fast_probe()
                .wait("127.0.0.1", port, Duration::from_secs(3))
                .await
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_zero_timeout_never_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!wait_for_port("127.0.0.1", port, Duration::ZERO).await);
    }
}
