//! Listener acquisition with fallback to successive ports.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;
use tracing::{debug, info};

use super::error::RelayError;

/// Binds `host:preferred`, moving to the next port while the address is in use.
///
/// At most `max_attempts` consecutive ports are tried (never past 65535). Any
/// error other than address-in-use is returned immediately. The returned
/// listener's `local_addr()` is the port that actually bound.
pub async fn bind_with_retry(
    host: IpAddr,
    preferred: u16,
    max_attempts: u16,
) -> Result<TcpListener, RelayError> {
    let attempts = max_attempts.max(1);
    let last = preferred.saturating_add(attempts - 1);

    for port in preferred..=last {
        match TcpListener::bind(SocketAddr::new(host, port)).await {
            Ok(listener) => {
                if port != preferred {
                    info!(preferred, port, "Preferred relay port busy, bound fallback port");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                debug!(port, "Relay port in use, trying next");
            }
            Err(source) => return Err(RelayError::Bind { port, source }),
        }
    }

    Err(RelayError::PortsExhausted {
        start: preferred,
        end: last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_binds_preferred_port_when_free() {
        // let the OS pick a free port, release it, then ask for it explicitly
        let listener = std::net::TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let listener = bind_with_retry(LOCALHOST, port, 1).await.unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_single_attempt_on_busy_port_names_range() {
        let occupied = std::net::TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = occupied.local_addr().unwrap().port();

        let err = bind_with_retry(LOCALHOST, port, 1).await.unwrap_err();
        match err {
            RelayError::PortsExhausted { start, end } => {
                assert_eq!(start, port);
                assert_eq!(end, port);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        // 203.0.113.0/24 is TEST-NET-3 and never assigned to a local interface
        let foreign: IpAddr = "203.0.113.7".parse().unwrap();
        let err = bind_with_retry(foreign, 40000, 5).await.unwrap_err();
        assert!(matches!(err, RelayError::Bind { port: 40000, .. }));
    }
}
