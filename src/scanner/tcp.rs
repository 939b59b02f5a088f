//! TCP connect probe.
//!
//! Uses the operating system's `connect()` to attempt a full handshake.
//! An established connection is closed at once without sending data.

use crate::error::ProbeError;
use crate::scanner::traits::{PortResult, PortState, Prober, Protocol};
use crate::types::Port;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect prober.
///
/// - Established ⇒ OPEN
/// - Refused (RST) ⇒ CLOSED
/// - Anything else, including the deadline passing ⇒ ERROR
///
/// Does not require elevated privileges.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }

    async fn attempt_connect(addr: SocketAddr, deadline: Duration) -> Result<PortState, ProbeError> {
        match timeout(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(PortState::Open)
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(PortState::Closed),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, ip: IpAddr, port: Port, deadline: Duration) -> PortResult {
        let addr = SocketAddr::new(ip, port.as_u16());
        let start = Instant::now();

        match Self::attempt_connect(addr, deadline).await {
            Ok(state) => PortResult::new(Protocol::Tcp, port, state, start.elapsed()),
            Err(e) => {
                tracing::trace!(%addr, error = %e, "tcp probe failed");
                PortResult::failed(Protocol::Tcp, port, e, start.elapsed())
            }
        }
    }
}
