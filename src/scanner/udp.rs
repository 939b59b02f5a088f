//! UDP send-and-listen probe.
//!
//! UDP has no handshake, so the verdict comes from what happens after a
//! single datagram is sent:
//!
//! 1. **Reply datagram**: port is open
//! 2. **ICMP port/destination unreachable**: port is closed
//! 3. **Silence until the deadline**: open or filtered (ambiguous)
//!
//! The socket is connected to the target so the kernel reports ICMP errors
//! on the next `recv`, which avoids the need for raw sockets.

use crate::error::ProbeError;
use crate::scanner::traits::{PortResult, PortState, Prober, Protocol};
use crate::types::Port;
use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Payload for a well-known UDP service.
struct UdpPayload {
    port: u16,
    payload: &'static [u8],
}

/// Minimal protocol-valid requests for services that ignore empty datagrams.
const UDP_PAYLOADS: &[UdpPayload] = &[
    // DNS: header-only standard query
    UdpPayload {
        port: 53,
        payload: b"\x00\x00\x10\x00\x00\x00\x00\x00\x00\x00\x00\x00",
    },
    // TFTP read request
    UdpPayload {
        port: 69,
        payload: b"\x00\x01test\x00netascii\x00",
    },
    // NTP client request (v4, mode 3)
    UdpPayload {
        port: 123,
        payload: b"\xe3\x00\x04\xfa\x00\x01\x00\x00\x00\x01\x00\x00",
    },
    // NetBIOS name query
    UdpPayload {
        port: 137,
        payload: b"\x80\xf0\x00\x10\x00\x01\x00\x00\x00\x00\x00\x00\x20CKAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\x00\x00\x21\x00\x01",
    },
    // SNMPv2c get-request for sysDescr.0, community "public"
    UdpPayload {
        port: 161,
        payload: b"\x30\x29\x02\x01\x01\x04\x06public\xa0\x1c\x02\x04\x70\x73\x77\x70\x02\x01\x00\x02\x01\x00\x30\x0e\x30\x0c\x06\x08\x2b\x06\x01\x02\x01\x01\x01\x00\x05\x00",
    },
];

/// Payload for ports without a dedicated request.
const EMPTY_PAYLOAD: &[u8] = b"";

/// Get the datagram to send to a port.
fn payload_for_port(port: u16) -> &'static [u8] {
    UDP_PAYLOADS
        .iter()
        .find(|p| p.port == port)
        .map(|p| p.payload)
        .unwrap_or(EMPTY_PAYLOAD)
}

/// True for errors that mean the far end said "nothing here".
fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable
    )
}

/// UDP prober. Exactly one send and at most one wait per probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpProber;

impl UdpProber {
    pub fn new() -> Self {
        Self
    }

    async fn exchange(addr: SocketAddr, deadline: Duration) -> Result<PortState, ProbeError> {
        let local: SocketAddr = match addr.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;

        match socket.send(payload_for_port(addr.port())).await {
            Ok(_) => {}
            Err(e) if is_unreachable(&e) => return Ok(PortState::Closed),
            Err(e) => return Err(e.into()),
        }

        let mut buf = [0u8; 1024];
        match timeout(deadline, socket.recv(&mut buf)).await {
            Ok(Ok(_)) => Ok(PortState::Open),
            Ok(Err(e)) if is_unreachable(&e) => Ok(PortState::Closed),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(PortState::OpenOrFiltered),
        }
    }
}

#[async_trait]
impl Prober for UdpProber {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn probe(&self, ip: IpAddr, port: Port, deadline: Duration) -> PortResult {
        let addr = SocketAddr::new(ip, port.as_u16());
        let start = Instant::now();

        match Self::exchange(addr, deadline).await {
            Ok(state) => PortResult::new(Protocol::Udp, port, state, start.elapsed()),
            Err(e) => {
                tracing::trace!(%addr, error = %e, "udp probe failed");
                PortResult::failed(Protocol::Udp, port, e, start.elapsed())
            }
        }
    }
}
