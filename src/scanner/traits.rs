//! Probe abstraction and result types.
//!
//! Defines a common interface for the per-protocol probe strategies,
//! enabling the engine to dispatch jobs without knowing how a port is tested.

use crate::error::ProbeError;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Transport protocol a job probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Both protocols, in dispatch order.
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.pad("TCP"),
            Self::Udp => f.pad("UDP"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(format!("unknown protocol: {}", s)),
        }
    }
}

/// Classification of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    /// A handshake completed or a datagram came back.
    Open,
    /// The host actively refused or reported the port unreachable.
    Closed,
    /// UDP only: nothing came back before the deadline.
    OpenOrFiltered,
    /// The probe could not reach a verdict.
    Error,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.pad("open"),
            Self::Closed => f.pad("closed"),
            Self::OpenOrFiltered => f.pad("open|filtered"),
            Self::Error => f.pad("error"),
        }
    }
}

/// Outcome of probing one (port, protocol) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortResult {
    pub port: Port,
    pub protocol: Protocol,
    pub state: PortState,
    /// Time from probe start to verdict.
    #[serde(rename = "latency_ms", serialize_with = "as_millis")]
    pub latency: Duration,
    /// Why the probe failed, for ERROR results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortResult {
    /// Create a new port result.
    pub fn new(protocol: Protocol, port: Port, state: PortState, latency: Duration) -> Self {
        Self {
            port,
            protocol,
            state,
            latency,
            error: None,
        }
    }

    /// An ERROR result carrying the failure reason.
    pub fn failed(protocol: Protocol, port: Port, error: ProbeError, latency: Duration) -> Self {
        Self {
            port,
            protocol,
            state: PortState::Error,
            latency,
            error: Some(error.to_string()),
        }
    }

    /// Check if the port answered.
    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// A unit of scheduling: one probe to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanJob {
    pub port: Port,
    pub protocol: Protocol,
}

impl ScanJob {
    pub fn new(port: Port, protocol: Protocol) -> Self {
        Self { port, protocol }
    }
}

/// A probe strategy for one protocol.
///
/// Implementations are a single bounded operation: they must return within
/// roughly `timeout` and always produce a result, reporting failures as
/// [`PortState::Error`] rather than panicking or erroring out.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Protocol this prober speaks.
    fn protocol(&self) -> Protocol;

    /// Probe a single port.
    async fn probe(&self, ip: IpAddr, port: Port, timeout: Duration) -> PortResult;
}
