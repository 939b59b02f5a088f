//! Scanner module - probe strategies and the engine that schedules them.
//!
//! Jobs are built from a port set and the requested protocols, then handed
//! to a [`ScanEngine`] which runs them concurrently and streams results.

pub mod engine;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use engine::{ScanEngine, ScanStream};
pub use rate_limiter::RateLimiter;
pub use tcp::TcpProber;
pub use traits::{PortResult, PortState, Prober, Protocol, ScanJob};
pub use udp::UdpProber;

use crate::config::timing;
use crate::error::{ScanError, ScanResult};
use crate::report::{ProgressEvent, ResultAggregator, ScanReport};
use crate::types::{expand, PortSet, Target};
use tokio_util::sync::CancellationToken;

/// Cross product of ports and protocols, ascending by port with TCP before
/// UDP for each port. Duplicate protocols are ignored.
pub fn build_jobs(ports: &PortSet, protocols: &[Protocol]) -> Vec<ScanJob> {
    let selected: Vec<Protocol> = Protocol::ALL
        .iter()
        .copied()
        .filter(|p| protocols.contains(p))
        .collect();

    ports
        .iter()
        .flat_map(|port| selected.iter().map(move |&protocol| ScanJob::new(port, protocol)))
        .collect()
}

/// Everything needed to run one scan, before validation.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Already-resolved target.
    pub target: Target,
    /// Protocols to probe.
    pub protocols: Vec<Protocol>,
    /// Port specification; `None` selects the common-ports list.
    pub ports: Option<String>,
    /// Timing level, 1-5.
    pub timing_level: u8,
    /// Override of the profile's worker count.
    pub workers: Option<usize>,
    /// Global probe rate cap, 0 for none.
    pub max_rate: u32,
}

impl ScanRequest {
    /// A TCP scan of the common ports at the default timing level.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            protocols: vec![Protocol::Tcp],
            ports: None,
            timing_level: timing::DEFAULT_LEVEL,
            workers: None,
            max_rate: 0,
        }
    }

    pub fn with_protocols(mut self, protocols: impl Into<Vec<Protocol>>) -> Self {
        self.protocols = protocols.into();
        self
    }

    pub fn with_ports(mut self, spec: impl Into<String>) -> Self {
        self.ports = Some(spec.into());
        self
    }

    pub fn with_timing(mut self, level: u8) -> Self {
        self.timing_level = level;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.max_rate = per_second;
        self
    }

    /// Validate the request and build the engine and its job list.
    ///
    /// Fails before anything touches the network.
    pub fn prepare(self) -> ScanResult<PreparedScan> {
        let mut profile = timing::resolve(self.timing_level)?;
        if let Some(workers) = self.workers {
            profile = profile.with_max_workers(workers)?;
        }

        let ports = expand(self.ports.as_deref())?;
        let jobs = build_jobs(&ports, &self.protocols);
        if jobs.is_empty() {
            return Err(ScanError::NoProtocols);
        }

        let mut protocols = self.protocols;
        protocols.sort_unstable();
        protocols.dedup();

        let engine = ScanEngine::new(self.target, profile).with_rate_limit(self.max_rate);
        Ok(PreparedScan {
            engine,
            jobs,
            protocols,
        })
    }
}

/// A validated scan, ready to run.
pub struct PreparedScan {
    engine: ScanEngine,
    jobs: Vec<ScanJob>,
    protocols: Vec<Protocol>,
}

impl PreparedScan {
    pub fn engine(&self) -> &ScanEngine {
        &self.engine
    }

    pub fn jobs(&self) -> &[ScanJob] {
        &self.jobs
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Run every job and build the report.
    ///
    /// Cancelling `cancel` stops dispatch; the report is then partial.
    pub async fn run(
        self,
        cancel: CancellationToken,
        on_event: impl FnMut(ProgressEvent),
    ) -> ScanReport {
        let aggregator = ResultAggregator::new(
            self.engine.target().clone(),
            *self.engine.profile(),
            self.protocols,
            self.jobs.len(),
        );

        let stream = self.engine.with_cancellation(cancel).run(self.jobs);
        aggregator.consume(stream, on_event).await
    }
}

/// Execute a complete scan.
///
/// Validation errors are returned before any probe is sent. Once scanning
/// starts a report is always produced; cancelling `cancel` yields a partial one.
pub async fn run_scan(
    request: ScanRequest,
    cancel: CancellationToken,
    on_event: impl FnMut(ProgressEvent),
) -> ScanResult<ScanReport> {
    let prepared = request.prepare()?;
    Ok(prepared.run(cancel, on_event).await)
}
