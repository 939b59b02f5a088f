//! Scan reports and the aggregator that builds them.
//!
//! The [`ResultAggregator`] consumes a [`ScanStream`], keeps every result,
//! and emits [`ProgressEvent`]s so a front end can show live feedback
//! without reaching into the engine.

use crate::config::TimingProfile;
use crate::scanner::{PortResult, PortState, Protocol, ScanStream};
use crate::types::{Port, Target};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;

/// Live feedback emitted while results arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Another job finished.
    Completed { completed: usize, total: usize },
    /// A job found an open port. Sent before the matching `Completed`.
    OpenPort(PortResult),
}

/// Whether every job ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completion {
    Complete,
    /// Cancelled before every job was dispatched.
    Partial { not_dispatched: usize },
}

/// Ports of one protocol grouped by state, each list ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolSummary {
    pub open: Vec<Port>,
    pub closed: Vec<Port>,
    pub open_or_filtered: Vec<Port>,
    pub error: Vec<Port>,
}

impl ProtocolSummary {
    fn push(&mut self, state: PortState, port: Port) {
        match state {
            PortState::Open => self.open.push(port),
            PortState::Closed => self.closed.push(port),
            PortState::OpenOrFiltered => self.open_or_filtered.push(port),
            PortState::Error => self.error.push(port),
        }
    }

    /// Number of ports classified in this summary.
    pub fn len(&self) -> usize {
        self.open.len() + self.closed.len() + self.open_or_filtered.len() + self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Final result of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: Target,
    pub timing: TimingProfile,
    pub protocols: Vec<Protocol>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_jobs: usize,
    pub completion: Completion,
    pub summaries: BTreeMap<Protocol, ProtocolSummary>,
    /// Every result, ordered by protocol then port.
    pub results: Vec<PortResult>,
}

impl ScanReport {
    /// Whether the scan was cut short.
    pub fn is_partial(&self) -> bool {
        matches!(self.completion, Completion::Partial { .. })
    }

    /// Jobs that never ran.
    pub fn not_dispatched(&self) -> usize {
        match self.completion {
            Completion::Complete => 0,
            Completion::Partial { not_dispatched } => not_dispatched,
        }
    }

    /// Jobs that produced a result.
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    pub fn summary(&self, protocol: Protocol) -> Option<&ProtocolSummary> {
        self.summaries.get(&protocol)
    }

    /// Classification of one port, if it was probed.
    pub fn state_of(&self, protocol: Protocol, port: u16) -> Option<PortState> {
        self.results
            .iter()
            .find(|r| r.protocol == protocol && r.port.as_u16() == port)
            .map(|r| r.state)
    }

    /// Count of results in a given state across protocols.
    pub fn count(&self, state: PortState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    pub fn has_open(&self) -> bool {
        self.results.iter().any(PortResult::is_open)
    }

    /// True when results exist and every one of them is an error.
    pub fn all_errored(&self) -> bool {
        !self.results.is_empty() && self.count(PortState::Error) == self.results.len()
    }

    /// Wall-clock duration of the scan.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// One-line summary of the scan.
    pub fn headline(&self) -> String {
        format!(
            "{} - {} open, {} open|filtered, {} closed, {} errors [{:.2}s]",
            self.target,
            self.count(PortState::Open),
            self.count(PortState::OpenOrFiltered),
            self.count(PortState::Closed),
            self.count(PortState::Error),
            self.duration().num_milliseconds() as f64 / 1000.0
        )
    }
}

/// Builds a [`ScanReport`] from results as they arrive.
pub struct ResultAggregator {
    target: Target,
    timing: TimingProfile,
    protocols: Vec<Protocol>,
    total: usize,
    started_at: DateTime<Utc>,
    results: Vec<PortResult>,
}

impl ResultAggregator {
    pub fn new(
        target: Target,
        timing: TimingProfile,
        protocols: Vec<Protocol>,
        total_jobs: usize,
    ) -> Self {
        Self {
            target,
            timing,
            protocols,
            total: total_jobs,
            started_at: Utc::now(),
            results: Vec::with_capacity(total_jobs),
        }
    }

    /// Record one result and report what changed.
    pub fn record(&mut self, result: PortResult, mut on_event: impl FnMut(ProgressEvent)) {
        if result.is_open() {
            on_event(ProgressEvent::OpenPort(result.clone()));
        }
        self.results.push(result);
        on_event(ProgressEvent::Completed {
            completed: self.results.len(),
            total: self.total,
        });
    }

    /// Results recorded so far.
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    /// Drain a scan stream to its end and build the report.
    pub async fn consume(
        mut self,
        mut stream: ScanStream,
        mut on_event: impl FnMut(ProgressEvent),
    ) -> ScanReport {
        while let Some(result) = stream.next().await {
            self.record(result, &mut on_event);
        }

        let completion = if stream.was_cancelled() {
            Completion::Partial {
                not_dispatched: stream.not_dispatched(),
            }
        } else {
            Completion::Complete
        };
        self.finish(completion)
    }

    /// Seal the report.
    pub fn finish(mut self, completion: Completion) -> ScanReport {
        self.results.sort_by_key(|r| (r.protocol, r.port));

        let mut summaries: BTreeMap<Protocol, ProtocolSummary> = self
            .protocols
            .iter()
            .map(|&p| (p, ProtocolSummary::default()))
            .collect();
        for result in &self.results {
            summaries
                .entry(result.protocol)
                .or_default()
                .push(result.state, result.port);
        }

        ScanReport {
            target: self.target,
            timing: self.timing,
            protocols: self.protocols,
            started_at: self.started_at,
            finished_at: Utc::now(),
            total_jobs: self.total,
            completion,
            summaries,
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn result(protocol: Protocol, port: u16, state: PortState) -> PortResult {
        PortResult::new(protocol, Port::new(port).unwrap(), state, Duration::from_millis(1))
    }

    fn aggregator(total: usize) -> ResultAggregator {
        ResultAggregator::new(
            Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            TimingProfile::default(),
            vec![Protocol::Tcp, Protocol::Udp],
            total,
        )
    }

    fn ports(list: &[Port]) -> Vec<u16> {
        list.iter().map(|p| p.as_u16()).collect()
    }

    #[test]
    fn test_partitions_are_sorted_per_protocol() {
        let mut agg = aggregator(5);
        for r in [
            result(Protocol::Tcp, 443, PortState::Open),
            result(Protocol::Udp, 53, PortState::OpenOrFiltered),
            result(Protocol::Tcp, 22, PortState::Open),
            result(Protocol::Tcp, 80, PortState::Closed),
            result(Protocol::Udp, 161, PortState::Error),
        ] {
            agg.record(r, |_| {});
        }
        let report = agg.finish(Completion::Complete);

        let tcp = report.summary(Protocol::Tcp).unwrap();
        assert_eq!(ports(&tcp.open), vec![22, 443]);
        assert_eq!(ports(&tcp.closed), vec![80]);
        let udp = report.summary(Protocol::Udp).unwrap();
        assert_eq!(ports(&udp.open_or_filtered), vec![53]);
        assert_eq!(ports(&udp.error), vec![161]);

        let order: Vec<_> = report.results.iter().map(|r| (r.protocol, r.port.as_u16())).collect();
        assert_eq!(
            order,
            vec![
                (Protocol::Tcp, 22),
                (Protocol::Tcp, 80),
                (Protocol::Tcp, 443),
                (Protocol::Udp, 53),
                (Protocol::Udp, 161),
            ]
        );
        assert!(!report.is_partial());
        assert!(report.has_open());
    }

    #[test]
    fn test_progress_events() {
        let mut agg = aggregator(2);
        let mut events = Vec::new();
        agg.record(result(Protocol::Tcp, 80, PortState::Closed), |e| events.push(e));
        agg.record(result(Protocol::Tcp, 22, PortState::Open), |e| events.push(e));

        assert_eq!(
            events,
            vec![
                ProgressEvent::Completed { completed: 1, total: 2 },
                ProgressEvent::OpenPort(result(Protocol::Tcp, 22, PortState::Open)),
                ProgressEvent::Completed { completed: 2, total: 2 },
            ]
        );
    }

    #[test]
    fn test_partial_report() {
        let mut agg = aggregator(10);
        agg.record(result(Protocol::Tcp, 1, PortState::Closed), |_| {});
        let report = agg.finish(Completion::Partial { not_dispatched: 9 });

        assert!(report.is_partial());
        assert_eq!(report.not_dispatched(), 9);
        assert_eq!(report.completed() + report.not_dispatched(), report.total_jobs);
    }

    #[test]
    fn test_no_open_ports_vs_all_errors() {
        let mut quiet = aggregator(1);
        quiet.record(result(Protocol::Tcp, 1, PortState::Closed), |_| {});
        let quiet = quiet.finish(Completion::Complete);
        assert!(!quiet.has_open());
        assert!(!quiet.all_errored());

        let mut broken = aggregator(1);
        broken.record(result(Protocol::Tcp, 1, PortState::Error), |_| {});
        let broken = broken.finish(Completion::Complete);
        assert!(broken.all_errored());
    }

    #[test]
    fn test_report_serialization() {
        let mut agg = aggregator(1);
        agg.record(result(Protocol::Udp, 53, PortState::Open), |_| {});
        let report = agg.finish(Completion::Partial { not_dispatched: 0 });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["completion"]["status"], "partial");
        assert_eq!(json["summaries"]["udp"]["open"][0], 53);
        assert_eq!(json["summaries"]["tcp"]["open"].as_array().map(Vec::len), Some(0));
        assert_eq!(json["target"]["ip"], "127.0.0.1");
    }
}
