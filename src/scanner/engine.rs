//! Scan engine.
//!
//! Fans a job list out over a fixed number of worker slots and streams
//! results back as they complete. Capacity is a semaphore sized from the
//! timing profile: a permit is taken before a job is spawned and released
//! when its result has been handed to the stream.
//!
//! Dispatch order follows the job list; completion order does not.

use crate::config::TimingProfile;
use crate::error::ProbeError;
use crate::scanner::rate_limiter::RateLimiter;
use crate::scanner::tcp::TcpProber;
use crate::scanner::traits::{PortResult, Prober, Protocol, ScanJob};
use crate::scanner::udp::UdpProber;
use crate::types::Target;
use futures::{FutureExt, Stream};
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Slack on top of the profile timeout before the engine gives up on a probe.
pub const PROBE_GRACE: Duration = Duration::from_millis(250);

/// Drives a set of scan jobs against one target.
pub struct ScanEngine {
    target: Target,
    profile: TimingProfile,
    tcp: Arc<dyn Prober>,
    udp: Arc<dyn Prober>,
    rate_limiter: Option<RateLimiter>,
    cancel: CancellationToken,
}

impl ScanEngine {
    /// Create an engine using the TCP connect and UDP probers.
    pub fn new(target: Target, profile: TimingProfile) -> Self {
        Self {
            target,
            profile,
            tcp: Arc::new(TcpProber::new()),
            udp: Arc::new(UdpProber::new()),
            rate_limiter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the prober used for its protocol.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        match prober.protocol() {
            Protocol::Tcp => self.tcp = prober,
            Protocol::Udp => self.udp = prober,
        }
        self
    }

    /// Cap probes per second across all workers. Zero leaves it uncapped.
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limiter = RateLimiter::new(per_second);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops dispatching when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn profile(&self) -> &TimingProfile {
        &self.profile
    }

    /// Start the scan and return the stream of results.
    ///
    /// Must be called from within a tokio runtime. The stream yields one
    /// result per dispatched job and ends once every dispatched job has
    /// reported; it cannot be restarted.
    pub fn run(self, jobs: Vec<ScanJob>) -> ScanStream {
        let total = jobs.len();
        let workers = self.profile.max_workers.max(1);
        let (tx, rx) = mpsc::channel(workers);
        let progress = Arc::new(DispatchProgress::default());
        let cancel = self.cancel.clone();

        debug!(
            host = %self.target,
            jobs = total,
            workers,
            timeout_ms = self.profile.timeout.as_millis() as u64,
            delay_ms = self.profile.inter_probe_delay.as_millis() as u64,
            "starting scan"
        );

        let dispatcher = Dispatcher {
            worker: Arc::new(Worker {
                ip: self.target.ip,
                profile: self.profile,
                tcp: self.tcp,
                udp: self.udp,
            }),
            slots: Arc::new(Semaphore::new(workers)),
            rate_limiter: self.rate_limiter,
            cancel: self.cancel,
            progress: Arc::clone(&progress),
        };
        tokio::spawn(dispatcher.dispatch(jobs, tx));

        ScanStream {
            rx,
            total,
            progress,
            cancel,
        }
    }
}

/// Counters the dispatcher publishes for the stream's consumer.
#[derive(Debug, Default)]
struct DispatchProgress {
    dispatched: AtomicUsize,
    cancelled: AtomicBool,
}

struct Dispatcher {
    worker: Arc<Worker>,
    slots: Arc<Semaphore>,
    rate_limiter: Option<RateLimiter>,
    cancel: CancellationToken,
    progress: Arc<DispatchProgress>,
}

impl Dispatcher {
    async fn dispatch(self, jobs: Vec<ScanJob>, tx: mpsc::Sender<PortResult>) {
        let total = jobs.len();

        for job in jobs {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tx.closed() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if let Some(limiter) = &self.rate_limiter {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tx.closed() => break,
                    _ = limiter.wait() => {}
                }
            }

            self.progress.dispatched.fetch_add(1, Ordering::SeqCst);
            trace!(port = %job.port, protocol = %job.protocol, "dispatch");

            let worker = Arc::clone(&self.worker);
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let result = worker.execute(job).await;
                // A dropped stream just means nobody is listening any more.
                let _ = tx.send(result).await;
            });
        }

        let dispatched = self.progress.dispatched.load(Ordering::SeqCst);
        if self.cancel.is_cancelled() && dispatched < total {
            self.progress.cancelled.store(true, Ordering::SeqCst);
            info!(
                dispatched,
                not_dispatched = total - dispatched,
                "scan cancelled, waiting for in-flight probes"
            );
        } else if tx.is_closed() && dispatched < total {
            debug!(dispatched, "result stream dropped, stopping dispatch");
        } else {
            debug!(dispatched, "all jobs dispatched");
        }
    }
}

/// Runs one job: pacing, then exactly one probe under a hard deadline.
struct Worker {
    ip: IpAddr,
    profile: TimingProfile,
    tcp: Arc<dyn Prober>,
    udp: Arc<dyn Prober>,
}

impl Worker {
    async fn execute(&self, job: ScanJob) -> PortResult {
        if !self.profile.inter_probe_delay.is_zero() {
            tokio::time::sleep(self.profile.inter_probe_delay).await;
        }

        let prober = match job.protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };

        let start = Instant::now();
        let probe = AssertUnwindSafe(prober.probe(self.ip, job.port, self.profile.timeout))
            .catch_unwind();

        match tokio::time::timeout(self.profile.timeout + PROBE_GRACE, probe).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!(port = %job.port, protocol = %job.protocol, "probe panicked");
                PortResult::failed(
                    job.protocol,
                    job.port,
                    ProbeError::Aborted("probe panicked".to_string()),
                    start.elapsed(),
                )
            }
            Err(_) => {
                warn!(port = %job.port, protocol = %job.protocol, "probe overran its deadline");
                PortResult::failed(job.protocol, job.port, ProbeError::Timeout, start.elapsed())
            }
        }
    }
}

/// Lazily produced results of a running scan.
///
/// Implements [`Stream`]; the stream ends when every dispatched job has
/// reported. Dispatch counters are final once the stream has ended.
pub struct ScanStream {
    rx: mpsc::Receiver<PortResult>,
    total: usize,
    progress: Arc<DispatchProgress>,
    cancel: CancellationToken,
}

impl ScanStream {
    /// Number of jobs handed to the engine.
    pub fn total_jobs(&self) -> usize {
        self.total
    }

    /// Jobs dispatched to a worker so far.
    pub fn dispatched(&self) -> usize {
        self.progress.dispatched.load(Ordering::SeqCst)
    }

    /// Jobs that were never dispatched.
    pub fn not_dispatched(&self) -> usize {
        self.total - self.dispatched()
    }

    /// Whether dispatching stopped early because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.progress.cancelled.load(Ordering::SeqCst)
    }

    /// Stop dispatching new jobs. In-flight probes still report.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ScanStream {
    type Item = PortResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::traits::PortState;
    use crate::types::Port;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    /// Fake prober that sleeps and records how many probes overlap.
    struct CountingProber {
        protocol: Protocol,
        work: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<u16>>,
    }

    impl CountingProber {
        fn new(protocol: Protocol, work: Duration) -> Arc<Self> {
            Arc::new(Self {
                protocol,
                work,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                order: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Prober for CountingProber {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn probe(&self, _ip: IpAddr, port: Port, _timeout: Duration) -> PortResult {
            self.order.lock().unwrap().push(port.as_u16());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            PortResult::new(self.protocol, port, PortState::Open, self.work)
        }
    }

    struct PanickingProber;

    #[async_trait]
    impl Prober for PanickingProber {
        fn protocol(&self) -> Protocol {
            Protocol::Tcp
        }

        async fn probe(&self, _ip: IpAddr, _port: Port, _timeout: Duration) -> PortResult {
            panic!("boom");
        }
    }

    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        fn protocol(&self) -> Protocol {
            Protocol::Udp
        }

        async fn probe(&self, _ip: IpAddr, port: Port, _timeout: Duration) -> PortResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            PortResult::new(Protocol::Udp, port, PortState::Open, Duration::ZERO)
        }
    }

    fn profile(workers: usize, delay_ms: u64) -> TimingProfile {
        TimingProfile {
            level: 3,
            timeout: Duration::from_millis(100),
            max_workers: workers,
            inter_probe_delay: Duration::from_millis(delay_ms),
        }
    }

    fn target() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn jobs(ports: std::ops::RangeInclusive<u16>, protocols: &[Protocol]) -> Vec<ScanJob> {
        ports
            .filter_map(Port::new)
            .flat_map(|p| protocols.iter().map(move |&proto| ScanJob::new(p, proto)))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_workers() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::from_millis(10));
        let engine = ScanEngine::new(target(), profile(4, 0)).with_prober(tcp.clone());

        let results: Vec<_> = engine.run(jobs(1..=60, &[Protocol::Tcp])).collect().await;

        assert_eq!(results.len(), 60);
        let peak = tcp.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak {} exceeded 4 workers", peak);
        assert!(peak >= 2);
    }

    #[tokio::test]
    async fn test_one_result_per_job() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::from_millis(1));
        let udp = CountingProber::new(Protocol::Udp, Duration::from_millis(3));
        let engine = ScanEngine::new(target(), profile(8, 0))
            .with_prober(tcp)
            .with_prober(udp);

        let submitted = jobs(100..=149, &Protocol::ALL);
        let expected: HashSet<_> = submitted.iter().copied().collect();
        let mut stream = engine.run(submitted);

        let mut seen = HashSet::new();
        while let Some(result) = stream.next().await {
            assert!(seen.insert(ScanJob::new(result.port, result.protocol)));
        }

        assert_eq!(seen, expected);
        assert_eq!(stream.dispatched(), 100);
        assert_eq!(stream.not_dispatched(), 0);
        assert!(!stream.was_cancelled());
    }

    #[tokio::test]
    async fn test_dispatch_follows_job_order() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::ZERO);
        let engine = ScanEngine::new(target(), profile(1, 0)).with_prober(tcp.clone());

        let _: Vec<_> = engine.run(jobs(20..=30, &[Protocol::Tcp])).collect().await;

        let order = tcp.order.lock().unwrap().clone();
        assert_eq!(order, (20..=30).collect::<Vec<u16>>());
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::from_millis(20));
        let engine = ScanEngine::new(target(), profile(2, 0)).with_prober(tcp);

        let mut stream = engine.run(jobs(1..=200, &[Protocol::Tcp]));
        let mut completed = 0;
        while stream.next().await.is_some() {
            completed += 1;
            if completed == 3 {
                stream.cancel();
            }
        }

        assert!(stream.was_cancelled());
        assert!(stream.not_dispatched() > 0);
        assert_eq!(completed, stream.dispatched());
        assert_eq!(completed + stream.not_dispatched(), 200);
    }

    #[tokio::test]
    async fn test_cancel_before_run_dispatches_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = ScanEngine::new(target(), profile(4, 0)).with_cancellation(token);

        let mut stream = engine.run(jobs(1..=10, &[Protocol::Tcp]));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.not_dispatched(), 10);
        assert!(stream.was_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_probe_becomes_error() {
        let engine =
            ScanEngine::new(target(), profile(2, 0)).with_prober(Arc::new(PanickingProber));

        let results: Vec<_> = engine.run(jobs(1..=3, &[Protocol::Tcp])).collect().await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.state == PortState::Error));
    }

    #[tokio::test]
    async fn test_overrunning_probe_releases_its_slot() {
        let engine = ScanEngine::new(target(), profile(1, 0)).with_prober(Arc::new(HangingProber));

        let start = Instant::now();
        let results: Vec<_> = engine.run(jobs(1..=2, &[Protocol::Udp])).collect().await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.state == PortState::Error));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_inter_probe_delay_paces_each_worker() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::ZERO);
        let engine = ScanEngine::new(target(), profile(1, 20)).with_prober(tcp);

        let start = Instant::now();
        let results: Vec<_> = engine.run(jobs(1..=5, &[Protocol::Tcp])).collect().await;

        assert_eq!(results.len(), 5);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_dispatch() {
        let tcp = CountingProber::new(Protocol::Tcp, Duration::from_millis(10));
        let engine = ScanEngine::new(target(), profile(2, 0)).with_prober(tcp.clone());

        let mut stream = engine.run(jobs(1..=400, &[Protocol::Tcp]));
        for _ in 0..3 {
            assert!(stream.next().await.is_some());
        }
        drop(stream);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let started = tcp.order.lock().unwrap().len();
        assert!(started < 20, "{started} probes started after the stream was dropped");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tcp.order.lock().unwrap().len(), started);
    }

    #[tokio::test]
    async fn test_empty_job_list_ends_immediately() {
        let engine = ScanEngine::new(target(), profile(4, 0));
        let mut stream = engine.run(Vec::new());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.total_jobs(), 0);
    }
}
