//! End-to-end scans against local listeners.

use async_trait::async_trait;
use futures::StreamExt;
use portsweep::scanner::{build_jobs, run_scan, PortResult, PortState, Prober, Protocol, ScanEngine, ScanRequest};
use portsweep::types::{expand, Port, Target};
use portsweep::{Completion, ProgressEvent, ResultAggregator, TimingProfile};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;

fn localhost() -> Target {
    Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

async fn closed_tcp_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_mixed_protocol_scan_of_localhost() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_tcp = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let closed_tcp = closed_tcp_port().await;

    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let open_udp = udp.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((_, peer)) = udp.recv_from(&mut buf).await {
            let _ = udp.send_to(b"pong", peer).await;
        }
    });

    let closed_udp = {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.local_addr().unwrap().port()
    };

    let request = ScanRequest::new(localhost())
        .with_protocols([Protocol::Tcp, Protocol::Udp])
        .with_ports(format!("{},{},{},{}", open_tcp, closed_tcp, open_udp, closed_udp))
        .with_timing(3);

    let mut open_events = Vec::new();
    let mut last_completed = 0;
    let report = run_scan(request, CancellationToken::new(), |event| match event {
        ProgressEvent::OpenPort(result) => open_events.push((result.protocol, result.port.as_u16())),
        ProgressEvent::Completed { completed, .. } => last_completed = completed,
    })
    .await
    .unwrap();

    assert_eq!(report.total_jobs, 8);
    assert_eq!(report.completed(), 8);
    assert_eq!(last_completed, 8);
    assert_eq!(report.completion, Completion::Complete);

    assert_eq!(report.state_of(Protocol::Tcp, open_tcp), Some(PortState::Open));
    assert_eq!(report.state_of(Protocol::Tcp, closed_tcp), Some(PortState::Closed));
    assert_eq!(report.state_of(Protocol::Udp, open_udp), Some(PortState::Open));
    #[cfg(target_os = "linux")]
    assert_eq!(report.state_of(Protocol::Udp, closed_udp), Some(PortState::Closed));

    assert!(open_events.contains(&(Protocol::Tcp, open_tcp)));
    assert!(open_events.contains(&(Protocol::Udp, open_udp)));

    let tcp = report.summary(Protocol::Tcp).unwrap();
    assert_eq!(tcp.len(), 4);
    assert!(tcp.open.iter().any(|p| p.as_u16() == open_tcp));
}

#[tokio::test]
async fn test_cancelled_before_start_is_partial() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = ScanRequest::new(localhost()).with_ports("1-100");
    let report = run_scan(request, cancel, |_| {}).await.unwrap();

    assert!(report.is_partial());
    assert_eq!(report.completed(), 0);
    assert_eq!(report.not_dispatched(), 100);
}

#[tokio::test]
async fn test_invalid_request_sends_nothing() {
    let request = ScanRequest::new(localhost()).with_ports("0-10");
    assert!(run_scan(request, CancellationToken::new(), |_| {}).await.is_err());
}

/// Reports every even port open after a short pause.
struct EvenPorts;

#[async_trait]
impl Prober for EvenPorts {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, _ip: IpAddr, port: Port, _timeout: Duration) -> PortResult {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let state = if port.as_u16() % 2 == 0 {
            PortState::Open
        } else {
            PortState::Closed
        };
        PortResult::new(Protocol::Tcp, port, state, Duration::from_millis(5))
    }
}

#[tokio::test]
async fn test_engine_with_custom_prober() {
    let profile = TimingProfile::default().with_max_workers(8).unwrap();
    let ports = expand(Some("1-50")).unwrap();
    let jobs = build_jobs(&ports, &[Protocol::Tcp]);

    let engine = ScanEngine::new(localhost(), profile).with_prober(Arc::new(EvenPorts));
    let aggregator = ResultAggregator::new(localhost(), profile, vec![Protocol::Tcp], jobs.len());
    let report = aggregator.consume(engine.run(jobs), |_| {}).await;

    assert_eq!(report.completed(), 50);
    assert_eq!(report.count(PortState::Open), 25);
    let open: Vec<u16> = report.summary(Protocol::Tcp).unwrap().open.iter().map(|p| p.as_u16()).collect();
    assert_eq!(open.first(), Some(&2));
    assert_eq!(open.last(), Some(&50));
}

#[tokio::test]
async fn test_stream_counts_after_cancel_mid_scan() {
    let profile = TimingProfile::default().with_max_workers(2).unwrap();
    let ports = expand(Some("1-200")).unwrap();
    let jobs = build_jobs(&ports, &[Protocol::Tcp]);

    let engine = ScanEngine::new(localhost(), profile).with_prober(Arc::new(EvenPorts));
    let cancel = engine.cancellation_token();
    let mut stream = engine.run(jobs);

    let mut received = 0;
    while let Some(_result) = stream.next().await {
        received += 1;
        if received == 10 {
            cancel.cancel();
        }
    }

    assert!(stream.was_cancelled());
    assert_eq!(received, stream.dispatched());
    assert_eq!(received + stream.not_dispatched(), 200);
}
