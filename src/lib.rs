//! # portsweep - A TCP/UDP Port Scanner
//!
//! portsweep probes a single host over TCP connect and UDP, classifies each
//! port as open, closed, open|filtered or error, and aggregates the results
//! into a report. Speed and noise are controlled by five timing profiles.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: A worker pool sized by the timing profile
//! - **Timing Profiles**: T1 (sneaky) through T5 (insane)
//! - **Cancellation**: Stop mid-scan and still get a partial report
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::scanner::{run_scan, Protocol, ScanRequest};
//! use portsweep::types::Target;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = Target::resolve("127.0.0.1").await?;
//!     let request = ScanRequest::new(target)
//!         .with_protocols([Protocol::Tcp, Protocol::Udp])
//!         .with_ports("22,53,80")
//!         .with_timing(4);
//!
//!     let report = run_scan(request, CancellationToken::new(), |_| {}).await?;
//!     println!("{}", report.headline());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port specifications and scan targets
//! - [`config`] - Timing profiles and persisted settings
//! - [`scanner`] - Probers, the scan engine and scan requests
//! - [`report`] - Result aggregation and the final report
//! - [`services`] - Well-known service names
//! - [`output`] - Output formatting utilities
//! - [`cli`] - Command-line interface
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::TimingProfile;
pub use error::{CliError, ProbeError, ScanError};
pub use report::{Completion, ProgressEvent, ResultAggregator, ScanReport};
pub use scanner::{run_scan, PortResult, PortState, Protocol, ScanEngine, ScanJob, ScanRequest};
pub use types::{Port, PortSet, PortSpec, Target};
