//! Scan subcommand implementation.
//!
//! Handles the `portsweep scan <target>` command for port scanning.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::{self, PlainOptions, ScanProgress};
use crate::scanner::{Protocol, ScanRequest};
use crate::types::Target;
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Scan a target for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target to scan (IP address or hostname)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan (e.g. "80", "22,80,443", "1-1000", "-" or "all" for every port)
    ///
    /// Defaults to a short list of commonly exposed ports.
    #[arg(short, long, allow_hyphen_values = true)]
    pub ports: Option<String>,

    /// Timing level, 1 (slow, quiet) to 5 (fast, loud)
    #[arg(short = 'T', long = "timing", value_parser = clap::value_parser!(u8).range(1..=5))]
    pub timing: Option<u8>,

    /// Probe TCP ports
    #[arg(long)]
    pub tcp: bool,

    /// Probe UDP ports
    #[arg(long)]
    pub udp: bool,

    /// Override the timing profile's number of concurrent workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Cap probes per second across all workers (0 = no cap)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Show closed ports in output
    #[arg(long)]
    pub show_closed: bool,

    /// Show failed probes in output
    #[arg(long)]
    pub show_errors: bool,

    /// Don't draw the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl ScanCommand {
    /// Protocols from the flags, falling back to settings.
    fn protocols(&self, settings: &AppSettings) -> Vec<Protocol> {
        if !self.tcp && !self.udp {
            return settings.protocols.clone();
        }
        let mut protocols = Vec::new();
        if self.tcp {
            protocols.push(Protocol::Tcp);
        }
        if self.udp {
            protocols.push(Protocol::Udp);
        }
        protocols
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let format = self.output.unwrap_or(settings.output_format);
        let target = Target::resolve(&self.target).await?;

        let mut request = ScanRequest::new(target)
            .with_protocols(self.protocols(settings))
            .with_timing(self.timing.unwrap_or(settings.timing_level))
            .with_rate_limit(self.rate_limit.unwrap_or(settings.max_rate));
        if let Some(ports) = &self.ports {
            request = request.with_ports(ports.clone());
        }
        if let Some(workers) = self.workers {
            request = request.with_workers(workers);
        }

        let prepared = request.prepare()?;
        let plain = format == OutputFormat::Plain;

        if !quiet && plain {
            output::print_scan_header(
                &prepared.engine().target().to_string(),
                prepared.protocols(),
                &prepared.engine().profile().to_string(),
                prepared.jobs().len() / prepared.protocols().len().max(1),
            );
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping dispatch");
                on_interrupt.cancel();
            }
        });

        let progress = ScanProgress::new(prepared.jobs().len(), !quiet && !self.no_progress && plain);
        let report = prepared.run(cancel, |event| progress.handle(event)).await;
        progress.finish(report.is_partial());

        if report.is_partial() && !plain {
            output::print_warning(&format!(
                "scan cancelled, {} jobs not dispatched",
                report.not_dispatched()
            ));
        }
        tracing::info!("{}", report.headline());

        let options = PlainOptions {
            show_closed: self.show_closed || settings.show_closed,
            show_errors: self.show_errors || settings.show_errors,
        };
        output::print_report(&report, format, options)
    }
}
