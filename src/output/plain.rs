//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::report::ScanReport;
use crate::scanner::{PortResult, PortState, Protocol};
use crate::services::service_label;
use chrono::{DateTime, Local};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Which non-open rows the results table includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainOptions {
    pub show_closed: bool,
    pub show_errors: bool,
}

impl PlainOptions {
    fn includes(&self, result: &PortResult) -> bool {
        match result.state {
            PortState::Open | PortState::OpenOrFiltered => true,
            PortState::Closed => self.show_closed,
            PortState::Error => self.show_errors,
        }
    }
}

/// Write a report in human-readable form.
pub fn write_plain<W: Write>(out: &mut W, report: &ScanReport, options: PlainOptions) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                    {} Scan Results",
        style("portsweep").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    // Scan info
    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(out, "  {} {}", style("Timing:").bold(), report.timing)?;
    let protocols: Vec<String> = report.protocols.iter().map(Protocol::to_string).collect();
    writeln!(out, "  {} {}", style("Protocols:").bold(), protocols.join(", "))?;
    writeln!(out)?;

    // Statistics
    writeln!(
        out,
        "  {} {} of {} probes completed in {:.2}s",
        style("Statistics:").bold(),
        report.completed(),
        report.total_jobs,
        report.duration().num_milliseconds() as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} open|filtered, {} closed, {} errors",
        style(report.count(PortState::Open)).green().bold(),
        style(report.count(PortState::OpenOrFiltered)).yellow(),
        style(report.count(PortState::Closed)).red(),
        style(report.count(PortState::Error)).magenta()
    )?;
    if report.is_partial() {
        writeln!(
            out,
            "  {} {} jobs not dispatched",
            style("Scan cancelled:").yellow().bold(),
            report.not_dispatched()
        )?;
    }
    if report.all_errored() {
        writeln!(
            out,
            "  {} every probe failed; the target may be unreachable",
            style("Warning:").yellow().bold()
        )?;
    }
    writeln!(out)?;

    let rows: Vec<&PortResult> = report.results.iter().filter(|r| options.includes(r)).collect();

    if rows.is_empty() {
        let message = if report.has_open() {
            "No ports to display."
        } else {
            "No open ports found."
        };
        writeln!(out, "  {}", style(message).dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:<5}  {:>6}  {:<14}  {:<15}  {}",
            style("PROTO").bold(),
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("DETAIL").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in rows {
            let state_style = match result.state {
                PortState::Open => Style::new().green().bold(),
                PortState::OpenOrFiltered => Style::new().yellow(),
                PortState::Closed => Style::new().red(),
                PortState::Error => Style::new().magenta(),
            };

            writeln!(
                out,
                "  {:<5}  {:>6}  {:<14}  {:<15}  {}",
                result.protocol,
                result.port,
                state_style.apply_to(result.state.to_string()),
                service_label(result.protocol, result.port.as_u16()),
                style(truncate_string(result.error.as_deref().unwrap_or(""), 30)).dim()
            )?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

const BANNER: &str = r#"                  _
 _ __   ___  _ __| |_ _____      _____  ___ _ __
| '_ \ / _ \| '__| __/ __\ \ /\ / / _ \/ _ \ '_ \
| |_) | (_) | |  | |_\__ \\ V  V /  __/  __/ |_) |
| .__/ \___/|_|   \__|___/ \_/\_/ \___|\___| .__/
|_|                                        |_|"#;

/// `[HH:MM:SS]` prefix for status lines.
fn stamp(now: &DateTime<Local>) -> String {
    format!("[{}]", now.format("%H:%M:%S"))
}

/// Banner and timestamped scan parameters.
pub fn write_scan_header<W: Write>(
    out: &mut W,
    now: &DateTime<Local>,
    target: &str,
    protocols: &[Protocol],
    timing: &str,
    ports: usize,
) -> io::Result<()> {
    let protocols: Vec<String> = protocols.iter().map(Protocol::to_string).collect();
    let stamp = style(stamp(now)).blue().bold();

    writeln!(out)?;
    writeln!(out, "{}", style(BANNER).cyan().bold())?;
    writeln!(out, "{:>50}", style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim())?;
    writeln!(out)?;
    writeln!(out, "{} Target: {}", stamp, style(target).white().bold())?;
    writeln!(out, "{} Protocols: {}", stamp, style(protocols.join(", ")).yellow())?;
    writeln!(out, "{} Timing: {}", stamp, timing)?;
    writeln!(out, "{} Scanning {} ports...", stamp, style(ports).white().bold())?;
    writeln!(out)
}

/// Print the scan header to stderr before scanning begins.
pub fn print_scan_header(target: &str, protocols: &[Protocol], timing: &str, ports: usize) {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    // Nothing useful to do if stderr is gone.
    let _ = write_scan_header(&mut out, &Local::now(), target, protocols, timing, ports);
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingProfile;
    use chrono::TimeZone;
    use crate::report::{Completion, ResultAggregator};
    use crate::types::{Port, Target};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn report(results: &[(Protocol, u16, PortState)], completion: Completion) -> ScanReport {
        let mut agg = ResultAggregator::new(
            Target::from_ip(Ipv4Addr::LOCALHOST.into()),
            TimingProfile::default(),
            vec![Protocol::Tcp, Protocol::Udp],
            results.len() + completion_gap(completion),
        );
        for &(protocol, port, state) in results {
            let port = Port::new(port).unwrap();
            agg.record(PortResult::new(protocol, port, state, Duration::ZERO), |_| {});
        }
        agg.finish(completion)
    }

    fn completion_gap(completion: Completion) -> usize {
        match completion {
            Completion::Complete => 0,
            Completion::Partial { not_dispatched } => not_dispatched,
        }
    }

    fn render(report: &ScanReport, options: PlainOptions) -> String {
        let mut buf = Vec::new();
        write_plain(&mut buf, report, options).unwrap();
        console::strip_ansi_codes(&String::from_utf8(buf).unwrap()).into_owned()
    }

    #[test]
    fn test_open_ports_listed_closed_hidden() {
        let report = report(
            &[
                (Protocol::Tcp, 22, PortState::Open),
                (Protocol::Tcp, 80, PortState::Closed),
                (Protocol::Udp, 53, PortState::Open),
            ],
            Completion::Complete,
        );
        let text = render(&report, PlainOptions::default());

        assert!(text.contains("ssh"));
        assert!(text.contains("domain"));
        assert!(!text.contains("closed  "));
        assert!(!text.contains("Scan cancelled"));
    }

    #[test]
    fn test_no_open_ports_message() {
        let report = report(&[(Protocol::Tcp, 80, PortState::Closed)], Completion::Complete);
        let text = render(&report, PlainOptions::default());
        assert!(text.contains("No open ports found."));
    }

    #[test]
    fn test_partial_report_states_undispatched() {
        let report = report(
            &[(Protocol::Tcp, 22, PortState::Open)],
            Completion::Partial { not_dispatched: 41 },
        );
        let text = render(&report, PlainOptions::default());
        assert!(text.contains("Scan cancelled: 41 jobs not dispatched"));
        assert!(text.contains("1 of 42 probes"));
    }

    #[test]
    fn test_scan_header_has_banner_and_timestamps() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap();
        let mut buf = Vec::new();
        write_scan_header(&mut buf, &now, "127.0.0.1", &[Protocol::Tcp, Protocol::Udp], "T3", 21)
            .unwrap();
        let text = console::strip_ansi_codes(&String::from_utf8(buf).unwrap()).into_owned();

        assert!(text.contains(r"| .__/ \___/|_|"));
        assert!(text.contains("[09:05:07] Target: 127.0.0.1"));
        assert!(text.contains("[09:05:07] Protocols: TCP, UDP"));
        assert!(text.contains("[09:05:07] Scanning 21 ports..."));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
    }
}
